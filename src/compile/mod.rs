//! compile
//!
//! Configuration compilation: raw config sections in, validated step
//! graph out.
//!
//! # Architecture
//!
//! The compiler walks the merged configuration's top-level sections in
//! sorted order and dispatches each to its registered provider. Provider
//! output is inserted into a fresh [`StepGraph`], which is then
//! finalized (dependency resolution + cycle detection).
//!
//! # Failure semantics
//!
//! - Unknown section key: non-fatal warning (forward compatibility)
//! - Provider error: fatal, compilation fails
//! - Duplicate step id, missing dependency, cycle: fatal
//!
//! # Example
//!
//! ```
//! use preflight::compile::{CompileContext, Compiler, ProviderRegistry};
//! use preflight::core::config::RawConfig;
//! use preflight::lock::{LockMode, LockResolver};
//!
//! let registry = ProviderRegistry::new();
//! let compiler = Compiler::new(registry);
//! let config = RawConfig::new();
//! let resolver = LockResolver::new(LockMode::Intent, None);
//! let ctx = CompileContext::new(&config, &resolver, "/cfg", "/home/dev");
//!
//! let compilation = compiler.compile(&ctx).unwrap();
//! assert!(compilation.graph.is_empty());
//! assert!(compilation.warnings.is_empty());
//! ```

pub mod mock;
pub mod provider;

pub use provider::{Provider, ProviderError, ProviderRegistry, RegistryError};

use std::path::PathBuf;

use thiserror::Error;

use crate::core::config::RawConfig;
use crate::core::graph::{GraphError, StepGraph};
use crate::lock::resolver::VersionResolver;

/// Errors from compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A provider failed to generate steps for its section.
    #[error("provider '{section}' failed: {source}")]
    Provider {
        /// The config section being compiled.
        section: String,
        /// The provider's error.
        source: ProviderError,
    },

    /// A provider produced a step outside its namespace.
    #[error("provider '{provider}' produced foreign step id {id}")]
    ForeignStepId {
        /// The offending provider.
        provider: String,
        /// The step id it produced.
        id: String,
    },

    /// Structural graph error (duplicate id, missing dep, cycle).
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Inputs to one compilation run.
#[derive(Clone)]
pub struct CompileContext<'a> {
    /// The merged raw configuration.
    pub config: &'a RawConfig,
    /// Version resolver handed to providers for version-bearing steps.
    pub resolver: &'a dyn VersionResolver,
    /// Target name (machine profile) being compiled.
    pub target: String,
    /// Root directory of the configuration, for resolving relative paths.
    pub config_root: PathBuf,
    /// The user's home directory, for resolving destination paths.
    pub home: PathBuf,
}

impl<'a> CompileContext<'a> {
    /// Create a context with the default target.
    pub fn new(
        config: &'a RawConfig,
        resolver: &'a dyn VersionResolver,
        config_root: impl Into<PathBuf>,
        home: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            resolver,
            target: "default".to_string(),
            config_root: config_root.into(),
            home: home.into(),
        }
    }

    /// Set the target name (builder pattern).
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// The owning layer of a section, defaulting to the base layer.
    pub fn layer_of(&self, section: &str) -> String {
        self.config
            .layer_of(section)
            .unwrap_or(crate::core::config::BASE_LAYER)
            .to_string()
    }
}

impl std::fmt::Debug for CompileContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileContext")
            .field("target", &self.target)
            .field("config_root", &self.config_root)
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

/// Output of a compilation run.
#[derive(Debug)]
pub struct Compilation {
    /// The validated step graph.
    pub graph: StepGraph,
    /// Non-fatal warnings (unknown sections).
    pub warnings: Vec<String>,
}

/// Turns raw configuration into a validated step graph.
pub struct Compiler {
    registry: ProviderRegistry,
}

impl Compiler {
    /// Create a compiler over a provider registry.
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Compile the configuration into a step graph.
    ///
    /// Sections are visited in sorted key order so identical inputs
    /// always produce identical graphs. Unknown sections produce
    /// warnings; every other failure is fatal and returns the first
    /// structural error encountered.
    pub fn compile(&self, ctx: &CompileContext) -> Result<Compilation, CompileError> {
        let mut graph = StepGraph::new();
        let mut warnings = Vec::new();

        for (section, fragment) in ctx.config.sections() {
            let Some(provider) = self.registry.get(section) else {
                warnings.push(format!(
                    "unknown config section '{section}' (no provider registered)"
                ));
                continue;
            };

            let steps =
                provider
                    .generate_steps(fragment, ctx)
                    .map_err(|source| CompileError::Provider {
                        section: section.to_string(),
                        source,
                    })?;

            for step in steps {
                let id = step.id();
                if id.provider() != provider.name() && !is_bootstrap_namespace(&id) {
                    return Err(CompileError::ForeignStepId {
                        provider: provider.name().to_string(),
                        id: id.to_string(),
                    });
                }
                graph.insert(step)?;
            }
        }

        graph.finalize()?;
        Ok(Compilation { graph, warnings })
    }
}

fn is_bootstrap_namespace(id: &crate::core::types::StepId) -> bool {
    id.provider() == "bootstrap"
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("registry", &self.registry)
            .finish()
    }
}
