//! compile::provider
//!
//! The provider contract and registry.
//!
//! # Architecture
//!
//! A provider owns one top-level configuration section (its name matches
//! the section key) and contributes steps for it. Providers are external
//! collaborators: the core only knows this trait. Registration happens
//! once at startup; names are unique.
//!
//! # Invariants
//!
//! - `generate_steps` is pure with respect to the system (no mutation)
//! - Produced step ids carry the provider's name as their first segment
//!   (the `bootstrap:` namespace is the one exception, for steps that
//!   install the provider's own package manager)

use std::collections::BTreeMap;

use serde_yaml::Value;
use thiserror::Error;

use crate::core::step::Step;

use super::CompileContext;

/// Errors a provider may raise while generating steps.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The configuration fragment does not match the provider's schema.
    #[error("invalid fragment: {0}")]
    InvalidFragment(String),

    /// I/O failure while resolving configuration inputs.
    #[error("provider i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other provider-specific failure.
    #[error("{0}")]
    Internal(String),
}

/// Contributes steps for one configuration section.
pub trait Provider {
    /// The provider's name. Matches the top-level config key it owns and
    /// the `provider` segment of the step ids it produces.
    fn name(&self) -> &str;

    /// Turn a configuration fragment into steps.
    ///
    /// Must not mutate the system; inspection happens later in each
    /// step's `check`.
    fn generate_steps(
        &self,
        fragment: &Value,
        ctx: &CompileContext,
    ) -> Result<Vec<Box<dyn Step>>, ProviderError>;
}

/// Registry of providers keyed by name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the in-tree providers registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(Box::new(crate::providers::files::FilesProvider::new()))
            .expect("builtin provider names are unique");
        registry
    }

    /// Register a provider. Names must be unique.
    pub fn register(&mut self, provider: Box<dyn Provider>) -> Result<(), RegistryError> {
        let name = provider.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.providers.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Option<&dyn Provider> {
        self.providers.get(name).map(|p| p.as_ref())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Errors from provider registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A provider with this name is already registered.
    #[error("provider already registered: {0}")]
    Duplicate(String),

    /// The provider reported an empty name.
    #[error("provider name cannot be empty")]
    EmptyName,
}
