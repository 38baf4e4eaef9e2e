//! providers::files
//!
//! The in-tree reference provider: managed files and dotfiles.
//!
//! # Configuration
//!
//! ```yaml
//! files:
//!   link:
//!     zshrc: dotfiles/zshrc
//!     gitconfig:
//!       source: dotfiles/gitconfig
//!       target: ~/.config/git/config
//! ```
//!
//! The short form links `dotfiles/zshrc` (relative to the config root)
//! to `~/.zshrc`. The detailed form names an explicit target; a leading
//! `~/` expands to the home directory.
//!
//! Apply copies bytes rather than symlinking, so the target behaves the
//! same on filesystems and tools that resolve links eagerly.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use crate::compile::provider::{Provider, ProviderError};
use crate::compile::CompileContext;
use crate::core::context::{ExplainContext, RunContext};
use crate::core::step::{Diff, Explanation, Step, StepError};
use crate::core::types::{Status, StepId};

/// Name of the provider and of the config section it owns.
pub const PROVIDER_NAME: &str = "files";

/// Configuration fragment for the `files` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilesFragment {
    /// Managed file entries keyed by logical name.
    #[serde(default)]
    link: BTreeMap<String, LinkEntry>,
}

/// One `link` entry: either a bare source path or a detailed mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LinkEntry {
    Source(String),
    Detailed {
        source: String,
        #[serde(default)]
        target: Option<String>,
    },
}

impl LinkEntry {
    fn source(&self) -> &str {
        match self {
            LinkEntry::Source(source) => source,
            LinkEntry::Detailed { source, .. } => source,
        }
    }

    fn target(&self) -> Option<&str> {
        match self {
            LinkEntry::Source(_) => None,
            LinkEntry::Detailed { target, .. } => target.as_deref(),
        }
    }
}

/// Provider for the `files` configuration section.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesProvider;

impl FilesProvider {
    /// Create the provider.
    pub fn new() -> Self {
        Self
    }
}

impl Provider for FilesProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn generate_steps(
        &self,
        fragment: &Value,
        ctx: &CompileContext,
    ) -> Result<Vec<Box<dyn Step>>, ProviderError> {
        let fragment: FilesFragment = serde_yaml::from_value(fragment.clone())
            .map_err(|err| ProviderError::InvalidFragment(err.to_string()))?;
        let layer = ctx.layer_of(PROVIDER_NAME);

        let mut steps: Vec<Box<dyn Step>> = Vec::with_capacity(fragment.link.len());
        for (name, entry) in &fragment.link {
            let id = StepId::with_name(PROVIDER_NAME, "link", name)
                .map_err(|err| ProviderError::InvalidFragment(err.to_string()))?;
            let source = ctx.config_root.join(entry.source());
            let target = match entry.target() {
                Some(target) => expand_target(target, &ctx.home),
                None => ctx.home.join(format!(".{name}")),
            };
            steps.push(Box::new(FileLinkStep {
                id,
                name: name.clone(),
                source,
                target,
                layer: layer.clone(),
            }));
        }
        Ok(steps)
    }
}

/// Expand a leading `~/` in a target path against the home directory.
fn expand_target(target: &str, home: &Path) -> PathBuf {
    match target.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(target),
    }
}

/// Keeps one destination file identical to its source.
#[derive(Debug, Clone)]
pub struct FileLinkStep {
    id: StepId,
    name: String,
    source: PathBuf,
    target: PathBuf,
    layer: String,
}

impl FileLinkStep {
    /// The destination path this step manages.
    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl Step for FileLinkStep {
    fn id(&self) -> StepId {
        self.id.clone()
    }

    fn check(&self, _ctx: &RunContext) -> Result<Status, StepError> {
        let desired = fs::read(&self.source).map_err(|err| {
            StepError::InvalidConfig(format!(
                "source {} unreadable: {err}",
                self.source.display()
            ))
        })?;
        match fs::read(&self.target) {
            Ok(current) if current == desired => Ok(Status::Satisfied),
            Ok(_) => Ok(Status::NeedsApply),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Status::NeedsApply),
            Err(err) => Err(err.into()),
        }
    }

    fn plan(&self, _ctx: &RunContext) -> Result<Diff, StepError> {
        let desired = fs::read(&self.source)?;
        let diff = Diff::new(
            self.target.display().to_string(),
            format!("link {}: {}", self.name, self.target.display()),
        );
        let diff = match fs::metadata(&self.target) {
            Ok(metadata) => diff.with_detail(format!(
                "update ({} -> {} bytes)",
                metadata.len(),
                desired.len()
            )),
            Err(_) => diff.with_detail(format!("create ({} bytes)", desired.len())),
        };
        Ok(diff)
    }

    fn apply(&self, _ctx: &RunContext) -> Result<(), StepError> {
        if let Some(parent) = self.target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&self.source, &self.target)?;
        Ok(())
    }

    fn explain(&self, ctx: &ExplainContext) -> Explanation {
        let explanation = Explanation::new(format!(
            "keeps {} in sync with {}",
            self.target.display(),
            self.source.display()
        ));
        if ctx.verbose {
            explanation.with_detail(format!("owned by layer '{}'", self.layer))
        } else {
            explanation
        }
    }

    fn touched_paths(&self) -> Vec<PathBuf> {
        vec![self.target.clone()]
    }

    fn source_layer(&self) -> Option<String> {
        Some(self.layer.clone())
    }
}
