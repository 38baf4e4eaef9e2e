//! core::context
//!
//! Run and explain contexts passed to steps.
//!
//! # Design
//!
//! The run context is read-only from a step's perspective. It carries the
//! cancellation token, the invoking user's identity and home directory,
//! the config root for resolving relative paths, the platform descriptor,
//! the dry-run flag, and an optional [`Lifecycle`] handle for steps that
//! mutate files (rather than a hidden global).
//!
//! Cancellation is cooperative: the engine checks the token at step
//! boundaries; steps that perform long I/O should check it at their own
//! boundaries too.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;

/// A shareable cooperative cancellation flag.
///
/// Cloning shares the underlying flag, so a token handed to the engine
/// can be cancelled from elsewhere (e.g. a ctrl-c handler).
///
/// # Example
///
/// ```
/// use preflight::core::context::CancelToken;
///
/// let token = CancelToken::new();
/// let shared = token.clone();
/// assert!(!token.is_cancelled());
/// shared.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Operating system and architecture of the machine being managed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system identifier (`linux`, `macos`, `windows`).
    pub os: String,
    /// CPU architecture (`x86_64`, `aarch64`).
    pub arch: String,
}

impl Platform {
    /// The platform this process is running on.
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Context for a planning or execution run.
///
/// Read-only from a step's perspective.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Cooperative cancellation signal.
    pub cancel: CancelToken,
    /// Debug logging enabled.
    pub debug: bool,
    /// Name of the invoking user.
    pub user: String,
    /// The user's home directory.
    pub home: PathBuf,
    /// Root directory of the configuration, for resolving relative paths.
    pub config_root: PathBuf,
    /// Platform descriptor.
    pub platform: Platform,
    /// When set, apply must not be called; the executor synthesizes
    /// results instead.
    pub dry_run: bool,
    /// Snapshot/drift services, when a state root is configured.
    pub lifecycle: Option<Arc<Lifecycle>>,
}

impl RunContext {
    /// Create a context for the current user and platform.
    ///
    /// User and home fall back to `"unknown"` and the config root when
    /// the environment does not provide them; callers that need strict
    /// behavior should construct the context explicitly.
    pub fn for_current_user(config_root: impl Into<PathBuf>) -> Self {
        let config_root = config_root.into();
        let home = dirs::home_dir().unwrap_or_else(|| config_root.clone());
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            cancel: CancelToken::new(),
            debug: false,
            user,
            home,
            config_root,
            platform: Platform::current(),
            dry_run: false,
            lifecycle: None,
        }
    }

    /// Set the dry-run flag (builder pattern).
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable debug logging (builder pattern).
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Attach a lifecycle handle (builder pattern).
    pub fn with_lifecycle(mut self, lifecycle: Arc<Lifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Use a specific cancellation token (builder pattern).
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Override the home directory (builder pattern).
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }
}

/// Context for producing human explanations of steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplainContext {
    /// Include detail lines in explanations.
    pub verbose: bool,
}
