//! core
//!
//! Domain types and containers shared by every layer: validated
//! identifiers, the step contract, the dependency graph, run contexts,
//! raw configuration, and state-root path routing.

pub mod config;
pub mod context;
pub mod graph;
pub mod paths;
pub mod step;
pub mod types;

pub use config::RawConfig;
pub use context::{CancelToken, ExplainContext, Platform, RunContext};
pub use graph::{GraphError, StepGraph};
pub use paths::StatePaths;
pub use step::{Diff, Explanation, LockInfo, LockableStep, Step, StepError, VersionedStep};
pub use types::{Status, StepId, TypeError};
