//! engine
//!
//! Orchestrates the pipeline: Compile -> Plan -> Execute -> Lock-update.
//!
//! # Architecture
//!
//! The engine is the central coordinator. Every run follows the same
//! lifecycle:
//!
//! 1. **Compile**: Dispatch configuration sections to providers, build
//!    and validate the step graph ([`crate::compile`])
//! 2. **Plan**: Check every step against the live system, record the
//!    verdicts in dependency order ([`planner`])
//! 3. **Execute**: Apply pending changes with snapshot protection and
//!    optional rollback ([`exec`])
//! 4. **Lock-update**: Reconcile the lockfile with what was planned and
//!    applied ([`crate::lock::update`])
//!
//! # Invariants
//!
//! - The planner never mutates the system
//! - All mutation flows through the single executor
//! - Plan and result ordering are deterministic given identical inputs

pub mod exec;
pub mod gate;
pub mod plan;
pub mod planner;
pub mod rollback;

pub use exec::{BootstrapConfirmer, ExecuteError, ExecutionReport, Executor, StepResult};
pub use gate::{is_bootstrap, pending_bootstrap, BOOTSTRAP_STEP_IDS};
pub use plan::{Plan, PlanEntry, PlanSummary};
pub use planner::{plan, PlannerError};
pub use rollback::{rollback_applied, RollbackError, RollbackReport};
