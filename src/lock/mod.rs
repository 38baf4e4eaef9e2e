//! lock
//!
//! Version reproducibility: the lockfile value, the three-mode resolver,
//! file persistence, and post-plan reconciliation.
//!
//! # Architecture
//!
//! ```text
//! Compiler -> VersionResolver -> Lockfile <- LockRepo (disk)
//!                                   ^
//!                            lock::update (after plan/apply)
//! ```
//!
//! The resolver never aborts: failed resolutions (frozen mode, missing
//! entries) are reported in-band and surface as failed steps at plan
//! time.

pub mod lockfile;
pub mod repo;
pub mod resolver;
pub mod update;

pub use lockfile::{
    integrity_for, LockMode, Lockfile, LockfileError, MachineInfo, PackageLock, LOCKFILE_VERSION,
};
pub use repo::{FileLockRepo, LockRepo, LockRepoError};
pub use resolver::{LockResolver, Resolution, ResolutionSource, VersionResolver};
pub use update::{update_from_plan, LockUpdateReport};
