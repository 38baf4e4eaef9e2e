//! Preflight - a declarative, cross-platform developer environment manager
//!
//! Preflight compiles a layered YAML description of a workstation -
//! packages, dotfiles, editor and shell configuration - into an ordered
//! graph of idempotent steps, compares each step's desired state against
//! the live system, and applies the minimum set of changes.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Orchestrates Compile → Plan → Execute → Lock-update
//! - [`compile`] - Provider registry and configuration compilation
//! - [`core`] - Domain types, step contract, dependency graph, contexts
//! - [`lock`] - Lockfile, version resolver, and reconciliation
//! - [`lifecycle`] - Snapshots, drift detection, and advisory patches
//! - [`providers`] - In-tree reference provider (`files`)
//! - [`ui`] - User interaction utilities
//!
//! # Correctness Invariants
//!
//! 1. A compiled step graph is acyclic and every dependency resolves
//! 2. All mutations flow through the single executor
//! 3. Plans and execution results are deterministic given identical inputs
//! 4. Files are snapshotted before modification and restorable on rollback

pub mod cli;
pub mod compile;
pub mod core;
pub mod engine;
pub mod lifecycle;
pub mod lock;
pub mod providers;
pub mod ui;
