//! providers
//!
//! In-tree providers. Only the `files` reference provider lives here;
//! package-manager providers (brew, apt, winget, npm, ...) are external
//! plug-ins registered by embedders through
//! [`crate::compile::ProviderRegistry`].

pub mod files;

pub use files::{FileLinkStep, FilesProvider};
