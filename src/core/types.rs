//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`StepId`] - Validated step identifier (`provider:kind[:name…]`)
//! - [`Status`] - Terminal state of a step within a plan or execution
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use preflight::core::types::{StepId, Status};
//!
//! // Valid constructions
//! let id = StepId::parse("brew:formula:ripgrep").unwrap();
//! assert_eq!(id.provider(), "brew");
//! assert_eq!(id.kind(), "formula");
//! assert_eq!(id.name(), Some("ripgrep"));
//!
//! // Invalid constructions fail at creation time
//! assert!(StepId::parse("").is_err());
//! assert!(StepId::parse("brew").is_err());
//! assert!(StepId::parse("brew::ripgrep").is_err());
//!
//! assert_eq!(Status::NeedsApply.to_string(), "needs-apply");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid step id: {0}")]
    InvalidStepId(String),
}

/// Maximum byte length of a step id's string form.
const MAX_STEP_ID_LEN: usize = 256;

/// A validated step identifier.
///
/// Step ids are shaped `<provider>:<kind>[:<name>…]`, for example
/// `brew:formula:ripgrep`, `files:link:zshrc`, or `git:config`.
///
/// Rules enforced at construction:
/// - At least two colon-separated segments (provider and kind)
/// - No empty segments
/// - Segments contain only `[A-Za-z0-9._@/+-]`
/// - Total length at most 256 bytes
///
/// The string form round-trips through [`StepId::parse`] and
/// [`std::fmt::Display`].
///
/// # Example
///
/// ```
/// use preflight::core::types::StepId;
///
/// let id = StepId::parse("files:link:zshrc").unwrap();
/// assert_eq!(id.to_string(), "files:link:zshrc");
///
/// let no_name = StepId::parse("git:config").unwrap();
/// assert_eq!(no_name.name(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StepId(String);

impl StepId {
    /// Parse and validate a step id from its string form.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidStepId` if the value violates the id rules.
    pub fn parse(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// Build a step id from provider and kind segments.
    pub fn new(provider: &str, kind: &str) -> Result<Self, TypeError> {
        Self::parse(format!("{provider}:{kind}"))
    }

    /// Build a step id from provider, kind, and name segments.
    pub fn with_name(provider: &str, kind: &str, name: &str) -> Result<Self, TypeError> {
        Self::parse(format!("{provider}:{kind}:{name}"))
    }

    fn validate(s: &str) -> Result<(), TypeError> {
        if s.is_empty() {
            return Err(TypeError::InvalidStepId("step id cannot be empty".into()));
        }
        if s.len() > MAX_STEP_ID_LEN {
            return Err(TypeError::InvalidStepId(format!(
                "step id exceeds {MAX_STEP_ID_LEN} bytes"
            )));
        }

        let segments: Vec<&str> = s.split(':').collect();
        if segments.len() < 2 {
            return Err(TypeError::InvalidStepId(format!(
                "step id '{s}' must have at least provider and kind segments"
            )));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(TypeError::InvalidStepId(format!(
                    "step id '{s}' contains an empty segment"
                )));
            }
            for c in segment.chars() {
                let valid =
                    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '/' | '+' | '-');
                if !valid {
                    return Err(TypeError::InvalidStepId(format!(
                        "step id '{s}' contains invalid character '{c}'"
                    )));
                }
            }
        }

        Ok(())
    }

    /// The provider segment (first segment).
    pub fn provider(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// The kind segment (second segment).
    pub fn kind(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    /// The name portion (everything after the kind), if present.
    ///
    /// For `brew:formula:ripgrep` this is `Some("ripgrep")`. Additional
    /// segments are preserved verbatim in the tail.
    pub fn name(&self) -> Option<&str> {
        let mut iter = self.0.splitn(3, ':');
        iter.next()?;
        iter.next()?;
        iter.next()
    }

    /// Get the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StepId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<StepId> for String {
    fn from(value: StepId) -> Self {
        value.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for StepId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The status of a step within a plan or after execution.
///
/// Exactly one status is recorded per step per plan. The ordering is
/// declaration order and exists only so statuses can key sorted maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The step's desired state already matches the live system.
    Satisfied,
    /// The step must be applied to reach the desired state.
    NeedsApply,
    /// The step was not evaluated or executed (failed dependency,
    /// cancellation).
    Skipped,
    /// The step's check, plan, or apply failed.
    Failed,
    /// The step's state could not be determined.
    Unknown,
}

impl Status {
    /// Short label used in summaries and plan output.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Satisfied => "satisfied",
            Status::NeedsApply => "needs-apply",
            Status::Skipped => "skipped",
            Status::Failed => "failed",
            Status::Unknown => "unknown",
        }
    }

    /// Whether this status represents a completed, non-actionable state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::NeedsApply)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod step_id {
        use super::*;

        #[test]
        fn parse_two_segments() {
            let id = StepId::parse("git:config").unwrap();
            assert_eq!(id.provider(), "git");
            assert_eq!(id.kind(), "config");
            assert_eq!(id.name(), None);
        }

        #[test]
        fn parse_three_segments() {
            let id = StepId::parse("brew:formula:ripgrep").unwrap();
            assert_eq!(id.provider(), "brew");
            assert_eq!(id.kind(), "formula");
            assert_eq!(id.name(), Some("ripgrep"));
        }

        #[test]
        fn name_preserves_extra_segments() {
            let id = StepId::parse("files:link:config/nvim:init.lua").unwrap();
            assert_eq!(id.name(), Some("config/nvim:init.lua"));
        }

        #[test]
        fn rejects_empty() {
            assert!(StepId::parse("").is_err());
        }

        #[test]
        fn rejects_single_segment() {
            assert!(StepId::parse("brew").is_err());
        }

        #[test]
        fn rejects_empty_segment() {
            assert!(StepId::parse("brew::ripgrep").is_err());
            assert!(StepId::parse(":formula").is_err());
            assert!(StepId::parse("brew:formula:").is_err());
        }

        #[test]
        fn rejects_invalid_characters() {
            assert!(StepId::parse("brew:has space").is_err());
            assert!(StepId::parse("brew:tab\there").is_err());
        }

        #[test]
        fn rejects_overlong() {
            let long = format!("p:{}", "x".repeat(300));
            assert!(StepId::parse(long).is_err());
        }

        #[test]
        fn round_trips_through_display() {
            for raw in ["brew:formula:ripgrep", "files:link:zshrc", "git:config"] {
                let id = StepId::parse(raw).unwrap();
                assert_eq!(id.to_string(), raw);
                let back = StepId::parse(id.to_string()).unwrap();
                assert_eq!(back, id);
            }
        }

        #[test]
        fn ordering_is_lexicographic() {
            let a = StepId::parse("apt:package:curl").unwrap();
            let b = StepId::parse("brew:formula:fd").unwrap();
            assert!(a < b);
        }

        #[test]
        fn constructors() {
            let id = StepId::new("winget", "ready").unwrap();
            assert_eq!(id.as_str(), "winget:ready");

            let id = StepId::with_name("npm", "package", "typescript").unwrap();
            assert_eq!(id.as_str(), "npm:package:typescript");
        }

        #[test]
        fn serde_round_trip() {
            let id = StepId::parse("scoop:app:jq").unwrap();
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, "\"scoop:app:jq\"");
            let back: StepId = serde_json::from_str(&json).unwrap();
            assert_eq!(back, id);
        }

        #[test]
        fn serde_rejects_invalid() {
            let result: Result<StepId, _> = serde_json::from_str("\"nope\"");
            assert!(result.is_err());
        }
    }

    mod status {
        use super::*;

        #[test]
        fn labels() {
            assert_eq!(Status::Satisfied.label(), "satisfied");
            assert_eq!(Status::NeedsApply.label(), "needs-apply");
            assert_eq!(Status::Skipped.label(), "skipped");
            assert_eq!(Status::Failed.label(), "failed");
            assert_eq!(Status::Unknown.label(), "unknown");
        }

        #[test]
        fn terminal_statuses() {
            assert!(Status::Satisfied.is_terminal());
            assert!(Status::Skipped.is_terminal());
            assert!(Status::Failed.is_terminal());
            assert!(Status::Unknown.is_terminal());
            assert!(!Status::NeedsApply.is_terminal());
        }

        #[test]
        fn serde_uses_snake_case() {
            let json = serde_json::to_string(&Status::NeedsApply).unwrap();
            assert_eq!(json, "\"needs_apply\"");
        }
    }
}
