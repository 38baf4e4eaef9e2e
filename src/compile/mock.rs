//! compile::mock
//!
//! Mock provider and step for tests and embedders.
//!
//! # Design
//!
//! The mock step is a fully scriptable [`Step`]: its check status, diff,
//! errors, lock info, touched paths, and apply side effects are all set
//! through builders. An optional shared apply log records execution
//! order for assertions.
//!
//! This module ships in the library (not behind `cfg(test)`) so
//! integration tests and downstream embedders can drive the engine
//! without a real provider.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_yaml::Value;

use crate::core::context::{ExplainContext, RunContext};
use crate::core::step::{
    Diff, Explanation, LockInfo, LockableStep, Step, StepError, VersionedStep,
};
use crate::core::types::{Status, StepId};

use super::provider::{Provider, ProviderError};
use super::CompileContext;

/// Shared, thread-safe record of applied step ids, in apply order.
pub type ApplyLog = Arc<Mutex<Vec<String>>>;

/// Create an empty apply log.
pub fn apply_log() -> ApplyLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A scriptable step for driving the engine in tests.
#[derive(Debug, Clone)]
pub struct MockStep {
    id: StepId,
    deps: Vec<StepId>,
    check_status: Status,
    check_error: Option<String>,
    diff: Option<Diff>,
    plan_error: Option<String>,
    apply_error: Option<String>,
    lock_info: Option<LockInfo>,
    installed_version: Option<String>,
    touched: Vec<PathBuf>,
    layer: Option<String>,
    writes_on_apply: Vec<(PathBuf, Vec<u8>)>,
    log: Option<ApplyLog>,
}

impl MockStep {
    /// Create a step reporting the given check status.
    ///
    /// # Panics
    ///
    /// Panics when `id` is not a valid step id; mock construction sites
    /// are test code where that is a bug, not an input error.
    pub fn new(id: &str, check_status: Status) -> Self {
        Self {
            id: StepId::parse(id).expect("valid mock step id"),
            deps: Vec::new(),
            check_status,
            check_error: None,
            diff: None,
            plan_error: None,
            apply_error: None,
            lock_info: None,
            installed_version: None,
            touched: Vec::new(),
            layer: None,
            writes_on_apply: Vec::new(),
            log: None,
        }
    }

    /// A step whose check reports [`Status::Satisfied`].
    pub fn satisfied(id: &str) -> Self {
        Self::new(id, Status::Satisfied)
    }

    /// A step whose check reports [`Status::NeedsApply`].
    pub fn needs_apply(id: &str) -> Self {
        Self::new(id, Status::NeedsApply)
    }

    /// Declare dependencies (builder pattern).
    ///
    /// # Panics
    ///
    /// Panics on invalid ids, as with [`MockStep::new`].
    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.deps = ids
            .iter()
            .map(|id| StepId::parse(*id).expect("valid mock dependency id"))
            .collect();
        self
    }

    /// Make `check` fail with the given message.
    pub fn failing_check(mut self, message: &str) -> Self {
        self.check_error = Some(message.to_string());
        self
    }

    /// Use an explicit diff instead of the synthesized one.
    pub fn with_diff(mut self, diff: Diff) -> Self {
        self.diff = Some(diff);
        self
    }

    /// Make `plan` fail with the given message.
    pub fn failing_plan(mut self, message: &str) -> Self {
        self.plan_error = Some(message.to_string());
        self
    }

    /// Make `apply` fail with the given message.
    pub fn failing_apply(mut self, message: &str) -> Self {
        self.apply_error = Some(message.to_string());
        self
    }

    /// Expose lock info (enables the lockable capability).
    pub fn with_lock_info(mut self, provider: &str, name: &str, version: &str) -> Self {
        self.lock_info = Some(LockInfo::new(provider, name, version));
        self
    }

    /// Report an installed version (enables the versioned capability).
    pub fn with_installed_version(mut self, version: &str) -> Self {
        self.installed_version = Some(version.to_string());
        self
    }

    /// Declare a path the apply touches.
    pub fn with_touched_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.touched.push(path.into());
        self
    }

    /// Attribute the step to a configuration layer.
    pub fn with_layer(mut self, layer: &str) -> Self {
        self.layer = Some(layer.to_string());
        self
    }

    /// Write a file during apply (and implicitly touch it).
    pub fn writes_on_apply(mut self, path: impl Into<PathBuf>, content: &[u8]) -> Self {
        let path = path.into();
        if !self.touched.contains(&path) {
            self.touched.push(path.clone());
        }
        self.writes_on_apply.push((path, content.to_vec()));
        self
    }

    /// Record applies into a shared log (builder pattern).
    pub fn with_apply_log(mut self, log: ApplyLog) -> Self {
        self.log = Some(log);
        self
    }
}

impl Step for MockStep {
    fn id(&self) -> StepId {
        self.id.clone()
    }

    fn depends_on(&self) -> Vec<StepId> {
        self.deps.clone()
    }

    fn check(&self, _ctx: &RunContext) -> Result<Status, StepError> {
        match &self.check_error {
            Some(message) => Err(StepError::Other(message.clone())),
            None => Ok(self.check_status),
        }
    }

    fn plan(&self, _ctx: &RunContext) -> Result<Diff, StepError> {
        if let Some(message) = &self.plan_error {
            return Err(StepError::Other(message.clone()));
        }
        Ok(self
            .diff
            .clone()
            .unwrap_or_else(|| Diff::new(self.id.to_string(), format!("apply {}", self.id))))
    }

    fn apply(&self, _ctx: &RunContext) -> Result<(), StepError> {
        if let Some(log) = &self.log {
            log.lock().expect("apply log poisoned").push(self.id.to_string());
        }
        for (path, content) in &self.writes_on_apply {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        match &self.apply_error {
            Some(message) => Err(StepError::Other(message.clone())),
            None => Ok(()),
        }
    }

    fn explain(&self, _ctx: &ExplainContext) -> Explanation {
        Explanation::new(format!("mock step {}", self.id))
    }

    fn touched_paths(&self) -> Vec<PathBuf> {
        self.touched.clone()
    }

    fn source_layer(&self) -> Option<String> {
        self.layer.clone()
    }

    fn as_lockable(&self) -> Option<&dyn LockableStep> {
        self.lock_info.as_ref().map(|_| self as &dyn LockableStep)
    }

    fn as_versioned(&self) -> Option<&dyn VersionedStep> {
        self.installed_version
            .as_ref()
            .map(|_| self as &dyn VersionedStep)
    }
}

impl LockableStep for MockStep {
    fn lock_info(&self) -> Option<LockInfo> {
        self.lock_info.clone()
    }
}

impl VersionedStep for MockStep {
    fn installed_version(&self, _ctx: &RunContext) -> Result<Option<String>, StepError> {
        Ok(self.installed_version.clone())
    }
}

/// A provider that returns a fixed set of mock steps (or a fixed error).
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    steps: Vec<MockStep>,
    error: Option<String>,
}

impl MockProvider {
    /// Provider returning the given steps for any fragment.
    pub fn new(name: &str, steps: Vec<MockStep>) -> Self {
        Self {
            name: name.to_string(),
            steps,
            error: None,
        }
    }

    /// Provider returning no steps.
    pub fn empty(name: &str) -> Self {
        Self::new(name, Vec::new())
    }

    /// Provider whose `generate_steps` always fails.
    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
            error: Some(message.to_string()),
        }
    }
}

impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate_steps(
        &self,
        _fragment: &Value,
        _ctx: &CompileContext,
    ) -> Result<Vec<Box<dyn Step>>, ProviderError> {
        if let Some(message) = &self.error {
            return Err(ProviderError::Internal(message.clone()));
        }
        Ok(self
            .steps
            .iter()
            .cloned()
            .map(|step| Box::new(step) as Box<dyn Step>)
            .collect())
    }
}
