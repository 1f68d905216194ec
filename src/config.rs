//! Interpreter configuration
//!
//! Plain serde data so hosts can keep it in a JSON file next to their
//! snapshots. Configuration is deliberately not part of a snapshot: a restored
//! image runs under whatever configuration the restoring host supplies.

use serde::{Deserialize, Serialize};

use crate::error::JsError;

/// Which authorization policy guards object mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Any non-null owner may do anything
    #[default]
    Open,
    /// Only an object's owner (or the root owner) may mutate it
    Owner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterpreterConfig {
    /// Time limit for newly spawned threads, in milliseconds. `None` means
    /// unlimited.
    pub default_time_limit_ms: Option<f64>,
    /// Allocations between automatic collections. 0 disables automatic GC.
    pub gc_threshold: usize,
    /// Maximum depth of a thread's state stack before a RangeError is raised
    pub max_stack_depth: usize,
    pub policy: PolicyKind,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            default_time_limit_ms: None,
            gc_threshold: 10_000,
            max_stack_depth: 100_000,
            policy: PolicyKind::Open,
        }
    }
}

impl InterpreterConfig {
    pub fn from_json(text: &str) -> Result<Self, JsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, JsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_time_limit(mut self, millis: f64) -> Self {
        self.default_time_limit_ms = Some(millis);
        self
    }

    pub fn with_gc_threshold(mut self, threshold: usize) -> Self {
        self.gc_threshold = threshold;
        self
    }

    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }
}
