//! Request types for the script resource.
//!
//! [`ScriptRequest`] is the fixed boundary struct the marshalling layer
//! fills in, one field per resource property. Absent properties arrive as
//! empty strings. [`ExecutionRequest`] is the single script that one
//! lifecycle operation actually runs.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle operation of the script resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Operation {
    Get,
    Set,
    Test,
}

/// Properties of one script resource instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ScriptRequest {
    /// Script run by `Get`; its stdout becomes the `Result` property.
    pub get_script: String,
    /// Script run by `Set`.
    pub set_script: String,
    /// Script run by `Test`.
    pub test_script: String,
    /// User to run as (empty for no change).
    pub user: String,
    /// Group to run as (empty for no change).
    pub group: String,
}

impl ScriptRequest {
    /// Returns the script text the given operation runs.
    pub fn script_for(&self, operation: Operation) -> &str {
        match operation {
            Operation::Get => &self.get_script,
            Operation::Set => &self.set_script,
            Operation::Test => &self.test_script,
        }
    }

    /// Builds the execution request for the given operation.
    pub fn execution(&self, operation: Operation) -> ExecutionRequest {
        ExecutionRequest::new(self.script_for(operation), &self.user, &self.group)
    }
}

/// A single script to execute, with optional target identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionRequest {
    script: String,
    user: Option<String>,
    group: Option<String>,
}

impl ExecutionRequest {
    /// Creates a request, treating empty user/group names as absent.
    pub fn new(script: impl Into<String>, user: &str, group: &str) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            script: script.into(),
            user: non_empty(user),
            group: non_empty(group),
        }
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }
}
