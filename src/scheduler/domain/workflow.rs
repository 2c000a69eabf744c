//! Workflow steps: the ordered tool invocations a task runs per occurrence.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identity of a step executor on the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolName(String);

impl ToolName {
    /// Executor that sends an email.
    pub const SEND_EMAIL: &'static str = "send_email";
    /// Executor that scrapes a web page with a CSS selector.
    pub const SCRAPE_WEB: &'static str = "scrape_web";
    /// Executor that calls an external HTTP API.
    pub const CALL_API: &'static str = "call_api";

    /// Creates a validated tool name.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyToolName`] when the value is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TaskDomainError::EmptyToolName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns whether the name addresses one of the built-in executors.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::SEND_EMAIL | Self::SCRAPE_WEB | Self::CALL_API
        )
    }

    /// Returns the tool name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ToolName {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ToolName> for String {
    fn from(value: ToolName) -> Self {
        value.0
    }
}

impl AsRef<str> for ToolName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One tool invocation with its named parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    tool: ToolName,
    #[serde(default)]
    parameters: Map<String, Value>,
}

impl Step {
    /// Creates a step with no parameters.
    #[must_use]
    pub fn new(tool: ToolName) -> Self {
        Self {
            tool,
            parameters: Map::new(),
        }
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Returns the executor this step addresses.
    #[must_use]
    pub const fn tool(&self) -> &ToolName {
        &self.tool
    }

    /// Returns the parameter mapping.
    #[must_use]
    pub const fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }
}

/// Ordered list of steps; order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workflow(Vec<Step>);

impl Workflow {
    /// Creates an empty workflow.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Appends a step.
    #[must_use]
    pub fn then(mut self, step: Step) -> Self {
        self.0.push(step);
        self
    }

    /// Returns the steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the workflow has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Step> for Workflow {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
