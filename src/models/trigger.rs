//! Lifecycle events that start a run.

use serde::Deserialize;

use crate::errors::{PreviewError, PreviewResult};

/// What a run should do with the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Provision,
    Decommission,
}

impl Lifecycle {
    /// Map a pull request action onto a lifecycle step.
    pub fn from_action(action: &str) -> PreviewResult<Self> {
        match action {
            "opened" | "reopened" | "synchronize" => Ok(Lifecycle::Provision),
            "closed" => Ok(Lifecycle::Decommission),
            other => Err(PreviewError::UnsupportedAction(other.to_string())),
        }
    }
}

/// A resolved trigger: everything a run needs from the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub lifecycle: Lifecycle,
    pub action: String,
    pub pull_request_number: u64,
    pub branch_name: String,
}

/// Subset of the pull request webhook payload written by the CI runner.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct LifecycleEvent {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub pull_request: Option<PullRequest>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PullRequest {
    pub number: u64,
    pub head: HeadRef,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HeadRef {
    #[serde(rename = "ref")]
    pub branch: String,
}

impl LifecycleEvent {
    /// Resolve the event into a trigger.
    ///
    /// `None` when the payload carries no pull request (the run has nothing
    /// to do). An empty head branch is a `Configuration` error; unknown
    /// actions are `UnsupportedAction`.
    pub fn into_trigger(self) -> PreviewResult<Option<Trigger>> {
        let Some(pull_request) = self.pull_request else {
            return Ok(None);
        };
        if pull_request.head.branch.is_empty() {
            return Err(PreviewError::Configuration(
                "pull request has no head branch".into(),
            ));
        }
        let action = self.action.unwrap_or_default();
        let lifecycle = Lifecycle::from_action(&action)?;
        Ok(Some(Trigger {
            lifecycle,
            action,
            pull_request_number: pull_request.number,
            branch_name: pull_request.head.branch,
        }))
    }
}
