//! Deployment records kept on the code review platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A deployment of one branch into one named environment.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub id: u64,

    /// Fully qualified ref, e.g. `refs/heads/feature-x`.
    #[serde(rename = "ref")]
    pub git_ref: String,

    pub environment: String,

    pub created_at: DateTime<Utc>,
}

/// Lifecycle states of a deployment.
///
/// `Inactive` is only ever set during teardown; the platform refuses to
/// delete a deployment that is still active.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Queued,
    Pending,
    InProgress,
    Success,
    Failure,
    Inactive,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Queued => "queued",
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::InProgress => "in_progress",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failure => "failure",
            DeploymentStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ref a branch's deployments are filed under.
pub fn branch_ref(branch: &str) -> String {
    format!("refs/heads/{}", branch)
}
