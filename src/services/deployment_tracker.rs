//! Mirrors environment lifecycle into deployment records on the review
//! platform.

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info};

use crate::{
    errors::{PreviewError, PreviewResult},
    models::deployment::{DeploymentRecord, DeploymentStatus, branch_ref},
    providers::ReviewPlatform,
};

/// Deletions in flight at once during teardown.
const DELETE_CONCURRENCY: usize = 8;

pub struct DeploymentTracker<'a> {
    review: &'a dyn ReviewPlatform,
}

impl<'a> DeploymentTracker<'a> {
    pub fn new(review: &'a dyn ReviewPlatform) -> Self {
        Self { review }
    }

    /// Return the id of the deployment for `branch` in `environment`,
    /// creating one only when none exists yet. The newest match wins when
    /// several exist.
    pub async fn start(&self, branch: &str, environment: &str) -> PreviewResult<u64> {
        if branch.is_empty() {
            return Err(PreviewError::Configuration(
                "no branch name, cannot record a deployment".into(),
            ));
        }
        let git_ref = branch_ref(branch);
        let existing = self.review.list_deployments(&git_ref, environment).await?;
        if let Some(latest) = existing.iter().max_by_key(|d| (d.created_at, d.id)) {
            info!(deployment = latest.id, environment, "reusing deployment");
            return Ok(latest.id);
        }

        let created = self.review.create_deployment(&git_ref, environment).await?;
        info!(deployment = created.id, environment, "created deployment");
        Ok(created.id)
    }

    pub async fn update_status(
        &self,
        deployment_id: u64,
        status: DeploymentStatus,
        preview_url: Option<&str>,
        environment: &str,
    ) -> PreviewResult<()> {
        self.review
            .create_deployment_status(deployment_id, status, environment, preview_url)
            .await?;
        info!(deployment = deployment_id, %status, "deployment status updated");
        Ok(())
    }

    /// Remove every deployment of `branch` in `environment`. Deletions run
    /// concurrently in no particular order; the first failure fails the call.
    pub async fn delete_all(&self, branch: &str, environment: &str) -> PreviewResult<usize> {
        let git_ref = branch_ref(branch);
        let records = self.review.list_deployments(&git_ref, environment).await?;
        let removed = records.len();

        stream::iter(records)
            .map(|record| self.delete_one(record))
            .buffer_unordered(DELETE_CONCURRENCY)
            .try_collect::<Vec<()>>()
            .await?;

        info!(environment, removed, "deleted deployments");
        Ok(removed)
    }

    async fn delete_one(&self, record: DeploymentRecord) -> PreviewResult<()> {
        // Active deployments cannot be deleted.
        self.review
            .create_deployment_status(
                record.id,
                DeploymentStatus::Inactive,
                &record.environment,
                None,
            )
            .await?;
        self.review.delete_deployment(record.id).await?;
        debug!(deployment = record.id, "deleted deployment");
        Ok(())
    }
}
