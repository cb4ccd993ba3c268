//! Stands up and tears down one preview environment.
//!
//! Provisioning walks the resources in dependency order, each step feeding
//! identifiers to the next:
//!
//! bucket → origin access control → edge function → distribution →
//! bucket policy → DNS record → deployment → content sync.
//!
//! The bucket and distribution are shared by every environment of the app and
//! survive decommission. Deployment status reporting is the only step whose
//! failure is logged instead of aborting the run.

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::PreviewSettings,
    edge::{artifact, router::ROUTE_FALLBACK},
    errors::{PreviewError, PreviewResult, ResourceKind},
    models::{
        deployment::DeploymentStatus,
        environment::{Environment, edge_function_name},
        handle::{DistributionHandle, FunctionHandle, OriginAccessControlHandle, RecordHandle},
    },
    providers::{Clients, DistributionSpec, HostedZone},
    services::{
        deployment_tracker::DeploymentTracker,
        reconciler::{AlwaysReapply, EnsureOnlyIfAbsent, Reconciler},
        resources::{
            BucketResource, DistributionResource, DnsRecordResource, EdgeFunctionResource,
            OriginAccessControlResource,
        },
        sync::ContentSync,
    },
};

/// Managed "CachingDisabled" cache policy.
pub const CACHING_DISABLED_POLICY_ID: &str = "4135ea2d-6df8-44a3-9df3-4b5a84be39ad";

const DEFAULT_ROOT_OBJECT: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub preview_url: String,
    pub distribution: DistributionHandle,
    pub record: RecordHandle,
    /// `None` when the review platform could not be reached.
    pub deployment_id: Option<u64>,
    pub removed_objects: usize,
    pub uploaded_objects: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecommissionReport {
    pub removed_objects: usize,
    pub removed_deployments: usize,
    pub record_deleted: bool,
}

pub struct EnvironmentOrchestrator<'a> {
    clients: &'a Clients,
    settings: &'a PreviewSettings,
}

impl<'a> EnvironmentOrchestrator<'a> {
    pub fn new(clients: &'a Clients, settings: &'a PreviewSettings) -> Self {
        Self { clients, settings }
    }

    pub async fn provision(
        &self,
        env: &Environment,
        branch: &str,
    ) -> PreviewResult<ProvisionReport> {
        let storage = self.clients.storage.as_ref();
        let cdn = self.clients.cdn.as_ref();

        let bucket = EnsureOnlyIfAbsent(BucketResource::new(storage))
            .ensure(&env.bucket_name)
            .await?;

        let oac = EnsureOnlyIfAbsent(OriginAccessControlResource::new(cdn, &env.app_name))
            .ensure(&env.origin_id)
            .await?;

        let function = AlwaysReapply(EdgeFunctionResource::new(
            cdn,
            &env.app_name,
            artifact::function_source(ROUTE_FALLBACK),
        ))
        .ensure(&edge_function_name(&env.app_name))
        .await?;

        let spec = self.distribution_spec(env, &oac, &function);
        let distribution = EnsureOnlyIfAbsent(DistributionResource::new(cdn, spec))
            .ensure(&env.origin_id)
            .await?;

        // Re-applied every run: the condition must name the current distribution.
        let policy = bucket_policy(&bucket.name, &self.settings.account_id, &distribution.id);
        storage.put_bucket_policy(&bucket.name, &policy).await?;
        info!(bucket = %bucket.name, distribution = %distribution.id, "bucket policy applied");

        let zone = self.hosted_zone(env).await?;
        let record = EnsureOnlyIfAbsent(DnsRecordResource::new(
            self.clients.dns.as_ref(),
            &zone,
            &distribution.domain_name,
            &env.app_name,
        ))
        .ensure(&env.record_name())
        .await?;

        let tracker = DeploymentTracker::new(self.clients.review.as_ref());
        let deployment_id = self.begin_deployment(&tracker, env, branch).await;

        let sync = ContentSync::new(storage, &bucket.name, self.settings.upload_concurrency);
        let synced = match sync.replace(&env.prefix(), &env.content_directory).await {
            Ok(report) => report,
            Err(err) => {
                if let Some(id) = deployment_id {
                    report_status(&tracker, id, DeploymentStatus::Failure, None, env).await;
                }
                return Err(err);
            }
        };

        let preview_url = env.preview_url();
        if let Some(id) = deployment_id {
            report_status(
                &tracker,
                id,
                DeploymentStatus::Success,
                Some(&preview_url),
                env,
            )
            .await;
        }

        info!(url = %preview_url, "preview environment ready");
        Ok(ProvisionReport {
            preview_url,
            distribution,
            record,
            deployment_id,
            removed_objects: synced.removed,
            uploaded_objects: synced.uploaded,
        })
    }

    /// Remove the environment's objects, deployments and DNS record. The
    /// shared bucket and distribution are left alone.
    pub async fn decommission(
        &self,
        env: &Environment,
        branch: &str,
    ) -> PreviewResult<DecommissionReport> {
        let sync = ContentSync::new(
            self.clients.storage.as_ref(),
            &env.bucket_name,
            self.settings.upload_concurrency,
        );
        let removed_objects = sync.delete_prefix(&env.prefix()).await?;
        info!(prefix = %env.prefix(), removed_objects, "environment content removed");

        let tracker = DeploymentTracker::new(self.clients.review.as_ref());
        let removed_deployments = match tracker
            .delete_all(branch, env.deployment_environment())
            .await
        {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "could not remove deployments");
                0
            }
        };

        let record_deleted = self.delete_record(env).await?;

        Ok(DecommissionReport {
            removed_objects,
            removed_deployments,
            record_deleted,
        })
    }

    fn distribution_spec(
        &self,
        env: &Environment,
        oac: &OriginAccessControlHandle,
        function: &FunctionHandle,
    ) -> DistributionSpec {
        DistributionSpec {
            caller_reference: format!("{}-{}", env.app_name, Uuid::new_v4()),
            origin_id: env.origin_id.clone(),
            origin_access_control_id: oac.id.clone(),
            function_arn: function.arn.clone(),
            alias: format!("*.{}", env.domain_name),
            certificate_arn: self.settings.certificate_arn.clone(),
            default_root_object: DEFAULT_ROOT_OBJECT.to_string(),
            cache_policy_id: CACHING_DISABLED_POLICY_ID.to_string(),
            comment: format!("{} preview deployments", env.app_name),
        }
    }

    async fn hosted_zone(&self, env: &Environment) -> PreviewResult<HostedZone> {
        let zone_name = format!("{}.", env.domain_name);
        match self.clients.dns.find_hosted_zone(&zone_name).await? {
            Some(zone) => Ok(zone),
            None => Err(PreviewError::ResourceNotFound {
                kind: ResourceKind::HostedZone,
                name: zone_name,
            }),
        }
    }

    async fn delete_record(&self, env: &Environment) -> PreviewResult<bool> {
        let zone = self.hosted_zone(env).await?;
        let name = env.record_name();
        let existing = self
            .clients
            .dns
            .list_records(&zone.id, &name)
            .await?
            .into_iter()
            .find(|record| record.is_alias_named(&name));

        match existing {
            Some(record) => {
                self.clients.dns.delete_record(&zone.id, &record).await?;
                info!(record = %name, "dns record deleted");
                Ok(true)
            }
            None => {
                info!(record = %name, "dns record already absent");
                Ok(false)
            }
        }
    }

    /// Find or create the deployment and mark it in progress. Failures are
    /// logged and yield `None`; provisioning carries on without tracking.
    async fn begin_deployment(
        &self,
        tracker: &DeploymentTracker<'_>,
        env: &Environment,
        branch: &str,
    ) -> Option<u64> {
        let environment = env.deployment_environment();
        let id = match tracker.start(branch, environment).await {
            Ok(id) => id,
            Err(PreviewError::Configuration(reason)) => {
                warn!(%reason, "skipping deployment tracking");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "could not start deployment");
                return None;
            }
        };
        report_status(tracker, id, DeploymentStatus::InProgress, None, env).await;
        Some(id)
    }
}

async fn report_status(
    tracker: &DeploymentTracker<'_>,
    id: u64,
    status: DeploymentStatus,
    preview_url: Option<&str>,
    env: &Environment,
) {
    if let Err(err) = tracker
        .update_status(id, status, preview_url, env.deployment_environment())
        .await
    {
        warn!(deployment = id, %status, error = %err, "could not report deployment status");
    }
}

/// Policy letting only `distribution_id` read objects from `bucket`.
pub fn bucket_policy(bucket: &str, account_id: &str, distribution_id: &str) -> String {
    json!({
        "Version": "2008-10-17",
        "Id": "PolicyForCloudFrontPrivateContent",
        "Statement": [{
            "Sid": "AllowCloudFrontServicePrincipal",
            "Effect": "Allow",
            "Principal": { "Service": "cloudfront.amazonaws.com" },
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{}/*", bucket),
            "Condition": {
                "StringEquals": {
                    "AWS:SourceArn": format!(
                        "arn:aws:cloudfront::{}:distribution/{}",
                        account_id, distribution_id
                    )
                }
            }
        }]
    })
    .to_string()
}
