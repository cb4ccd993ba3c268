//! Call boundary to the external providers a run depends on.
//!
//! Each provider is an async trait so the orchestrator can be driven by the
//! real AWS and GitHub clients in production and by in-memory fakes in tests.
//! `Clients` bundles one instance of each; it is built once by the entry
//! point and borrowed by everything else.

pub mod aws;
pub mod github;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    errors::PreviewResult,
    models::{
        deployment::{DeploymentRecord, DeploymentStatus},
        handle::{BucketHandle, DistributionHandle, FunctionHandle, OriginAccessControlHandle},
    },
};

/// Largest batch the storage provider accepts for list and bulk delete.
pub const OBJECT_PAGE_LIMIT: i32 = 1000;

/// Hosted zone id every CDN alias record targets.
pub const CDN_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// One page of object keys under a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    pub next_continuation_token: Option<String>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn list_buckets(&self) -> PreviewResult<Vec<String>>;

    async fn create_bucket(&self, name: &str) -> PreviewResult<BucketHandle>;

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> PreviewResult<()>;

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> PreviewResult<ObjectPage>;

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> PreviewResult<()>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
        content_md5: &str,
    ) -> PreviewResult<()>;
}

/// A distribution as the CDN lists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSummary {
    pub id: String,
    pub domain_name: String,
    /// Domain names of the configured origins, in order.
    pub origin_domains: Vec<String>,
}

/// A CDN function as listed in the development stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSummary {
    pub name: String,
    pub arn: String,
}

/// Creation parameters for the shared distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSpec {
    pub caller_reference: String,
    pub origin_id: String,
    pub origin_access_control_id: String,
    pub function_arn: String,
    /// Wildcard alias, e.g. `*.example.com`.
    pub alias: String,
    pub certificate_arn: String,
    pub default_root_object: String,
    pub cache_policy_id: String,
    pub comment: String,
}

#[async_trait]
pub trait Cdn: Send + Sync {
    async fn list_origin_access_controls(&self) -> PreviewResult<Vec<OriginAccessControlHandle>>;

    async fn create_origin_access_control(
        &self,
        name: &str,
        description: &str,
    ) -> PreviewResult<OriginAccessControlHandle>;

    async fn list_functions(&self) -> PreviewResult<Vec<FunctionSummary>>;

    /// Current ETag of a development-stage function.
    async fn describe_function(&self, name: &str) -> PreviewResult<String>;

    /// Create a function, returning its ETag.
    async fn create_function(&self, name: &str, comment: &str, code: &str)
    -> PreviewResult<String>;

    /// Replace a function's code, returning its new ETag.
    async fn update_function(
        &self,
        name: &str,
        etag: &str,
        comment: &str,
        code: &str,
    ) -> PreviewResult<String>;

    async fn publish_function(&self, name: &str, etag: &str) -> PreviewResult<FunctionHandle>;

    async fn list_distributions(&self) -> PreviewResult<Vec<DistributionSummary>>;

    async fn create_distribution(&self, spec: &DistributionSpec)
    -> PreviewResult<DistributionHandle>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    pub id: String,
    /// Zone name with trailing dot.
    pub name: String,
}

/// A DNS record set as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub name: String,
    pub record_type: String,
    pub alias_target: Option<String>,
}

impl DnsRecord {
    /// Whether this is an A alias named `name`, the only kind of record this
    /// tool creates. Other record types sharing the name are left alone.
    pub fn is_alias_named(&self, name: &str) -> bool {
        self.record_type == "A"
            && self.alias_target.is_some()
            && self.name.eq_ignore_ascii_case(name)
    }
}

#[async_trait]
pub trait Dns: Send + Sync {
    /// Hosted zone named exactly `zone_name` (with trailing dot), if any.
    async fn find_hosted_zone(&self, zone_name: &str) -> PreviewResult<Option<HostedZone>>;

    /// Record sets in lexical order starting at `start_name`.
    async fn list_records(&self, zone_id: &str, start_name: &str) -> PreviewResult<Vec<DnsRecord>>;

    /// Create an A alias `name` → `target` on the CDN hosted zone.
    async fn create_alias_record(
        &self,
        zone_id: &str,
        name: &str,
        target: &str,
        comment: &str,
    ) -> PreviewResult<()>;

    async fn delete_record(&self, zone_id: &str, record: &DnsRecord) -> PreviewResult<()>;
}

#[async_trait]
pub trait ReviewPlatform: Send + Sync {
    async fn list_deployments(
        &self,
        git_ref: &str,
        environment: &str,
    ) -> PreviewResult<Vec<DeploymentRecord>>;

    async fn create_deployment(
        &self,
        git_ref: &str,
        environment: &str,
    ) -> PreviewResult<DeploymentRecord>;

    async fn create_deployment_status(
        &self,
        deployment_id: u64,
        status: DeploymentStatus,
        environment: &str,
        environment_url: Option<&str>,
    ) -> PreviewResult<()>;

    async fn delete_deployment(&self, deployment_id: u64) -> PreviewResult<()>;
}

/// The provider clients of one process.
pub struct Clients {
    pub storage: Box<dyn ObjectStorage>,
    pub cdn: Box<dyn Cdn>,
    pub dns: Box<dyn Dns>,
    pub review: Box<dyn ReviewPlatform>,
}
