//! The concrete resources an environment is built from.
//!
//! Each type carries the provider client plus whatever handles from earlier
//! steps its creation parameters need; the identity key is passed to
//! `ensure` by the orchestrator.

use async_trait::async_trait;

use crate::{
    errors::{PreviewResult, ResourceKind},
    models::handle::{
        BucketHandle, DistributionHandle, FunctionHandle, OriginAccessControlHandle, RecordHandle,
    },
    providers::{Cdn, DistributionSpec, Dns, HostedZone, ObjectStorage},
    services::reconciler::{IdentityResource, VersionedResource},
};

/// Storage bucket, identified by name.
pub struct BucketResource<'a> {
    storage: &'a dyn ObjectStorage,
}

impl<'a> BucketResource<'a> {
    pub fn new(storage: &'a dyn ObjectStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<'a> IdentityResource for BucketResource<'a> {
    type Handle = BucketHandle;
    const KIND: ResourceKind = ResourceKind::StorageBucket;

    async fn find(&self, key: &str) -> PreviewResult<Option<BucketHandle>> {
        let buckets = self.storage.list_buckets().await?;
        Ok(buckets
            .into_iter()
            .find(|name| name == key)
            .map(|name| BucketHandle { name }))
    }

    async fn create(&self, key: &str) -> PreviewResult<BucketHandle> {
        self.storage.create_bucket(key).await
    }
}

/// Origin access control, identified by its name (the origin id).
pub struct OriginAccessControlResource<'a> {
    cdn: &'a dyn Cdn,
    description: String,
}

impl<'a> OriginAccessControlResource<'a> {
    pub fn new(cdn: &'a dyn Cdn, app_name: &str) -> Self {
        Self {
            cdn,
            description: format!("Origin access control for {} preview deployments", app_name),
        }
    }
}

#[async_trait]
impl<'a> IdentityResource for OriginAccessControlResource<'a> {
    type Handle = OriginAccessControlHandle;
    const KIND: ResourceKind = ResourceKind::OriginAccessControl;

    async fn find(&self, key: &str) -> PreviewResult<Option<OriginAccessControlHandle>> {
        let controls = self.cdn.list_origin_access_controls().await?;
        Ok(controls.into_iter().find(|oac| oac.name == key))
    }

    async fn create(&self, key: &str) -> PreviewResult<OriginAccessControlHandle> {
        self.cdn
            .create_origin_access_control(key, &self.description)
            .await
    }
}

/// Viewer-request edge function, identified by name. Its code is pushed and
/// published on every run.
pub struct EdgeFunctionResource<'a> {
    cdn: &'a dyn Cdn,
    comment: String,
    code: String,
}

impl<'a> EdgeFunctionResource<'a> {
    pub fn new(cdn: &'a dyn Cdn, app_name: &str, code: String) -> Self {
        Self {
            cdn,
            comment: format!("Routes {} preview hosts to their prefix", app_name),
            code,
        }
    }
}

#[async_trait]
impl<'a> VersionedResource for EdgeFunctionResource<'a> {
    type Handle = FunctionHandle;
    const KIND: ResourceKind = ResourceKind::CdnFunction;

    async fn exists(&self, key: &str) -> PreviewResult<bool> {
        let functions = self.cdn.list_functions().await?;
        Ok(functions.iter().any(|function| function.name == key))
    }

    async fn create(&self, key: &str) -> PreviewResult<FunctionHandle> {
        let etag = self.cdn.create_function(key, &self.comment, &self.code).await?;
        self.cdn.publish_function(key, &etag).await
    }

    async fn update(&self, key: &str) -> PreviewResult<FunctionHandle> {
        let current = self.cdn.describe_function(key).await?;
        let etag = self
            .cdn
            .update_function(key, &current, &self.comment, &self.code)
            .await?;
        self.cdn.publish_function(key, &etag).await
    }
}

/// The app's shared distribution, identified by the domain of its first
/// origin.
pub struct DistributionResource<'a> {
    cdn: &'a dyn Cdn,
    spec: DistributionSpec,
}

impl<'a> DistributionResource<'a> {
    pub fn new(cdn: &'a dyn Cdn, spec: DistributionSpec) -> Self {
        Self { cdn, spec }
    }
}

#[async_trait]
impl<'a> IdentityResource for DistributionResource<'a> {
    type Handle = DistributionHandle;
    const KIND: ResourceKind = ResourceKind::CdnDistribution;

    async fn find(&self, key: &str) -> PreviewResult<Option<DistributionHandle>> {
        let distributions = self.cdn.list_distributions().await?;
        Ok(distributions
            .into_iter()
            .find(|d| d.origin_domains.first().is_some_and(|origin| origin == key))
            .map(|d| DistributionHandle {
                id: d.id,
                domain_name: d.domain_name,
            }))
    }

    async fn create(&self, _key: &str) -> PreviewResult<DistributionHandle> {
        self.cdn.create_distribution(&self.spec).await
    }
}

/// Alias record of one environment, identified by its fully qualified name.
pub struct DnsRecordResource<'a> {
    dns: &'a dyn Dns,
    zone: &'a HostedZone,
    target: &'a str,
    comment: String,
}

impl<'a> DnsRecordResource<'a> {
    pub fn new(dns: &'a dyn Dns, zone: &'a HostedZone, target: &'a str, app_name: &str) -> Self {
        Self {
            dns,
            zone,
            target,
            comment: format!("Preview deployment record for {}", app_name),
        }
    }
}

#[async_trait]
impl<'a> IdentityResource for DnsRecordResource<'a> {
    type Handle = RecordHandle;
    const KIND: ResourceKind = ResourceKind::DnsRecord;

    async fn find(&self, key: &str) -> PreviewResult<Option<RecordHandle>> {
        let records = self.dns.list_records(&self.zone.id, key).await?;
        Ok(records
            .into_iter()
            .find(|record| record.is_alias_named(key))
            .map(|record| RecordHandle {
                name: record.name,
                target: record.alias_target.unwrap_or_default(),
            }))
    }

    async fn create(&self, key: &str) -> PreviewResult<RecordHandle> {
        self.dns
            .create_alias_record(&self.zone.id, key, self.target, &self.comment)
            .await?;
        Ok(RecordHandle {
            name: key.to_string(),
            target: self.target.to_string(),
        })
    }
}
