//! Idempotent "ensure it exists" reconciliation.
//!
//! Every provider resource a run depends on is reconciled through
//! [`Reconciler::ensure`]. Two strategies implement it:
//!
//! - [`EnsureOnlyIfAbsent`] for resources that are pure identity: look the key
//!   up, reuse what is there, create only when missing.
//! - [`AlwaysReapply`] for versioned artifacts whose content must track the
//!   current build: create or update, then publish, on every run.
//!
//! Existence is always re-derived from the provider; nothing is remembered
//! between calls.

use async_trait::async_trait;
use tracing::info;

use crate::{
    errors::{PreviewError, PreviewResult, ResourceKind},
    models::handle::ResourceHandle,
};

/// Ensure the resource identified by `key` exists and return its handle.
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Handle: ResourceHandle + Send;

    async fn ensure(&self, key: &str) -> PreviewResult<Self::Handle>;
}

/// A resource that is reused unchanged once it exists.
#[async_trait]
pub trait IdentityResource: Send + Sync {
    type Handle: ResourceHandle + Send;

    const KIND: ResourceKind;

    /// Find the resource whose identity field equals `key`.
    async fn find(&self, key: &str) -> PreviewResult<Option<Self::Handle>>;

    /// Issue the single create call for `key`.
    async fn create(&self, key: &str) -> PreviewResult<Self::Handle>;
}

/// A resource whose content is re-applied on every run.
#[async_trait]
pub trait VersionedResource: Send + Sync {
    type Handle: ResourceHandle + Send;

    const KIND: ResourceKind;

    async fn exists(&self, key: &str) -> PreviewResult<bool>;

    /// Create and publish.
    async fn create(&self, key: &str) -> PreviewResult<Self::Handle>;

    /// Update in place and publish.
    async fn update(&self, key: &str) -> PreviewResult<Self::Handle>;
}

pub struct EnsureOnlyIfAbsent<R>(pub R);

pub struct AlwaysReapply<R>(pub R);

#[async_trait]
impl<R: IdentityResource> Reconciler for EnsureOnlyIfAbsent<R> {
    type Handle = R::Handle;

    async fn ensure(&self, key: &str) -> PreviewResult<R::Handle> {
        if let Some(handle) = self.0.find(key).await? {
            info!(kind = %R::KIND, key, id = handle.id(), "already present");
            return Ok(handle);
        }
        let handle = require_identifier(R::KIND, key, self.0.create(key).await?)?;
        info!(kind = %R::KIND, key, id = handle.id(), "created");
        Ok(handle)
    }
}

#[async_trait]
impl<R: VersionedResource> Reconciler for AlwaysReapply<R> {
    type Handle = R::Handle;

    async fn ensure(&self, key: &str) -> PreviewResult<R::Handle> {
        let handle = if self.0.exists(key).await? {
            let handle = self.0.update(key).await?;
            info!(kind = %R::KIND, key, "updated and published");
            handle
        } else {
            let handle = self.0.create(key).await?;
            info!(kind = %R::KIND, key, "created and published");
            handle
        };
        require_identifier(R::KIND, key, handle)
    }
}

/// Reject a handle the provider returned without its identifiers.
fn require_identifier<H: ResourceHandle>(
    kind: ResourceKind,
    key: &str,
    handle: H,
) -> PreviewResult<H> {
    if !handle.is_complete() {
        return Err(PreviewError::ResourceNotCreated {
            kind,
            key: key.to_string(),
        });
    }
    Ok(handle)
}
