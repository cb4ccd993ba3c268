//! Handles returned by reconcilers once a resource is confirmed present.
//!
//! Handles live for one run only. Nothing here is persisted; the next run
//! asks the provider again.

/// Common view over every handle: the identifier downstream steps depend on.
pub trait ResourceHandle {
    /// Provider identifier. An empty id means the provider accepted a create
    /// call without returning anything usable.
    fn id(&self) -> &str;

    /// Whether every attribute later steps read is present.
    fn is_complete(&self) -> bool {
        !self.id().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketHandle {
    pub name: String,
}

impl ResourceHandle for BucketHandle {
    fn id(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginAccessControlHandle {
    pub id: String,
    pub name: String,
}

impl ResourceHandle for OriginAccessControlHandle {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A published CDN function. The ARN is what distributions associate with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHandle {
    pub name: String,
    pub arn: String,
}

impl ResourceHandle for FunctionHandle {
    fn id(&self) -> &str {
        &self.arn
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionHandle {
    pub id: String,
    /// CDN-assigned host, e.g. `d111111abcdef8.cloudfront.net`.
    pub domain_name: String,
}

impl ResourceHandle for DistributionHandle {
    fn id(&self) -> &str {
        &self.id
    }

    /// DNS records alias the domain name, so it is as load-bearing as the id.
    fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.domain_name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHandle {
    pub name: String,
    pub target: String,
}

impl ResourceHandle for RecordHandle {
    fn id(&self) -> &str {
        &self.name
    }
}
