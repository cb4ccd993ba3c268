//! AWS-backed providers: S3 for storage, CloudFront for the CDN, Route 53
//! for DNS.

pub mod cloudfront;
pub mod route53;
pub mod s3;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::error::DisplayErrorContext;

use crate::errors::PreviewError;

pub use cloudfront::CloudFrontCdn;
pub use route53::Route53Dns;
pub use s3::S3Storage;

/// Load shared SDK configuration (credentials chain, retry defaults) for
/// `region`. CloudFront and Route 53 are global and ignore the region.
pub async fn load_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// Map an SDK error into `UpstreamCallFailure` for `operation`, keeping the
/// full source chain in the message.
pub(crate) fn upstream<E>(operation: &'static str) -> impl FnOnce(E) -> PreviewError
where
    E: std::error::Error,
{
    move |err| PreviewError::upstream(operation, DisplayErrorContext(&err).to_string())
}
