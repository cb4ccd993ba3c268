//! Object storage on S3.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::{
    Client,
    primitives::ByteStream,
    types::{
        BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
        PublicAccessBlockConfiguration,
    },
};
use bytes::Bytes;
use tracing::debug;

use super::upstream;
use crate::{
    errors::{PreviewError, PreviewResult},
    models::handle::BucketHandle,
    providers::{ObjectPage, ObjectStorage},
};

/// Buckets in this region are created without a location constraint.
const DEFAULT_REGION: &str = "us-east-1";

pub struct S3Storage {
    client: Client,
    region: String,
}

impl S3Storage {
    pub fn new(config: &SdkConfig, region: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            region: region.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn list_buckets(&self) -> PreviewResult<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(upstream("s3:ListBuckets"))?;
        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name().map(str::to_string))
            .collect())
    }

    async fn create_bucket(&self, name: &str) -> PreviewResult<BucketHandle> {
        let mut request = self.client.create_bucket().bucket(name);
        if !self.region.eq_ignore_ascii_case(DEFAULT_REGION) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        let output = request
            .send()
            .await
            .map_err(upstream("s3:CreateBucket"))?;
        debug!("bucket location {:?}", output.location());

        self.client
            .put_public_access_block()
            .bucket(name)
            .public_access_block_configuration(
                PublicAccessBlockConfiguration::builder()
                    .block_public_acls(true)
                    .block_public_policy(true)
                    .ignore_public_acls(true)
                    .restrict_public_buckets(true)
                    .build(),
            )
            .send()
            .await
            .map_err(upstream("s3:PutPublicAccessBlock"))?;

        Ok(BucketHandle {
            name: name.to_string(),
        })
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> PreviewResult<()> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(upstream("s3:PutBucketPolicy"))?;
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> PreviewResult<ObjectPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(upstream("s3:ListObjectsV2"))?;

        Ok(ObjectPage {
            keys: output
                .contents()
                .iter()
                .filter_map(|object| object.key().map(str::to_string))
                .collect(),
            next_continuation_token: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> PreviewResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(upstream("s3:DeleteObjects"))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(upstream("s3:DeleteObjects"))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(upstream("s3:DeleteObjects"))?;

        if let Some(failed) = output.errors().first() {
            return Err(PreviewError::upstream(
                "s3:DeleteObjects",
                format!(
                    "{} of {} keys not deleted, first `{}`: {}",
                    output.errors().len(),
                    keys.len(),
                    failed.key().unwrap_or_default(),
                    failed.message().unwrap_or_default()
                ),
            ));
        }
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
        content_md5: &str,
    ) -> PreviewResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_md5(content_md5)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(upstream("s3:PutObject"))?;
        Ok(())
    }
}
