//! CDN on CloudFront: origin access controls, functions and distributions.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudfront::{
    Client,
    primitives::Blob,
    types::{
        Aliases, AllowedMethods, CachedMethods, DefaultCacheBehavior, DistributionConfig,
        EventType, FunctionAssociation, FunctionAssociations, FunctionConfig, FunctionRuntime,
        FunctionStage, HttpVersion, Method, MinimumProtocolVersion, Origin,
        OriginAccessControlConfig, OriginAccessControlOriginTypes,
        OriginAccessControlSigningBehaviors, OriginAccessControlSigningProtocols, Origins,
        PriceClass, S3OriginConfig, SslSupportMethod, ViewerCertificate, ViewerProtocolPolicy,
    },
};

use super::upstream;
use crate::{
    errors::PreviewResult,
    models::handle::{DistributionHandle, FunctionHandle, OriginAccessControlHandle},
    providers::{Cdn, DistributionSpec, DistributionSummary, FunctionSummary},
};

const FUNCTION_RUNTIME: &str = "cloudfront-js-2.0";
const MINIMUM_TLS: &str = "TLSv1.2_2021";

pub struct CloudFrontCdn {
    client: Client,
}

impl CloudFrontCdn {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn function_config(comment: &str) -> PreviewResult<FunctionConfig> {
    FunctionConfig::builder()
        .comment(comment)
        .runtime(FunctionRuntime::from(FUNCTION_RUNTIME))
        .build()
        .map_err(upstream("cloudfront:FunctionConfig"))
}

fn distribution_config(spec: &DistributionSpec) -> PreviewResult<DistributionConfig> {
    let build = upstream::<aws_sdk_cloudfront::error::BuildError>;

    let origin = Origin::builder()
        .id(&spec.origin_id)
        .domain_name(&spec.origin_id)
        .origin_path("")
        .origin_access_control_id(&spec.origin_access_control_id)
        .s3_origin_config(S3OriginConfig::builder().origin_access_identity("").build())
        .build()
        .map_err(build("cloudfront:Origin"))?;

    let cached_methods = CachedMethods::builder()
        .quantity(2)
        .items(Method::Get)
        .items(Method::Head)
        .build()
        .map_err(build("cloudfront:CachedMethods"))?;
    let allowed_methods = AllowedMethods::builder()
        .quantity(2)
        .items(Method::Get)
        .items(Method::Head)
        .cached_methods(cached_methods)
        .build()
        .map_err(build("cloudfront:AllowedMethods"))?;

    let function_associations = FunctionAssociations::builder()
        .quantity(1)
        .items(
            FunctionAssociation::builder()
                .function_arn(&spec.function_arn)
                .event_type(EventType::ViewerRequest)
                .build()
                .map_err(build("cloudfront:FunctionAssociation"))?,
        )
        .build()
        .map_err(build("cloudfront:FunctionAssociations"))?;

    let default_cache_behavior = DefaultCacheBehavior::builder()
        .target_origin_id(&spec.origin_id)
        .viewer_protocol_policy(ViewerProtocolPolicy::RedirectToHttps)
        .compress(true)
        .cache_policy_id(&spec.cache_policy_id)
        .allowed_methods(allowed_methods)
        .function_associations(function_associations)
        .build()
        .map_err(build("cloudfront:DefaultCacheBehavior"))?;

    DistributionConfig::builder()
        .caller_reference(&spec.caller_reference)
        .comment(&spec.comment)
        .enabled(true)
        .default_root_object(&spec.default_root_object)
        .aliases(
            Aliases::builder()
                .quantity(1)
                .items(&spec.alias)
                .build()
                .map_err(build("cloudfront:Aliases"))?,
        )
        .origins(
            Origins::builder()
                .quantity(1)
                .items(origin)
                .build()
                .map_err(build("cloudfront:Origins"))?,
        )
        .default_cache_behavior(default_cache_behavior)
        .viewer_certificate(
            ViewerCertificate::builder()
                .cloud_front_default_certificate(false)
                .acm_certificate_arn(&spec.certificate_arn)
                .ssl_support_method(SslSupportMethod::from("sni-only"))
                .minimum_protocol_version(MinimumProtocolVersion::from(MINIMUM_TLS))
                .build(),
        )
        .http_version(HttpVersion::Http2)
        .is_ipv6_enabled(true)
        .price_class(PriceClass::from("PriceClass_All"))
        .build()
        .map_err(build("cloudfront:DistributionConfig"))
}

#[async_trait]
impl Cdn for CloudFrontCdn {
    async fn list_origin_access_controls(&self) -> PreviewResult<Vec<OriginAccessControlHandle>> {
        let mut found = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .client
                .list_origin_access_controls()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(upstream("cloudfront:ListOriginAccessControls"))?;
            let Some(list) = output.origin_access_control_list() else {
                break;
            };
            found.extend(list.items().iter().map(|item| OriginAccessControlHandle {
                id: item.id().to_string(),
                name: item.name().to_string(),
            }));
            match list.next_marker() {
                Some(next) if list.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(found)
    }

    async fn create_origin_access_control(
        &self,
        name: &str,
        description: &str,
    ) -> PreviewResult<OriginAccessControlHandle> {
        let config = OriginAccessControlConfig::builder()
            .name(name)
            .description(description)
            .signing_protocol(OriginAccessControlSigningProtocols::Sigv4)
            .signing_behavior(OriginAccessControlSigningBehaviors::Always)
            .origin_access_control_origin_type(OriginAccessControlOriginTypes::S3)
            .build()
            .map_err(upstream("cloudfront:OriginAccessControlConfig"))?;
        let output = self
            .client
            .create_origin_access_control()
            .origin_access_control_config(config)
            .send()
            .await
            .map_err(upstream("cloudfront:CreateOriginAccessControl"))?;

        Ok(OriginAccessControlHandle {
            id: output
                .origin_access_control()
                .map(|oac| oac.id().to_string())
                .unwrap_or_default(),
            name: name.to_string(),
        })
    }

    async fn list_functions(&self) -> PreviewResult<Vec<FunctionSummary>> {
        let mut found = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .client
                .list_functions()
                .stage(FunctionStage::Development)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(upstream("cloudfront:ListFunctions"))?;
            let Some(list) = output.function_list() else {
                break;
            };
            found.extend(list.items().iter().map(|item| FunctionSummary {
                name: item.name().to_string(),
                arn: item
                    .function_metadata()
                    .map(|meta| meta.function_arn().to_string())
                    .unwrap_or_default(),
            }));
            match list.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(found)
    }

    async fn describe_function(&self, name: &str) -> PreviewResult<String> {
        let output = self
            .client
            .describe_function()
            .name(name)
            .stage(FunctionStage::Development)
            .send()
            .await
            .map_err(upstream("cloudfront:DescribeFunction"))?;
        Ok(output.e_tag().unwrap_or_default().to_string())
    }

    async fn create_function(
        &self,
        name: &str,
        comment: &str,
        code: &str,
    ) -> PreviewResult<String> {
        let output = self
            .client
            .create_function()
            .name(name)
            .function_config(function_config(comment)?)
            .function_code(Blob::new(code.as_bytes().to_vec()))
            .send()
            .await
            .map_err(upstream("cloudfront:CreateFunction"))?;
        Ok(output.e_tag().unwrap_or_default().to_string())
    }

    async fn update_function(
        &self,
        name: &str,
        etag: &str,
        comment: &str,
        code: &str,
    ) -> PreviewResult<String> {
        let output = self
            .client
            .update_function()
            .name(name)
            .if_match(etag)
            .function_config(function_config(comment)?)
            .function_code(Blob::new(code.as_bytes().to_vec()))
            .send()
            .await
            .map_err(upstream("cloudfront:UpdateFunction"))?;
        Ok(output.e_tag().unwrap_or_default().to_string())
    }

    async fn publish_function(&self, name: &str, etag: &str) -> PreviewResult<FunctionHandle> {
        let output = self
            .client
            .publish_function()
            .name(name)
            .if_match(etag)
            .send()
            .await
            .map_err(upstream("cloudfront:PublishFunction"))?;

        Ok(FunctionHandle {
            name: name.to_string(),
            arn: output
                .function_summary()
                .and_then(|summary| summary.function_metadata())
                .map(|meta| meta.function_arn().to_string())
                .unwrap_or_default(),
        })
    }

    async fn list_distributions(&self) -> PreviewResult<Vec<DistributionSummary>> {
        let mut found = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .client
                .list_distributions()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(upstream("cloudfront:ListDistributions"))?;
            let Some(list) = output.distribution_list() else {
                break;
            };
            found.extend(list.items().iter().map(|item| DistributionSummary {
                id: item.id().to_string(),
                domain_name: item.domain_name().to_string(),
                origin_domains: item
                    .origins()
                    .map(|origins| {
                        origins
                            .items()
                            .iter()
                            .map(|origin| origin.domain_name().to_string())
                            .collect()
                    })
                    .unwrap_or_default(),
            }));
            match list.next_marker() {
                Some(next) if list.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(found)
    }

    async fn create_distribution(
        &self,
        spec: &DistributionSpec,
    ) -> PreviewResult<DistributionHandle> {
        let output = self
            .client
            .create_distribution()
            .distribution_config(distribution_config(spec)?)
            .send()
            .await
            .map_err(upstream("cloudfront:CreateDistribution"))?;

        let (id, domain_name) = output
            .distribution()
            .map(|d| (d.id().to_string(), d.domain_name().to_string()))
            .unwrap_or_default();
        Ok(DistributionHandle { id, domain_name })
    }
}
