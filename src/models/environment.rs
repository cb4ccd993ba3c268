//! One pull request's preview environment and the names derived from it.

use std::path::PathBuf;

use crate::config::PreviewSettings;

/// Sub-domain used when the trigger carries no pull request number.
pub const DEFAULT_SUB_DOMAIN: &str = "preview";

/// A preview environment, identified by `(app_name, sub_domain)`.
///
/// Every other field is derived. The bucket and origin are shared by all
/// environments of an app; only the object prefix, DNS record and deployment
/// records belong to this environment alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub app_name: String,
    pub sub_domain: String,
    /// `{app_name}-preview-deployment`
    pub bucket_name: String,
    /// Bucket endpoint host the CDN fetches from; also keys the distribution.
    pub origin_id: String,
    /// Zone apex the preview host names hang off, without a trailing dot.
    pub domain_name: String,
    pub content_directory: PathBuf,
}

impl Environment {
    pub fn new(settings: &PreviewSettings, sub_domain: impl Into<String>) -> Self {
        let bucket_name = bucket_name_for(&settings.app_name);
        let origin_id = format!("{}.s3.{}.amazonaws.com", bucket_name, settings.region);
        Self {
            app_name: settings.app_name.clone(),
            sub_domain: sub_domain.into(),
            bucket_name,
            origin_id,
            domain_name: settings.domain.trim_end_matches('.').to_string(),
            content_directory: settings.build_dir.clone(),
        }
    }

    /// Environment for pull request `number`; `preview-{number}`, or plain
    /// `preview` when the number is zero.
    pub fn for_pull_request(settings: &PreviewSettings, number: u64) -> Self {
        let sub_domain = if number == 0 {
            DEFAULT_SUB_DOMAIN.to_string()
        } else {
            format!("{}-{}", DEFAULT_SUB_DOMAIN, number)
        };
        Self::new(settings, sub_domain)
    }

    /// Object key prefix owning this environment's files, slash-terminated so
    /// `preview-4/` never matches keys of `preview-42/`.
    pub fn prefix(&self) -> String {
        format!("{}/", self.sub_domain)
    }

    /// Fully qualified DNS record name, e.g. `preview-42.example.com.`
    pub fn record_name(&self) -> String {
        format!("{}.{}.", self.sub_domain, self.domain_name)
    }

    pub fn preview_url(&self) -> String {
        format!("https://{}.{}", self.sub_domain, self.domain_name)
    }

    /// Name of the deployment environment on the review platform.
    pub fn deployment_environment(&self) -> &str {
        &self.sub_domain
    }
}

pub fn bucket_name_for(app_name: &str) -> String {
    format!("{}-preview-deployment", app_name)
}

/// Name of the viewer-request function shared by all environments of an app.
pub fn edge_function_name(app_name: &str) -> String {
    format!("{}-preview-router", app_name)
}
