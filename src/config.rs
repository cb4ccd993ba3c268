use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt, fs, io::Write, path::PathBuf};

use crate::{
    edge::router::{FallbackPolicy, ROUTE_FALLBACK},
    errors::{PreviewError, PreviewResult},
    models::trigger::{Lifecycle, LifecycleEvent, Trigger},
};

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_BUILD_DIR: &str = "out";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_UPLOAD_CONCURRENCY: usize = 8;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub app_name: Option<String>,
    pub build_dir: PathBuf,
    pub domain: Option<String>,
    pub region: String,
    pub account_id: Option<String>,
    pub certificate_arn: Option<String>,
    pub repository: Option<String>,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub event_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub action: Option<String>,
    pub pr_number: Option<u64>,
    pub branch: Option<String>,
    pub upload_concurrency: usize,
    pub fallback: FallbackPolicy,
    pub host: String,
    pub port: u16,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(
    author,
    version,
    about = "Provision and tear down per pull request preview environments"
)]
pub struct Args {
    /// Resource naming prefix (overrides PREVIEW_APP_NAME)
    #[arg(long)]
    pub app_name: Option<String>,

    /// Local directory synced to the environment (overrides PREVIEW_BUILD_DIR)
    #[arg(long)]
    pub build_dir: Option<PathBuf>,

    /// DNS zone previews are published under (overrides PREVIEW_DOMAIN)
    #[arg(long)]
    pub domain: Option<String>,

    /// AWS region of the bucket (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// AWS account id used in the bucket policy (overrides AWS_ACCOUNT_ID)
    #[arg(long)]
    pub account_id: Option<String>,

    /// ACM certificate covering `*.<domain>` (overrides PREVIEW_CERTIFICATE_ARN)
    #[arg(long)]
    pub certificate_arn: Option<String>,

    /// `owner/repo` deployments are recorded on (overrides GITHUB_REPOSITORY)
    #[arg(long)]
    pub repository: Option<String>,

    /// Token for the deployments API (overrides GITHUB_TOKEN)
    #[arg(long)]
    pub github_token: Option<String>,

    /// Deployments API base URL (overrides GITHUB_API_URL)
    #[arg(long)]
    pub github_api_url: Option<String>,

    /// Pull request event payload (overrides GITHUB_EVENT_PATH)
    #[arg(long)]
    pub event_path: Option<PathBuf>,

    /// File the preview URL is appended to as `url=...` (overrides GITHUB_OUTPUT)
    #[arg(long)]
    pub output_path: Option<PathBuf>,

    /// Lifecycle action, bypassing the event payload
    #[arg(long)]
    pub action: Option<String>,

    /// Pull request number, used with --action
    #[arg(long)]
    pub pr_number: Option<u64>,

    /// Head branch, used with --action
    #[arg(long)]
    pub branch: Option<String>,

    /// Concurrent uploads during sync (overrides PREVIEW_UPLOAD_CONCURRENCY)
    #[arg(long)]
    pub upload_concurrency: Option<usize>,

    /// Host for the local preview server (overrides PREVIEW_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port for the local preview server (overrides PREVIEW_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Extensionless-path policy of the local preview server
    #[arg(long, value_enum)]
    pub fallback: Option<FallbackPolicy>,

    /// Serve the build directory through the edge router locally and exit
    #[arg(long)]
    pub serve: bool,
}

/// Settings shared by every environment of one app.
#[derive(Debug, Clone)]
pub struct PreviewSettings {
    pub app_name: String,
    pub domain: String,
    pub region: String,
    pub account_id: String,
    pub certificate_arn: String,
    pub build_dir: PathBuf,
    pub upload_concurrency: usize,
}

/// Connection details for the review platform.
#[derive(Clone)]
pub struct GithubSettings {
    pub api_url: String,
    pub repository: String,
    pub token: String,
}

impl fmt::Debug for GithubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubSettings")
            .field("api_url", &self.api_url)
            .field("repository", &self.repository)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("app_name", &self.app_name)
            .field("build_dir", &self.build_dir)
            .field("domain", &self.domain)
            .field("region", &self.region)
            .field("account_id", &self.account_id)
            .field("certificate_arn", &self.certificate_arn)
            .field("repository", &self.repository)
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("github_api_url", &self.github_api_url)
            .field("event_path", &self.event_path)
            .field("output_path", &self.output_path)
            .field("action", &self.action)
            .field("pr_number", &self.pr_number)
            .field("branch", &self.branch)
            .field("upload_concurrency", &self.upload_concurrency)
            .field("fallback", &self.fallback)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and serve flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        Self::from_sources(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge parsed arguments with an environment lookup. CLI values win.
    pub fn from_sources(
        args: Args,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, bool)> {
        let env_port = match lookup("PREVIEW_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PREVIEW_PORT value `{}`", value))?,
            None => 3000,
        };
        let env_concurrency = match lookup("PREVIEW_UPLOAD_CONCURRENCY") {
            Some(value) => value.parse::<usize>().with_context(|| {
                format!("parsing PREVIEW_UPLOAD_CONCURRENCY value `{}`", value)
            })?,
            None => DEFAULT_UPLOAD_CONCURRENCY,
        };

        // --- Merge ---
        let cfg = Self {
            app_name: args.app_name.or_else(|| lookup("PREVIEW_APP_NAME")),
            build_dir: args
                .build_dir
                .or_else(|| lookup("PREVIEW_BUILD_DIR").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR)),
            domain: args.domain.or_else(|| lookup("PREVIEW_DOMAIN")),
            region: args
                .region
                .or_else(|| lookup("AWS_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.into()),
            account_id: args.account_id.or_else(|| lookup("AWS_ACCOUNT_ID")),
            certificate_arn: args
                .certificate_arn
                .or_else(|| lookup("PREVIEW_CERTIFICATE_ARN")),
            repository: args.repository.or_else(|| lookup("GITHUB_REPOSITORY")),
            github_token: args.github_token.or_else(|| lookup("GITHUB_TOKEN")),
            github_api_url: args
                .github_api_url
                .or_else(|| lookup("GITHUB_API_URL"))
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.into()),
            event_path: args
                .event_path
                .or_else(|| lookup("GITHUB_EVENT_PATH").map(PathBuf::from)),
            output_path: args
                .output_path
                .or_else(|| lookup("GITHUB_OUTPUT").map(PathBuf::from)),
            action: args.action,
            pr_number: args.pr_number,
            branch: args.branch,
            upload_concurrency: args.upload_concurrency.unwrap_or(env_concurrency).max(1),
            fallback: args.fallback.unwrap_or(ROUTE_FALLBACK),
            host: args
                .host
                .or_else(|| lookup("PREVIEW_HOST"))
                .unwrap_or_else(|| "127.0.0.1".into()),
            port: args.port.unwrap_or(env_port),
        };

        Ok((cfg, args.serve))
    }

    /// Append `url=<preview_url>` to the step output file, when one is set.
    pub fn write_output(&self, preview_url: &str) -> PreviewResult<()> {
        let Some(path) = &self.output_path else {
            return Ok(());
        };
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "url={}", preview_url)?;
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// App-wide settings required for provisioning and decommissioning.
    pub fn preview_settings(&self) -> PreviewResult<PreviewSettings> {
        Ok(PreviewSettings {
            app_name: required(&self.app_name, "app-name")?,
            domain: required(&self.domain, "domain")?,
            region: self.region.clone(),
            account_id: required(&self.account_id, "account-id")?,
            certificate_arn: required(&self.certificate_arn, "certificate-arn")?,
            build_dir: self.build_dir.clone(),
            upload_concurrency: self.upload_concurrency,
        })
    }

    pub fn github_settings(&self) -> PreviewResult<GithubSettings> {
        Ok(GithubSettings {
            api_url: self.github_api_url.trim_end_matches('/').to_string(),
            repository: required(&self.repository, "repository")?,
            token: required(&self.github_token, "github-token")?,
        })
    }

    /// Resolve the lifecycle trigger, from explicit flags when `--action` is
    /// given and from the CI event payload otherwise.
    ///
    /// `None` means there is no pull request context at all: no flags, no
    /// payload, or a payload without a pull request. Incomplete flags or an
    /// unreadable payload are errors.
    pub fn load_trigger(&self) -> PreviewResult<Option<Trigger>> {
        if let Some(action) = &self.action {
            let lifecycle = Lifecycle::from_action(action)?;
            let branch_name = self.branch.clone().filter(|b| !b.is_empty()).ok_or_else(|| {
                PreviewError::Configuration("--branch is required with --action".into())
            })?;
            return Ok(Some(Trigger {
                lifecycle,
                action: action.clone(),
                pull_request_number: self.pr_number.unwrap_or(0),
                branch_name,
            }));
        }

        let Some(path) = &self.event_path else {
            return Ok(None);
        };
        let raw = fs::read_to_string(path)?;
        let event: LifecycleEvent = serde_json::from_str(&raw).map_err(|err| {
            PreviewError::Configuration(format!(
                "event payload {} is not valid JSON: {}",
                path.display(),
                err
            ))
        })?;
        event.into_trigger()
    }
}

fn required(value: &Option<String>, name: &str) -> PreviewResult<String> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PreviewError::Configuration(format!("missing required input `{}`", name)))
}
