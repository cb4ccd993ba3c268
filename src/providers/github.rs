//! Deployment records on the GitHub REST API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, header};
use serde::Serialize;

use crate::{
    config::GithubSettings,
    errors::{PreviewError, PreviewResult, ResourceKind},
    models::deployment::{DeploymentRecord, DeploymentStatus},
    providers::ReviewPlatform,
};

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("preview-deploy/", env!("CARGO_PKG_VERSION"));

pub struct GithubDeployments {
    http: Client,
    settings: GithubSettings,
}

#[derive(Serialize)]
struct CreateDeployment<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    environment: &'a str,
    description: &'a str,
    auto_merge: bool,
    transient_environment: bool,
    required_contexts: Vec<String>,
}

#[derive(Serialize)]
struct CreateStatus<'a> {
    state: DeploymentStatus,
    environment: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment_url: Option<&'a str>,
}

impl GithubDeployments {
    pub fn new(settings: GithubSettings) -> PreviewResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| PreviewError::upstream("github:client", err.to_string()))?;
        Ok(Self { http, settings })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}",
            self.settings.api_url, self.settings.repository, path
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.settings.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> PreviewResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|err| PreviewError::upstream(operation, err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PreviewError::upstream(
            operation,
            format!("{}: {}", status, body),
        ))
    }
}

/// URL of the next page from a `Link` header, if there is one.
fn next_link(headers: &header::HeaderMap) -> Option<String> {
    let links = headers.get(header::LINK)?.to_str().ok()?;
    links.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let url = parts.next()?.trim();
        parts
            .any(|param| param.trim() == r#"rel="next""#)
            .then(|| url.trim_start_matches('<').trim_end_matches('>').to_string())
    })
}

#[async_trait]
impl ReviewPlatform for GithubDeployments {
    async fn list_deployments(
        &self,
        git_ref: &str,
        environment: &str,
    ) -> PreviewResult<Vec<DeploymentRecord>> {
        let mut request = self.http.get(self.url("deployments")).query(&[
            ("ref", git_ref),
            ("environment", environment),
            ("per_page", "100"),
        ]);
        let mut deployments = Vec::new();
        loop {
            let response = self.send("github:ListDeployments", request).await?;
            let next = next_link(response.headers());
            let page: Vec<DeploymentRecord> = response.json().await.map_err(|err| {
                PreviewError::upstream("github:ListDeployments", err.to_string())
            })?;
            deployments.extend(page);
            match next {
                Some(url) => request = self.http.get(url),
                None => return Ok(deployments),
            }
        }
    }

    async fn create_deployment(
        &self,
        git_ref: &str,
        environment: &str,
    ) -> PreviewResult<DeploymentRecord> {
        let body = CreateDeployment {
            git_ref,
            environment,
            description: "Preview deployment",
            auto_merge: false,
            transient_environment: true,
            required_contexts: Vec::new(),
        };
        let request = self.http.post(self.url("deployments")).json(&body);
        let response = self.send("github:CreateDeployment", request).await?;
        // 202 means the platform queued a merge instead of creating anything.
        if response.status() != reqwest::StatusCode::CREATED {
            return Err(PreviewError::ResourceNotCreated {
                kind: ResourceKind::Deployment,
                key: format!("{}@{}", environment, git_ref),
            });
        }
        response
            .json()
            .await
            .map_err(|err| PreviewError::upstream("github:CreateDeployment", err.to_string()))
    }

    async fn create_deployment_status(
        &self,
        deployment_id: u64,
        status: DeploymentStatus,
        environment: &str,
        environment_url: Option<&str>,
    ) -> PreviewResult<()> {
        let body = CreateStatus {
            state: status,
            environment,
            environment_url,
        };
        let request = self
            .http
            .post(self.url(&format!("deployments/{}/statuses", deployment_id)))
            .json(&body);
        self.send("github:CreateDeploymentStatus", request).await?;
        Ok(())
    }

    async fn delete_deployment(&self, deployment_id: u64) -> PreviewResult<()> {
        let request = self
            .http
            .delete(self.url(&format!("deployments/{}", deployment_id)));
        self.send("github:DeleteDeployment", request).await?;
        Ok(())
    }
}
