use anyhow::Result;
use axum::Router;
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

mod config;
mod edge;
mod errors;
mod handlers;
mod models;
mod providers;
mod routes;
mod services;
#[cfg(test)]
mod testing;

use config::AppConfig;
use handlers::edge_handlers::LocalEdge;
use models::{environment::Environment, trigger::Lifecycle};
use providers::{
    Clients,
    aws::{self, CloudFrontCdn, Route53Dns, S3Storage},
    github::GithubDeployments,
};
use services::orchestrator::EnvironmentOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (cfg, serve) = AppConfig::from_env_and_args()?;
    tracing::debug!("Starting preview-deploy with config: {:?}", cfg);

    if serve {
        return serve_locally(&cfg).await;
    }

    // --- Resolve trigger ---
    let Some(trigger) = cfg.load_trigger()? else {
        tracing::warn!("no pull request context, nothing to do");
        return Ok(());
    };

    // --- Providers ---
    let settings = cfg.preview_settings()?;
    let sdk_config = aws::load_config(&settings.region).await;
    let clients = Clients {
        storage: Box::new(S3Storage::new(&sdk_config, settings.region.clone())),
        cdn: Box::new(CloudFrontCdn::new(&sdk_config)),
        dns: Box::new(Route53Dns::new(&sdk_config)),
        review: Box::new(GithubDeployments::new(cfg.github_settings()?)?),
    };

    let env = Environment::for_pull_request(&settings, trigger.pull_request_number);
    let span = tracing::info_span!(
        "preview",
        environment = %env.sub_domain,
        action = %trigger.action
    );
    let orchestrator = EnvironmentOrchestrator::new(&clients, &settings);

    match trigger.lifecycle {
        Lifecycle::Provision => {
            let report = orchestrator
                .provision(&env, &trigger.branch_name)
                .instrument(span)
                .await?;
            cfg.write_output(&report.preview_url)?;
            println!("{}", report.preview_url);
        }
        Lifecycle::Decommission => {
            let report = orchestrator
                .decommission(&env, &trigger.branch_name)
                .instrument(span)
                .await?;
            tracing::info!(
                removed_objects = report.removed_objects,
                removed_deployments = report.removed_deployments,
                record_deleted = report.record_deleted,
                "preview environment decommissioned"
            );
        }
    }

    Ok(())
}

/// Serve the build directory through the edge router until interrupted.
async fn serve_locally(cfg: &AppConfig) -> Result<()> {
    let state = LocalEdge::new(cfg.build_dir.clone(), cfg.fallback);
    let app: Router = routes::routes::routes().with_state(state);

    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        build_dir = %cfg.build_dir.display(),
        fallback = cfg.fallback.as_str(),
        "Preview server listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;

    Ok(())
}
