//! Health & readiness handlers for the local preview server.
//!
//! - GET /healthz  -> liveness ("ok")
//! - GET /readyz   -> readiness: the build directory exists and has an index page

use crate::handlers::edge_handlers::LocalEdge;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::fs;

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// 200 when the build directory can be served, 503 otherwise. Each check is
/// reported in the body.
pub async fn readyz(State(edge): State<LocalEdge>) -> impl IntoResponse {
    let root_check = match fs::metadata(edge.root.as_path()).await {
        Ok(meta) if meta.is_dir() => CheckStatus::ok(),
        Ok(_) => CheckStatus::failed(format!("{} is not a directory", edge.root.display())),
        Err(e) => CheckStatus::failed(format!("{}: {}", edge.root.display(), e)),
    };

    let index_check = match fs::metadata(edge.root.join("index.html")).await {
        Ok(meta) if meta.is_file() => CheckStatus::ok(),
        Ok(_) => CheckStatus::failed("index.html is not a file".to_string()),
        Err(e) => CheckStatus::failed(format!("index.html: {}", e)),
    };

    let overall_ok = root_check.ok && index_check.ok;
    let mut checks = BTreeMap::new();
    checks.insert("build_dir", root_check);
    checks.insert("index", index_check);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        fallback: edge.policy.as_str(),
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    fallback: &'static str,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}
