//! Local preview of a build directory through the edge router.
//! Each request is rewritten exactly as the deployed edge function would
//! rewrite it, then the environment prefix is mapped onto the local root.

use crate::{
    edge::router::{EdgeRequest, FallbackPolicy, route},
    errors::AppError,
    services::sync::content_type_for,
};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::Response,
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::fs;
use tokio_util::io::ReaderStream;

/// Shared state of the local preview server.
#[derive(Clone, Debug)]
pub struct LocalEdge {
    pub root: Arc<PathBuf>,
    pub policy: FallbackPolicy,
}

impl LocalEdge {
    pub fn new(root: impl Into<PathBuf>, policy: FallbackPolicy) -> Self {
        Self {
            root: Arc::new(root.into()),
            policy,
        }
    }
}

/// Fallback handler: every path not claimed by a probe goes through the
/// router and is served from the build directory.
pub async fn serve_edge(
    State(edge): State<LocalEdge>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(AppError::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "only GET and HEAD are served",
        ));
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let request = EdgeRequest {
        method: method.to_string(),
        uri: uri.path().to_string(),
        querystring: uri.query().unwrap_or_default().to_string(),
        headers: BTreeMap::from([("host".to_string(), host.to_string())]),
    };
    let routed = route(request, edge.policy);
    let path = edge.root.join(local_path(&routed.uri)?);
    tracing::debug!(uri = %uri, rewritten = %routed.uri, "edge request");

    let meta = fs::metadata(&path).await?;
    if !meta.is_file() {
        return Err(AppError::not_found(format!("{} not found", routed.uri)));
    }

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from_stream(ReaderStream::new(fs::File::open(&path).await?))
    };

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&routed.uri)),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.len()));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

/// Map a rewritten `/<sub>/<key>` path to `<key>` relative to the build root.
fn local_path(rewritten: &str) -> Result<PathBuf, AppError> {
    let mut segments = rewritten
        .strip_prefix('/')
        .unwrap_or(rewritten)
        .split('/');
    segments.next();

    let mut relative = PathBuf::new();
    for segment in segments.filter(|s| !s.is_empty()) {
        if segment == ".." || segment == "." || Path::new(segment).is_absolute() {
            return Err(AppError::new(StatusCode::BAD_REQUEST, "invalid path"));
        }
        relative.push(segment);
    }
    Ok(relative)
}
