use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// The kinds of provider resources a run touches, used to label errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    StorageBucket,
    OriginAccessControl,
    CdnFunction,
    CdnDistribution,
    HostedZone,
    DnsRecord,
    Deployment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::StorageBucket => "storage bucket",
            ResourceKind::OriginAccessControl => "origin access control",
            ResourceKind::CdnFunction => "cdn function",
            ResourceKind::CdnDistribution => "cdn distribution",
            ResourceKind::HostedZone => "hosted zone",
            ResourceKind::DnsRecord => "dns record",
            ResourceKind::Deployment => "deployment",
        };
        f.write_str(label)
    }
}

/// Failures of a provisioning or decommission run.
///
/// Nothing in the core recovers from these; the first one aborts the run and
/// is reported as the run's failure reason.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// A required input is missing. A missing pull request context is treated
    /// as a clean skip by the entry point rather than a failure.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{kind} `{name}` not found")]
    ResourceNotFound { kind: ResourceKind, name: String },
    #[error("{kind} `{key}` was accepted by the provider but no identifier came back")]
    ResourceNotCreated { kind: ResourceKind, key: String },
    #[error("{operation} failed: {message}")]
    UpstreamCallFailure {
        operation: &'static str,
        message: String,
    },
    #[error("lifecycle action `{0}` is not supported")]
    UnsupportedAction(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type PreviewResult<T> = Result<T, PreviewError>;

impl PreviewError {
    pub fn upstream(operation: &'static str, message: impl Into<String>) -> Self {
        Self::UpstreamCallFailure {
            operation,
            message: message.into(),
        }
    }
}

/// A lightweight wrapper for errors raised by the local preview server.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => AppError::not_found("not found"),
            _ => AppError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }
}
