//! Routes of the local preview server.
//!
//! - `GET /healthz` -> liveness
//! - `GET /readyz`  -> build directory readiness
//! - anything else  -> rewritten by the edge router and served from the build directory

use crate::handlers::{
    edge_handlers::{LocalEdge, serve_edge},
    health_handlers::{healthz, readyz},
};
use axum::{Router, routing::get};

pub fn routes() -> Router<LocalEdge> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .fallback(serve_edge)
}
