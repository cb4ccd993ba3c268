//! Request rewriting performed at the CDN edge.
//!
//! Every request for `<sub>.<domain><path>` is mapped onto the object prefix
//! of environment `<sub>` in the shared bucket. The same rules are rendered
//! into the deployed edge function (see `artifact`) and used by the local
//! preview server.

use std::collections::BTreeMap;

/// What happens to a path that has neither a trailing slash nor an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FallbackPolicy {
    /// `/about` → `/<sub>/404.html`
    NotFoundPage,
    /// `/about` → `/<sub>/about/index.html`
    DirectoryIndex,
}

impl FallbackPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackPolicy::NotFoundPage => "not-found-page",
            FallbackPolicy::DirectoryIndex => "directory-index",
        }
    }
}

/// Policy baked into every deployed edge function.
pub const ROUTE_FALLBACK: FallbackPolicy = FallbackPolicy::NotFoundPage;

/// The parts of a viewer request the edge function sees.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EdgeRequest {
    pub method: String,
    pub uri: String,
    pub querystring: String,
    pub headers: BTreeMap<String, String>,
}

impl EdgeRequest {
    pub fn host(&self) -> &str {
        self.headers.get("host").map(String::as_str).unwrap_or("")
    }
}

/// First DNS label of the host, e.g. `preview-7` for `preview-7.example.com`.
pub fn sub_domain(host: &str) -> &str {
    host.split('.').next().unwrap_or(host)
}

/// Rewrite `uri` for `host` under `policy`. Total: every input yields a path
/// rooted at the sub-domain prefix.
pub fn rewrite_path(host: &str, uri: &str, policy: FallbackPolicy) -> String {
    let sub = sub_domain(host);
    if uri.ends_with('/') {
        format!("/{}{}index.html", sub, uri)
    } else if uri.contains('.') {
        format!("/{}{}", sub, uri)
    } else {
        match policy {
            FallbackPolicy::NotFoundPage => format!("/{}/404.html", sub),
            FallbackPolicy::DirectoryIndex => format!("/{}{}/index.html", sub, uri),
        }
    }
}

/// Return `request` with its uri rewritten; every other field passes through.
pub fn route(mut request: EdgeRequest, policy: FallbackPolicy) -> EdgeRequest {
    request.uri = rewrite_path(request.host(), &request.uri, policy);
    request
}
