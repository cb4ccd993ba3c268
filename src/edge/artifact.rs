//! Source of the viewer-request function deployed to the CDN.
//!
//! The function is rendered from the same rules as `router::rewrite_path`, so
//! the deployed code and the local preview server cannot drift apart.

use super::router::FallbackPolicy;

const HEADER: &str = "// preview-deploy edge router";

const TEMPLATE: &str = r#"function handler(event) {
  var request = event.request;
  var host = request.headers.host ? request.headers.host.value : "";
  var subDomain = host.split(".")[0];
  var uri = request.uri;

  if (uri.endsWith("/")) {
    request.uri = "/" + subDomain + uri + "index.html";
  } else if (uri.includes(".")) {
    request.uri = "/" + subDomain + uri;
  } else {
    request.uri = __FALLBACK__;
  }

  return request;
}
"#;

/// Render the edge function body for `policy`.
pub fn function_source(policy: FallbackPolicy) -> String {
    let fallback = match policy {
        FallbackPolicy::NotFoundPage => r#""/" + subDomain + "/404.html""#,
        FallbackPolicy::DirectoryIndex => r#""/" + subDomain + uri + "/index.html""#,
    };
    format!(
        "{} (fallback: {})\n{}",
        HEADER,
        policy.as_str(),
        TEMPLATE.replace("__FALLBACK__", fallback)
    )
}
