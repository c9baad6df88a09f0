use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use service_errors::{catalog, ApiResult};

use crate::metrics::TimingStat;
use crate::AppCtx;

const DOCS_CSP: &str = "default-src 'none'; script-src 'self' 'unsafe-inline' https://unpkg.com; \
connect-src *; style-src 'self' 'unsafe-inline' https://unpkg.com; img-src 'self' data: https://unpkg.com; font-src 'self';";

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Tells robots not to index anything on this host.
pub async fn robots() -> Response {
    let mut resp = StatusCode::OK.into_response();
    let headers = resp.headers_mut();
    headers.insert(
        HeaderName::from_static("user-agent"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("disallow"),
        HeaderValue::from_static("/"),
    );
    resp
}

/// `GET /`: the API document with `?spec`, the docs page with `?doc`,
/// not found otherwise.
pub async fn root(
    State(ctx): State<Arc<AppCtx>>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    if query.contains_key("spec") {
        return Ok(Json(ctx.spec.clone()).into_response());
    }
    if query.contains_key("doc") && ctx.config.enable_docs {
        return Ok(serve_docs(&ctx.info.name).into_response());
    }
    Err(catalog::NOT_FOUND.to_error("").into())
}

pub async fn info(State(ctx): State<Arc<AppCtx>>) -> Json<Value> {
    Json(json!({
        "name": ctx.info.name,
        "version": ctx.info.version,
        "description": ctx.info.description,
        "home": ctx.info.homepage,
    }))
}

pub async fn metrics_snapshot(
    State(ctx): State<Arc<AppCtx>>,
) -> ApiResult<Json<BTreeMap<String, TimingStat>>> {
    let Some(memory) = ctx.memory_metrics.as_ref() else {
        return Err(catalog::NOT_FOUND.to_error("metrics are not kept in memory").into());
    };
    Ok(Json(memory.snapshot()))
}

// Swagger UI from the CDN, pointed at `/?spec`.
fn serve_docs(title: &str) -> impl IntoResponse {
    let page = format!(
        r##"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <title>{title}</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({{
      url: "/?spec",
      dom_id: "#swagger-ui",
      docExpansion: "list",
      validatorUrl: null
    }});
  </script>
</body>
</html>"##,
        title = html_escape(title)
    );
    (
        [(header::CONTENT_SECURITY_POLICY, DOCS_CSP)],
        Html(page),
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
