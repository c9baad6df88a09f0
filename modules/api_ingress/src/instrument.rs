//! Per-route failure boundary and timing.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, OriginalUri, State},
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use service_errors::{normalize_status, status_class, Thrown};

use crate::error;
use crate::metrics::MetricsSink;

/// Metric-friendly name of a route pattern: `{param}` becomes `--param`,
/// the leading `/` and trailing `/` or `?` are dropped, `/` alone is `root`.
pub fn route_metric_name(route: &str) -> String {
    let mut out = String::with_capacity(route.len());
    let mut chars = route.chars();
    while let Some(c) = chars.next() {
        if c == '{' {
            out.push_str("--");
            for c in chars.by_ref() {
                match c {
                    '}' => break,
                    '*' => {}
                    c => out.push(c),
                }
            }
        } else {
            out.push(c);
        }
    }
    let trimmed = out
        .trim_start_matches('/')
        .trim_end_matches(['/', '?']);
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{route}.{METHOD}.{status}`, `{route}.{METHOD}.{class}`, `{route}.{METHOD}.ALL`.
pub fn metric_keys(route: &str, method: &Method, status: u16) -> [String; 3] {
    let stat = format!("{route}.{method}.");
    [
        format!("{stat}{status}"),
        format!("{stat}{}", status_class(status)),
        format!("{stat}ALL"),
    ]
}

/// Route layer wrapping every mounted handler.
///
/// Returned errors and panics are forwarded to the normalizer; the elapsed
/// time is recorded exactly once, after the response is final.
pub async fn instrument(
    State(metrics): State<Arc<dyn MetricsSink>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|u| u.0.clone())
        .unwrap_or_else(|| req.uri().clone());
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned());

    let resp = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(resp) => resp,
        Err(panic) => Thrown::from_panic(panic).into_response(),
    };
    let resp = error::finish(resp, &method, &uri);

    let status = normalize_status(Some(i64::from(resp.status().as_u16())));
    let name = metrics.normalize_name(&route_metric_name(&route));
    metrics.end_timing(&metric_keys(&name, &method, status), start);

    resp
}
