//! Request context: request id, request-scoped span and a filtered snapshot
//! of the inbound request.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, OriginalUri, RawPathParams, State};
use axum::http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Request};
use axum::{body::Body, middleware::Next, response::Response};
use regex::Regex;
use serde::Serialize;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{field::Empty, Instrument, Span};
use uuid::Uuid;

pub fn header() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

/// Time-ordered, collision-resistant request id.
pub fn generate_request_id() -> String {
    Uuid::now_v7().to_string()
}

#[derive(Clone, Default)]
pub struct MakeReqId;

impl MakeRequestId for MakeReqId {
    fn make_request_id<B>(&mut self, _req: &Request<B>) -> Option<RequestId> {
        let id = generate_request_id();
        Some(RequestId::new(id.parse().ok()?))
    }
}

/// Return the caller-supplied request id, or generate one and store it in
/// the headers. A present, non-empty header is never replaced.
pub fn ensure_request_id(headers: &mut HeaderMap) -> String {
    let name = header();
    if let Some(existing) = headers.get(&name).filter(|v| !v.is_empty()) {
        return String::from_utf8_lossy(existing.as_bytes()).into_owned();
    }
    let id = generate_request_id();
    if let Ok(value) = HeaderValue::from_str(&id) {
        headers.insert(name, value);
    }
    id
}

/// Headers whose names match are copied into the request snapshot.
#[derive(Clone, Debug)]
pub struct HeaderFilter(Regex);

impl HeaderFilter {
    pub fn new(allow: Regex) -> Self {
        Self(allow)
    }

    pub fn allows(&self, name: &str) -> bool {
        self.0.is_match(name)
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RequestSnapshot {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub remote_address: Option<String>,
    pub remote_port: Option<u16>,
}

impl RequestSnapshot {
    fn capture(parts: &Parts, params: BTreeMap<String, String>, filter: &HeaderFilter) -> Self {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|u| &u.0)
            .unwrap_or(&parts.uri);

        let headers = parts
            .headers
            .iter()
            .filter(|(name, _)| filter.allows(name.as_str()))
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let query = uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            url: uri
                .path_and_query()
                .map(|pq| pq.as_str().to_owned())
                .unwrap_or_else(|| uri.path().to_owned()),
            method: parts.method.to_string(),
            headers,
            params,
            query,
            remote_address: remote.map(|a| a.ip().to_string()),
            remote_port: remote.map(|a| a.port()),
        }
    }
}

/// Stored in request extensions by [`init_and_log_request`].
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
    /// Request-scoped logger; enter it (or use `parent:`) to tag events.
    pub span: Span,
    pub snapshot: RequestSnapshot,
}

pub fn request_span(method: &Method, path: &str, request_id: &str) -> Span {
    tracing::info_span!(
        "http_request",
        method = %method,
        uri = %path,
        request_id = %request_id,
        request = Empty
    )
}

/// Ensure a request id, bind the request-scoped span and log the request.
///
/// Runs at most once per request: if a [`RequestContext`] is already present
/// the request passes through untouched.
pub async fn init_and_log_request(
    State(filter): State<HeaderFilter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.extensions().get::<RequestContext>().is_some() {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();
    let request_id = ensure_request_id(&mut parts.headers);
    let params = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .map(|p| {
            p.iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect()
        })
        .unwrap_or_default();
    let snapshot = RequestSnapshot::capture(&parts, params, &filter);

    // Reuse the span opened by the trace layer when there is one.
    let current = Span::current();
    let span = if current.is_none() {
        request_span(&parts.method, parts.uri.path(), &request_id)
    } else {
        current
    };
    span.record(
        "request",
        tracing::field::display(serde_json::to_string(&snapshot).unwrap_or_default()),
    );
    tracing::trace!(parent: &span, "incoming request");

    parts.extensions.insert(RequestContext {
        request_id,
        span: span.clone(),
        snapshot,
    });

    next.run(Request::from_parts(parts, body))
        .instrument(span)
        .await
}

/// Trace layer whose span carries the request id set by `SetRequestIdLayer`.
#[allow(clippy::type_complexity)]
pub fn create_trace_layer() -> tower_http::trace::TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
    impl Fn(&Request<Body>) -> Span + Clone,
> {
    use tower_http::trace::TraceLayer;

    TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        let rid = req
            .headers()
            .get(header())
            .and_then(|v| v.to_str().ok())
            .unwrap_or("n/a");
        request_span(req.method(), req.uri().path(), rid)
    })
}
