//! Error normalization: completes a failed request's [`HttpError`], logs it
//! inside the request span and writes the public JSON body.

use std::backtrace::Backtrace;

use axum::{
    body::Body,
    extract::OriginalUri,
    http::{header, HeaderMap, HeaderValue, Method, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use service_errors::{catalog, HttpError, Unnormalized, APPLICATION_JSON};

/// Marker left on responses that already went through [`finish`].
#[derive(Debug, Clone, Copy)]
pub struct Normalized;

/// Longest detail text kept on a normalized error.
pub const MAX_DETAIL_BYTES: usize = 4096;

/// Upper bound when reading a framework-produced error body.
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

fn truncate_detail(mut detail: String) -> String {
    if detail.len() > MAX_DETAIL_BYTES {
        let mut end = MAX_DETAIL_BYTES;
        while !detail.is_char_boundary(end) {
            end -= 1;
        }
        detail.truncate(end);
    }
    detail
}

fn copy_headers(from: &HeaderMap, to: &mut Response) {
    for (name, value) in from {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            to.headers_mut().insert(name.clone(), value.clone());
        }
    }
}

/// Fill in request data and defaults; server errors always carry a stack.
pub fn normalize(mut err: HttpError, method: &Method, uri: &Uri) -> HttpError {
    if err.method.as_deref().map_or(true, str::is_empty) {
        err.method = Some(method.to_string());
    }
    if err.uri.as_deref().map_or(true, str::is_empty) {
        err.uri = Some(
            uri.path_and_query()
                .map(|pq| pq.as_str().to_owned())
                .unwrap_or_else(|| uri.path().to_owned()),
        );
    }
    err.detail = Some(truncate_detail(err.resolved_detail()));
    if err.status >= 500 && err.stack.is_none() {
        err.stack = Some(Backtrace::force_capture().to_string());
    }
    err
}

/// Log at a level chosen from the status: trace below 400, info for 4xx,
/// error for everything else.
pub fn log_error(err: &HttpError) {
    let category = err.category();
    let record = serde_json::to_string(&err.log_record()).unwrap_or_default();
    match err.status {
        s if s < 400 => tracing::trace!(category = %category, error = %record, "request failed"),
        s if s < 500 => tracing::info!(category = %category, error = %record, "request failed"),
        _ => tracing::error!(category = %category, error = %record, "request failed"),
    }
}

/// The client-facing response: the six public fields only.
pub fn render(err: &HttpError) -> Response {
    let mut resp = (err.status_code(), Json(err.public_body())).into_response();
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    resp.extensions_mut().insert(Normalized);
    resp
}

/// Normalize a handler response if it carries a forwarded error; otherwise
/// return it unchanged.
pub fn finish(mut resp: Response, method: &Method, uri: &Uri) -> Response {
    let Some(Unnormalized(err)) = resp.extensions_mut().remove::<Unnormalized>() else {
        return resp;
    };
    let err = normalize(err, method, uri);
    log_error(&err);

    let mut out = render(&err);
    copy_headers(resp.headers(), &mut out);
    out
}

/// Global layer: normalizes errors raised outside instrumented handlers
/// (unmatched routes, timeouts, body limits, extractor rejections).
pub async fn handle_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|u| u.0.clone())
        .unwrap_or_else(|| req.uri().clone());

    let resp = next.run(req).await;
    if resp.extensions().get::<Normalized>().is_some() {
        return resp;
    }
    if resp.extensions().get::<Unnormalized>().is_some() {
        return finish(resp, &method, &uri);
    }

    let status = resp.status().as_u16();
    let Some(def) = catalog::for_status(status) else {
        return resp;
    };

    let (parts, body) = resp.into_parts();
    let detail = match axum::body::to_bytes(body, MAX_ERROR_BODY_BYTES).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_owned(),
        Err(_) => String::new(),
    };
    let err = normalize(def.to_error(detail), &method, &uri);
    log_error(&err);

    // Keeps framework headers such as `Allow` on a 405.
    let mut out = render(&err);
    copy_headers(&parts.headers, &mut out);
    out
}
