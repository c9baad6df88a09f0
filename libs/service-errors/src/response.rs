//! Axum integration: failed handlers render a provisional body and hand the
//! full error to the normalizing middleware through response extensions.

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

use crate::{HttpError, Thrown};

pub const APPLICATION_JSON: &str = "application/json";

/// Response extension carrying an error that has not been logged or
/// completed with request data yet.
#[derive(Debug, Clone)]
pub struct Unnormalized(pub HttpError);

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut resp = Json(self.public_body()).into_response();
        *resp.status_mut() = self.status_code();
        resp.headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        resp.extensions_mut().insert(Unnormalized(self));
        resp
    }
}

impl IntoResponse for Thrown {
    fn into_response(self) -> Response {
        HttpError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn error_response_sets_status_and_extension() {
        let resp = HttpError::new(StatusCode::UNAUTHORIZED)
            .with_type("unauthorized")
            .into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some(APPLICATION_JSON)
        );
        let pending = resp.extensions().get::<Unnormalized>().unwrap();
        assert_eq!(pending.0.error_type, "unauthorized");
    }

    #[tokio::test]
    async fn thrown_renders_public_body() {
        let resp = Thrown::from("boom").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["type"], "internal_error");
        assert_eq!(json["title"], "InternalError");
        assert_eq!(json["detail"], "boom");
    }
}
