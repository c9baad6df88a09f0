use std::backtrace::Backtrace;

use serde_json::{Map, Value};

use crate::http_error::{HttpError, INTERNAL_ERROR};

/// An error reported by a downstream HTTP service, carried verbatim.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct UpstreamError {
    /// Raw status reported by the upstream; validated during normalization.
    pub status: i64,
    pub body: Option<Value>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            body: None,
            message: message.into(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Everything a route handler can fail with.
///
/// The set is closed: each variant has exactly one conversion into
/// [`HttpError`] (see `From<Thrown> for HttpError`).
#[derive(Debug)]
pub enum Thrown {
    /// Already canonical.
    Http(HttpError),
    /// Error returned by a downstream HTTP service.
    Upstream(UpstreamError),
    /// Any other error, tagged with a short name used as the title.
    Generic { name: String, error: anyhow::Error },
    /// A panic caught at the handler boundary.
    Panic(String),
    /// A plain structured object.
    Fields(Map<String, Value>),
    /// Anything else: strings, numbers, arrays.
    Value(Value),
}

impl Thrown {
    /// Generic failure with an explicit name, e.g. `RangeError`.
    pub fn named(name: impl Into<String>, error: impl Into<anyhow::Error>) -> Self {
        Self::Generic {
            name: name.into(),
            error: error.into(),
        }
    }

    /// Recover a panic payload as text.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::Panic(message)
    }
}

impl From<Thrown> for HttpError {
    fn from(thrown: Thrown) -> Self {
        match thrown {
            Thrown::Http(err) => err,
            Thrown::Upstream(up) => {
                let mut fields = Map::new();
                fields.insert("status".into(), Value::from(up.status));
                match up.body {
                    Some(Value::Object(body)) => fields.extend(body),
                    Some(Value::Null) | None => {}
                    Some(Value::String(s)) => {
                        fields.insert("detail".into(), Value::String(s));
                    }
                    Some(other) => {
                        fields.insert("detail".into(), Value::String(other.to_string()));
                    }
                }
                fields.insert("message".into(), Value::String(up.message));
                HttpError::from_fields(fields)
            }
            Thrown::Generic { name, error } => HttpError::internal(name, error.to_string())
                .with_type(INTERNAL_ERROR)
                .with_stack(format!("{error:?}")),
            Thrown::Panic(message) => HttpError::internal("Panic", message)
                .with_stack(Backtrace::force_capture().to_string()),
            Thrown::Fields(fields) => HttpError::from_fields(fields),
            Thrown::Value(value) => HttpError::from_value(value),
        }
    }
}

impl From<HttpError> for Thrown {
    fn from(err: HttpError) -> Self {
        Self::Http(err)
    }
}

impl From<UpstreamError> for Thrown {
    fn from(err: UpstreamError) -> Self {
        Self::Upstream(err)
    }
}

impl From<anyhow::Error> for Thrown {
    fn from(error: anyhow::Error) -> Self {
        Self::named("Error", error)
    }
}

impl From<std::io::Error> for Thrown {
    fn from(error: std::io::Error) -> Self {
        Self::named("Error", error)
    }
}

impl From<Value> for Thrown {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::Fields(fields),
            other => Self::Value(other),
        }
    }
}

impl From<Map<String, Value>> for Thrown {
    fn from(fields: Map<String, Value>) -> Self {
        Self::Fields(fields)
    }
}

impl From<String> for Thrown {
    fn from(message: String) -> Self {
        Self::Value(Value::String(message))
    }
}

impl From<&str> for Thrown {
    fn from(message: &str) -> Self {
        Self::Value(Value::String(message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use serde_json::json;

    #[test]
    fn canonical_error_passes_through() {
        let original = HttpError::new(StatusCode::FORBIDDEN)
            .with_type("access_denied")
            .with_title("Access denied")
            .with_detail("No access");
        let err = HttpError::from(Thrown::from(original.clone()));
        assert_eq!(err, original);
    }

    #[test]
    fn generic_error_maps_to_internal_error() {
        let err = HttpError::from(Thrown::from(anyhow::anyhow!("bad input")));
        assert_eq!(err.status, 500);
        assert_eq!(err.error_type, "internal_error");
        assert_eq!(err.title.as_deref(), Some("Error"));
        assert_eq!(err.resolved_detail(), "bad input");
        assert!(err.stack.is_some());
    }

    #[test]
    fn named_error_uses_name_as_title() {
        let cause = usize::try_from(-1_i64).unwrap_err();
        let err = HttpError::from(Thrown::named("RangeError", cause));
        assert_eq!(err.title.as_deref(), Some("RangeError"));
        assert_eq!(err.status, 500);
    }

    #[test]
    fn upstream_object_body_is_lifted() {
        let up = UpstreamError::new(404, "404: not_found").with_body(json!({
            "type": "not_found",
            "title": "Not found",
            "detail": "page missing",
            "trace": "abc",
        }));
        let err = HttpError::from(Thrown::from(up));
        assert_eq!(err.status, 404);
        assert_eq!(err.error_type, "not_found");
        assert_eq!(err.resolved_detail(), "page missing");
        assert_eq!(err.message.as_deref(), Some("404: not_found"));
        assert_eq!(err.extra.get("trace"), Some(&json!("abc")));
    }

    #[test]
    fn upstream_text_body_becomes_detail() {
        let up = UpstreamError::new(502, "bad gateway").with_body(json!("upstream down"));
        let err = HttpError::from(Thrown::from(up));
        assert_eq!(err.status, 502);
        assert_eq!(err.error_type, INTERNAL_ERROR);
        assert_eq!(err.resolved_detail(), "upstream down");
    }

    #[test]
    fn upstream_without_body_falls_back_to_message() {
        let err = HttpError::from(Thrown::from(UpstreamError::new(0, "connection reset")));
        assert_eq!(err.status, 500);
        assert_eq!(err.resolved_detail(), "connection reset");
    }

    #[test]
    fn plain_object_is_a_field_set() {
        let err = HttpError::from(Thrown::from(json!({ "status": 418, "type": "teapot" })));
        assert_eq!(err.status, 418);
        assert_eq!(err.error_type, "teapot");
    }

    #[test]
    fn raw_values_become_internal_errors() {
        for (value, detail) in [(json!("oops"), "oops"), (json!(7), "7"), (json!([1]), "[1]")] {
            let err = HttpError::from(Thrown::from(value));
            assert_eq!(err.status, 500);
            assert_eq!(err.title.as_deref(), Some("InternalError"));
            assert_eq!(err.resolved_detail(), detail);
        }
    }

    #[test]
    fn panic_payload_is_recovered() {
        let payload = std::panic::catch_unwind(|| panic!("exploded")).unwrap_err();
        let err = HttpError::from(Thrown::from_panic(payload));
        assert_eq!(err.status, 500);
        assert_eq!(err.title.as_deref(), Some("Panic"));
        assert_eq!(err.resolved_detail(), "exploded");
        assert!(err.stack.is_some());
    }
}
