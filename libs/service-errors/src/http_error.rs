use http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};

/// Machine type used whenever an error does not carry one.
pub const INTERNAL_ERROR: &str = "internal_error";

/// Coerce a raw status into the valid HTTP range, falling back to 500.
pub fn normalize_status(raw: Option<i64>) -> u16 {
    match raw {
        Some(code) if (100..=599).contains(&code) => code as u16,
        _ => 500,
    }
}

/// Hundreds-digit bucket of a status code, e.g. `"4xx"`.
pub fn status_class(status: u16) -> String {
    format!("{}xx", status / 100)
}

/// Canonical error: the only error shape that crosses the HTTP boundary.
///
/// `status` is always within `[100, 599]` and `error_type` is never empty.
/// Everything besides the six public fields stays on the server.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{status}: {error_type}")]
pub struct HttpError {
    pub status: u16,
    pub error_type: String,
    pub title: Option<String>,
    pub detail: Option<String>,
    pub method: Option<String>,
    pub uri: Option<String>,
    /// Log category; the status code is used when absent.
    pub component: Option<String>,
    pub message: Option<String>,
    pub description: Option<String>,
    pub stack: Option<String>,
    /// Keys lifted from foreign error bodies that have no canonical slot.
    pub extra: Map<String, Value>,
}

/// The client-visible projection of an [`HttpError`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    pub title: String,
    pub detail: String,
    pub method: String,
    pub uri: String,
}

/// Structure written to the log for a failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorLog {
    pub name: &'static str,
    pub message: String,
    pub status: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl HttpError {
    pub fn new(status: StatusCode) -> Self {
        Self::with_raw_status(Some(i64::from(status.as_u16())))
    }

    /// Build from an unchecked status; out-of-range values become 500.
    pub fn with_raw_status(status: Option<i64>) -> Self {
        Self {
            status: normalize_status(status),
            error_type: INTERNAL_ERROR.to_string(),
            title: None,
            detail: None,
            method: None,
            uri: None,
            component: None,
            message: None,
            description: None,
            stack: None,
            extra: Map::new(),
        }
    }

    /// 500 `internal_error` with the given title and detail.
    pub fn internal(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
            .with_title(title)
            .with_detail(detail)
    }

    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        let error_type = error_type.into();
        if !error_type.is_empty() {
            self.error_type = error_type;
        }
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Treat a plain structured object as the field set of a canonical error.
    ///
    /// `status` may be a number or a numeric string; unknown keys are kept in
    /// [`HttpError::extra`].
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        let mut err = Self::with_raw_status(None);
        let mut status = None;

        for (key, value) in fields {
            match key.as_str() {
                "status" => status = parse_status(&value),
                "type" => {
                    if let Some(t) = as_text(&value) {
                        err = err.with_type(t);
                    }
                }
                "title" => err.title = as_text(&value),
                "detail" => err.detail = as_text(&value),
                "message" => err.message = as_text(&value),
                "description" => err.description = as_text(&value),
                "method" => err.method = as_text(&value),
                "uri" => err.uri = as_text(&value),
                "component" => err.component = as_text(&value),
                "stack" => err.stack = as_text(&value),
                _ => {
                    err.extra.insert(key, value);
                }
            }
        }

        err.status = normalize_status(status);
        err
    }

    /// Build from any JSON value. Objects are field sets, everything else is
    /// the detail of a 500 `InternalError`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::from_fields(fields),
            other => Self::internal("InternalError", as_text(&other).unwrap_or_default()),
        }
    }

    /// `detail`, then `message`, then `description`, then the empty string.
    pub fn resolved_detail(&self) -> String {
        [&self.detail, &self.message, &self.description]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_default()
    }

    /// Log category: the explicit component or the status code.
    pub fn category(&self) -> String {
        self.component
            .clone()
            .unwrap_or_else(|| self.status.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn public_body(&self) -> ErrorBody {
        let title = self.title.clone().unwrap_or_else(|| {
            self.status_code()
                .canonical_reason()
                .unwrap_or_default()
                .to_string()
        });
        ErrorBody {
            status: self.status,
            error_type: self.error_type.clone(),
            title,
            detail: self.resolved_detail(),
            method: self.method.clone().unwrap_or_default(),
            uri: self.uri.clone().unwrap_or_default(),
        }
    }

    /// Serializable log structure; the stack is kept only for server errors.
    pub fn log_record(&self) -> ErrorLog {
        ErrorLog {
            name: "HttpError",
            message: self.to_string(),
            status: self.status,
            error_type: self.error_type.clone(),
            title: self.title.clone(),
            detail: self.resolved_detail(),
            method: self.method.clone(),
            uri: self.uri.clone(),
            stack: if self.status >= 500 {
                self.stack.clone()
            } else {
                None
            },
        }
    }
}

impl From<StatusCode> for HttpError {
    fn from(status: StatusCode) -> Self {
        Self::new(status)
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Leading-integer parse: `"404"` and `"404 Not Found"` both yield 404.
fn parse_status(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let trimmed = s.trim_start();
            let (sign, digits) = match trimmed.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end].parse::<i64>().ok().map(|n| sign * n)
        }
        _ => None,
    }
}
