//! Static error definitions used by the HTTP host itself.
use http::StatusCode;

use crate::HttpError;

/// Static error definition from the catalog.
#[derive(Debug, Clone, Copy)]
pub struct ErrDef {
    pub status: u16,
    pub error_type: &'static str,
    pub title: &'static str,
}

impl ErrDef {
    /// Convert this definition into a canonical error with the given detail.
    #[inline]
    pub fn to_error(&self, detail: impl Into<String>) -> HttpError {
        HttpError::new(StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
            .with_type(self.error_type)
            .with_title(self.title)
            .with_detail(detail)
    }
}

pub const NOT_FOUND: ErrDef = ErrDef {
    status: 404,
    error_type: "not_found",
    title: "Not found",
};

pub const METHOD_NOT_ALLOWED: ErrDef = ErrDef {
    status: 405,
    error_type: "method_not_allowed",
    title: "Method not allowed",
};

pub const PAYLOAD_TOO_LARGE: ErrDef = ErrDef {
    status: 413,
    error_type: "payload_too_large",
    title: "Payload too large",
};

pub const BAD_REQUEST: ErrDef = ErrDef {
    status: 400,
    error_type: "bad_request",
    title: "Bad request",
};

pub const GATEWAY_TIMEOUT: ErrDef = ErrDef {
    status: 504,
    error_type: "timeout",
    title: "Request timed out",
};

pub const UNSUPPORTED_MEDIA_TYPE: ErrDef = ErrDef {
    status: 415,
    error_type: "unsupported_media_type",
    title: "Unsupported media type",
};

pub const UNPROCESSABLE_ENTITY: ErrDef = ErrDef {
    status: 422,
    error_type: "invalid_request",
    title: "Unprocessable entity",
};

/// Catalog entry for a status produced by the HTTP stack rather than by a
/// handler. The per-route timeout answers with 504.
pub fn for_status(status: u16) -> Option<ErrDef> {
    match status {
        400 => Some(BAD_REQUEST),
        404 => Some(NOT_FOUND),
        405 => Some(METHOD_NOT_ALLOWED),
        504 => Some(GATEWAY_TIMEOUT),
        413 => Some(PAYLOAD_TOO_LARGE),
        415 => Some(UNSUPPORTED_MEDIA_TYPE),
        422 => Some(UNPROCESSABLE_ENTITY),
        _ => None,
    }
}
