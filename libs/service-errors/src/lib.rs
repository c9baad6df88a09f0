//! # service-errors
//!
//! The canonical error model shared by every HTTP-facing crate of the service.
//!
//! Handlers fail with a [`Thrown`] value (or anything convertible into one).
//! Every variant is folded into an [`HttpError`], the single shape that is
//! logged server-side and, restricted to its six public fields
//! ([`ErrorBody`]), written to clients.
//!
//! ```rust
//! use http::StatusCode;
//! use service_errors::{HttpError, Thrown};
//!
//! let denied = HttpError::new(StatusCode::FORBIDDEN)
//!     .with_type("access_denied")
//!     .with_title("Access denied")
//!     .with_detail("No access");
//! assert_eq!(denied.status, 403);
//!
//! let generic: HttpError = Thrown::from(anyhow::anyhow!("bad input")).into();
//! assert_eq!(generic.status, 500);
//! assert_eq!(generic.error_type, "internal_error");
//! assert_eq!(generic.resolved_detail(), "bad input");
//! ```

pub mod catalog;
mod http_error;
mod response;
mod thrown;

pub use catalog::ErrDef;
pub use http_error::{
    normalize_status, status_class, ErrorBody, ErrorLog, HttpError, INTERNAL_ERROR,
};
pub use response::{Unnormalized, APPLICATION_JSON};
pub use thrown::{Thrown, UpstreamError};

/// Result alias for route handlers.
pub type ApiResult<T> = Result<T, Thrown>;
