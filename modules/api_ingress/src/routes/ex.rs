//! Example routes showing how failures of each kind reach the client.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use service_errors::{ApiResult, HttpError, Thrown};

use super::{Mount, RouteDescriptor, RouteModule};
use crate::AppCtx;

/// An impossible allocation size, surfaced as a generic `RangeError`.
async fn array() -> ApiResult<String> {
    let len: i64 = -1;
    let size = usize::try_from(len).map_err(|e| Thrown::named("RangeError", e))?;
    Ok(vec!["x"; size].join(","))
}

/// Reading a file that does not exist.
async fn file() -> ApiResult<String> {
    let text = tokio::fs::read_to_string("../mushrooms.txt").await?;
    Ok(text)
}

/// A constraint check failing with a plain error.
async fn manual_error() -> ApiResult<StatusCode> {
    let max = 50;
    if max > 10 {
        return Err(anyhow::anyhow!("A maximum value of 10 is expected, {max} given!").into());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn manual_deny() -> ApiResult<StatusCode> {
    Err(HttpError::new(StatusCode::FORBIDDEN)
        .with_type("access_denied")
        .with_title("Access denied")
        .with_detail("No access is allowed to this endpoint")
        .into())
}

/// Compares the `token` query parameter with the contents of a token file.
async fn manual_auth(
    State(ctx): State<Arc<AppCtx>>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<StatusCode> {
    let token = tokio::fs::read_to_string(&ctx.spec_path).await?;
    if query.get("token") != Some(&token) {
        return Err(HttpError::new(StatusCode::UNAUTHORIZED)
            .with_type("unauthorized")
            .with_title("Unauthorized")
            .with_detail("You are not authorized to fetch this endpoint!")
            .into());
    }
    Ok(StatusCode::NO_CONTENT)
}

fn build(ctx: &Arc<AppCtx>) -> anyhow::Result<RouteDescriptor> {
    let router = Router::new()
        .route("/err/array", get(array))
        .route("/err/file", get(file))
        .route("/err/manual/error", get(manual_error))
        .route("/err/manual/deny", get(manual_deny))
        .route("/err/manual/auth", get(manual_auth))
        .with_state(ctx.clone());
    Ok(RouteDescriptor::new("/ex", router, Mount::SkipDomain))
}

inventory::submit! {
    RouteModule { name: "ex", build }
}
