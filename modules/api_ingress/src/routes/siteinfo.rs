use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use service_errors::{catalog, ApiResult};

use super::{Mount, RouteDescriptor, RouteModule};
use crate::AppCtx;

fn site_info(ctx: &AppCtx, domain: &str) -> Map<String, Value> {
    let mut info = Map::new();
    info.insert("domain".into(), json!(domain));
    info.insert("server".into(), json!(ctx.info.name));
    info.insert("version".into(), json!(ctx.info.version));
    info.insert(
        "user_agent".into(),
        json!(ctx.config.user_agent_or(&ctx.info.name)),
    );
    info
}

async fn all(
    State(ctx): State<Arc<AppCtx>>,
    Path(params): Path<HashMap<String, String>>,
) -> Json<Value> {
    let domain = params.get("domain").map(String::as_str).unwrap_or_default();
    Json(Value::Object(site_info(&ctx, domain)))
}

async fn one(
    State(ctx): State<Arc<AppCtx>>,
    Path(params): Path<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let domain = params.get("domain").map(String::as_str).unwrap_or_default();
    let prop = params.get("prop").map(String::as_str).unwrap_or_default();
    let mut info = site_info(&ctx, domain);
    match info.remove(prop) {
        Some(value) => {
            let mut one = Map::new();
            one.insert(prop.to_owned(), value);
            Ok(Json(Value::Object(one)))
        }
        None => Err(catalog::NOT_FOUND
            .to_error(format!("Property {prop} not found"))
            .into()),
    }
}

fn build(ctx: &Arc<AppCtx>) -> anyhow::Result<RouteDescriptor> {
    let router = Router::new()
        .route("/", get(all))
        .route("/{prop}", get(one))
        .with_state(ctx.clone());
    Ok(RouteDescriptor::new(
        "/siteinfo",
        router,
        Mount::Versioned { api_version: 1 },
    ))
}

inventory::submit! {
    RouteModule { name: "siteinfo", build }
}
