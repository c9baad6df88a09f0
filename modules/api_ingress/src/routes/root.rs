use std::sync::Arc;

use axum::{routing::get, Router};

use super::{Mount, RouteDescriptor, RouteModule};
use crate::{web, AppCtx};

fn build(ctx: &Arc<AppCtx>) -> anyhow::Result<RouteDescriptor> {
    let router = Router::new()
        .route("/", get(web::root))
        .route("/robots.txt", get(web::robots))
        .route("/_info", get(web::info))
        .route("/healthz", get(web::health_check))
        .route("/metrics", get(web::metrics_snapshot))
        .with_state(ctx.clone());
    Ok(RouteDescriptor::new("/", router, Mount::SkipDomain))
}

inventory::submit! {
    RouteModule { name: "root", build }
}
