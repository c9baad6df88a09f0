use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use serde_json::Value;
use service_errors::ApiResult;
use tempfile::TempDir;
use tower::util::ServiceExt;

use api_ingress::routes::{Mount, RouteDescriptor, RouteModule};
use api_ingress::{ApiIngress, ApiIngressConfig, AppCtx, AppInfo, MetricsKind, MetricsSink};

#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingSink {
    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl MetricsSink for RecordingSink {
    fn end_timing(&self, keys: &[String], _start: Instant) {
        self.calls.lock().unwrap().push(keys.to_vec());
    }
}

async fn explode() -> ApiResult<String> {
    panic!("exploded");
}

async fn slow() -> ApiResult<String> {
    tokio::time::sleep(Duration::from_millis(300)).await;
    Ok("late".into())
}

fn build_panicking(_ctx: &Arc<AppCtx>) -> anyhow::Result<RouteDescriptor> {
    Ok(RouteDescriptor::new(
        "/p",
        Router::new()
            .route("/{id}/explode", get(explode))
            .route("/slow", get(slow)),
        Mount::SkipDomain,
    ))
}

static PANICKING: RouteModule = RouteModule {
    name: "panicking",
    build: build_panicking,
};

fn ctx(cfg: ApiIngressConfig) -> (AppCtx, TempDir) {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(home.path().join("spec.yaml"), "paths: {}\n").unwrap();
    let ctx = AppCtx::new(cfg, AppInfo::new("svc", "1.0.0", "test service"), home.path()).unwrap();
    (ctx, home)
}

fn recorded_app() -> (Router, Arc<RecordingSink>, TempDir) {
    let sink = Arc::new(RecordingSink::default());
    let (ctx, home) = ctx(ApiIngressConfig::default());
    let ingress = ApiIngress::new(ctx.with_metrics(sink.clone()));
    let mut modules = api_ingress::routes::discover();
    modules.push(&PANICKING);
    (ingress.build_router_with(modules).unwrap(), sink, home)
}

async fn send(app: &Router, uri: &str) -> StatusCode {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn failed_request_records_three_keys_once() {
    let (app, sink, _home) = recorded_app();
    assert_eq!(send(&app, "/ex/err/array").await, StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(
        sink.calls(),
        vec![vec![
            "ex.err.array.GET.500".to_string(),
            "ex.err.array.GET.5xx".to_string(),
            "ex.err.array.GET.ALL".to_string(),
        ]]
    );
}

#[tokio::test]
async fn successful_request_records_three_keys_once() {
    let (app, sink, _home) = recorded_app();
    assert_eq!(send(&app, "/robots.txt").await, StatusCode::OK);

    let calls = sink.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0],
        vec!["robots_txt.GET.200", "robots_txt.GET.2xx", "robots_txt.GET.ALL"]
    );
}

#[tokio::test]
async fn panics_are_timed_with_param_placeholders() {
    let (app, sink, _home) = recorded_app();
    assert_eq!(send(&app, "/p/7/explode").await, StatusCode::INTERNAL_SERVER_ERROR);

    let calls = sink.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0], "p.--id.explode.GET.500");
}

#[tokio::test]
async fn versioned_routes_use_the_domain_placeholder() {
    let (app, sink, _home) = recorded_app();
    assert_eq!(
        send(&app, "/en.example.org/v1/siteinfo/server").await,
        StatusCode::OK
    );

    let calls = sink.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][2], "--domain.v1.siteinfo.--prop.GET.ALL");
}

#[tokio::test]
async fn each_request_is_timed_separately() {
    let (app, sink, _home) = recorded_app();
    send(&app, "/ex/err/manual/deny").await;
    send(&app, "/ex/err/manual/deny").await;
    send(&app, "/").await;

    let calls = sink.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0][1], "ex.err.manual.deny.GET.4xx");
    assert_eq!(calls[2][0], "root.GET.404");
}

#[tokio::test]
async fn timed_out_requests_are_still_timed() {
    let sink = Arc::new(RecordingSink::default());
    let (ctx, _home) = ctx(ApiIngressConfig::default());
    let app = ApiIngress::new(ctx.with_metrics(sink.clone()))
        .with_request_timeout(Some(Duration::from_millis(20)))
        .build_router_with([&PANICKING])
        .unwrap();

    assert_eq!(send(&app, "/p/slow").await, StatusCode::GATEWAY_TIMEOUT);

    assert_eq!(
        sink.calls(),
        vec![vec![
            "p.slow.GET.504".to_string(),
            "p.slow.GET.5xx".to_string(),
            "p.slow.GET.ALL".to_string(),
        ]]
    );
}

#[tokio::test]
async fn memory_sink_is_served_on_metrics() {
    let (ctx, _home) = ctx(ApiIngressConfig {
        metrics: MetricsKind::Memory,
        ..ApiIngressConfig::default()
    });
    let app = ApiIngress::new(ctx).build_router().unwrap();
    send(&app, "/ex/err/manual/deny").await;

    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let snapshot: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(snapshot["ex.err.manual.deny.GET.403"]["count"], 1);
    assert_eq!(snapshot["ex.err.manual.deny.GET.ALL"]["count"], 1);
}

#[tokio::test]
async fn metrics_endpoint_is_not_found_with_log_sink() {
    let (ctx, _home) = ctx(ApiIngressConfig::default());
    let app = ApiIngress::new(ctx).build_router().unwrap();
    assert_eq!(send(&app, "/metrics").await, StatusCode::NOT_FOUND);
}
