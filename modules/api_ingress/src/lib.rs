//! HTTP ingress: request context, per-route instrumentation, error
//! normalization and the built-in route modules.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::serve::ListenerExt;
use axum::Router;
use serde::Serialize;
use serde_json::Value;
use service_errors::{catalog, HttpError};
use tower_http::{
    compression::{CompressionLayer, CompressionLevel},
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
};

mod config;
pub mod error;
pub mod instrument;
pub mod metrics;
mod openapi;
pub mod request_id;
pub mod routes;
pub mod shutdown;
mod web;

pub use config::{ApiIngressConfig, MetricsKind, NoProxyList, DEFAULT_CSP};
pub use metrics::{InMemoryMetrics, LogMetrics, MetricsSink};
pub use request_id::{HeaderFilter, RequestContext};

/// Module name under `modules:` in the service configuration.
pub const MODULE_NAME: &str = "api_ingress";

const CSP_HEADERS: [&str; 3] = [
    "content-security-policy",
    "x-content-security-policy",
    "x-webkit-csp",
];

/// Package metadata reported on `/_info` and in the API document.
#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub homepage: Option<String>,
}

impl AppInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            homepage: None,
        }
    }

    pub fn with_homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = Some(homepage.into());
        self
    }
}

/// Application context handed to every route module.
pub struct AppCtx {
    pub config: ApiIngressConfig,
    pub info: AppInfo,
    /// API document served on `/?spec`.
    pub spec: Value,
    pub spec_path: PathBuf,
    pub metrics: Arc<dyn MetricsSink>,
    /// Set when timings are aggregated in memory and exposed on `/metrics`.
    pub memory_metrics: Option<Arc<InMemoryMetrics>>,
    pub header_filter: HeaderFilter,
}

impl AppCtx {
    /// Relative paths in `config` (the API document) resolve against `home_dir`.
    pub fn new(config: ApiIngressConfig, info: AppInfo, home_dir: &Path) -> Result<Self> {
        let header_filter = HeaderFilter::new(
            config
                .header_allow_list()
                .context("invalid log_header_whitelist")?,
        );

        let spec_path = {
            let p = Path::new(&config.spec);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                home_dir.join(p)
            }
        };
        let spec = openapi::load_spec(&spec_path, &info);

        let (metrics, memory_metrics) = match config.metrics {
            MetricsKind::Log => (Arc::new(LogMetrics) as Arc<dyn MetricsSink>, None),
            MetricsKind::Memory => {
                let memory = Arc::new(InMemoryMetrics::new());
                (memory.clone() as Arc<dyn MetricsSink>, Some(memory))
            }
        };

        Ok(Self {
            config,
            info,
            spec,
            spec_path,
            metrics,
            memory_metrics,
            header_filter,
        })
    }

    /// Replace the configured timing sink.
    pub fn with_metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = sink;
        self.memory_metrics = None;
        self
    }
}

async fn not_found() -> HttpError {
    catalog::NOT_FOUND.to_error("")
}

fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return Ok(layer.allow_origin(Any));
    }
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("invalid cors origin '{origin}'"))?;
    Ok(layer.allow_origin(origin))
}

pub struct ApiIngress {
    ctx: Arc<AppCtx>,
    request_timeout: Option<Duration>,
}

impl ApiIngress {
    pub fn new(ctx: AppCtx) -> Self {
        Self {
            ctx: Arc::new(ctx),
            request_timeout: None,
        }
    }

    /// Requests running longer than `timeout` complete with a 504.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Build from the service configuration (`server` and `modules.api_ingress`).
    pub fn from_app_config(app: &runtime::AppConfig, info: AppInfo) -> Result<Self> {
        let cfg: ApiIngressConfig = app.module_config(MODULE_NAME)?;
        cfg.export_proxy_env();
        let ctx = AppCtx::new(cfg, info, Path::new(&app.server.home_dir))?;
        Ok(Self::new(ctx)
            .with_request_timeout(Some(Duration::from_secs(app.server.timeout_sec))))
    }

    pub fn ctx(&self) -> &Arc<AppCtx> {
        &self.ctx
    }

    /// Router with every registered route module and the full layer stack.
    pub fn build_router(&self) -> Result<Router> {
        self.build_router_with(routes::discover())
    }

    pub fn build_router_with<'a>(
        &self,
        modules: impl IntoIterator<Item = &'a routes::RouteModule>,
    ) -> Result<Router> {
        let ctx = &self.ctx;
        let cfg = &ctx.config;

        let mut router = routes::mount_all(ctx, modules, self.request_timeout)?.fallback(not_found);

        // Innermost first: every later layer wraps the ones before it.
        // The request timeout is applied per route, see `routes::mount_all`.
        router = router.layer(RequestBodyLimitLayer::new(cfg.body_limit_bytes));
        router = router.layer(from_fn(error::handle_errors));
        router = router.layer(from_fn_with_state(
            ctx.header_filter.clone(),
            request_id::init_and_log_request,
        ));
        router = router.layer(
            CompressionLayer::new().quality(CompressionLevel::Precise(cfg.compression_level as i32)),
        );
        if let Some(origin) = cfg.cors_origin() {
            router = router.layer(cors_layer(origin)?);
        }
        if let Some(csp) = cfg.csp_policy() {
            let value = HeaderValue::from_str(csp).context("invalid csp")?;
            for name in CSP_HEADERS {
                router = router.layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static(name),
                    value.clone(),
                ));
            }
        }
        router = router.layer(request_id::create_trace_layer());
        router = router.layer(PropagateRequestIdLayer::new(request_id::header()));
        router = router.layer(SetRequestIdLayer::new(
            request_id::header(),
            request_id::MakeReqId,
        ));

        Ok(router)
    }

    /// Bind `addr` and serve until `shutdown` resolves, draining in-flight
    /// requests.
    pub async fn serve<F>(&self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?
            .tap_io(|tcp| {
                if let Err(err) = tcp.set_nodelay(true) {
                    tracing::trace!(error = %err, "failed to set TCP_NODELAY");
                }
            });
        tracing::info!("{} listening on {}", self.ctx.info.name, addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server failed")
    }
}
