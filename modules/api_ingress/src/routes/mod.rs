//! Route modules and the convention used to mount them.
//!
//! Each module registers a [`RouteModule`] with `inventory::submit!`; its
//! `build` function receives the application context and returns a
//! [`RouteDescriptor`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware::from_fn_with_state, Router};
use thiserror::Error;
use tower_http::timeout::TimeoutLayer;

use crate::instrument::instrument;
use crate::AppCtx;

mod ex;
mod root;
mod siteinfo;

/// Where a descriptor's router is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mount {
    /// `/{domain}/v{api_version}{path}`
    Versioned { api_version: u32 },
    /// `{path}` as given.
    SkipDomain,
}

pub struct RouteDescriptor {
    path: String,
    pub router: Router,
    pub mount: Mount,
}

impl RouteDescriptor {
    pub fn new(path: impl Into<String>, router: Router, mount: Mount) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        if !path.ends_with('/') {
            path.push('/');
        }
        Self {
            path,
            router,
            mount,
        }
    }

    /// Normalized path: always starts and ends with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full mount point, including the domain/version prefix.
    pub fn mount_path(&self) -> String {
        match self.mount {
            Mount::Versioned { api_version } => format!("/{{domain}}/v{api_version}{}", self.path),
            Mount::SkipDomain => self.path.clone(),
        }
    }
}

/// A discoverable route module.
pub struct RouteModule {
    pub name: &'static str,
    pub build: fn(&Arc<AppCtx>) -> anyhow::Result<RouteDescriptor>,
}

inventory::collect!(RouteModule);

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route module '{module}' failed to build")]
    Build {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("route modules '{first}' and '{second}' both mount at '{path}'")]
    DuplicateMount {
        first: &'static str,
        second: &'static str,
        path: String,
    },
}

/// All registered route modules, ordered by name.
pub fn discover() -> Vec<&'static RouteModule> {
    let mut modules: Vec<&'static RouteModule> = inventory::iter::<RouteModule>().collect();
    modules.sort_by_key(|m| m.name);
    modules
}

/// Build every module, wrap its handlers with the instrumentation layer and
/// mount the result. A root mount (`/`) is merged, everything else nested.
///
/// The request timeout runs inside the instrumentation, so a timed-out
/// handler still ends with one timing as a 504.
pub fn mount_all<'a>(
    ctx: &Arc<AppCtx>,
    modules: impl IntoIterator<Item = &'a RouteModule>,
    request_timeout: Option<Duration>,
) -> Result<Router, RouteError> {
    let mut router = Router::new();
    let mut seen: HashMap<String, &'static str> = HashMap::new();

    for module in modules {
        let desc = (module.build)(ctx).map_err(|source| RouteError::Build {
            module: module.name,
            source,
        })?;
        let mount = desc.mount_path();
        if let Some(first) = seen.insert(mount.clone(), module.name) {
            return Err(RouteError::DuplicateMount {
                first,
                second: module.name,
                path: mount,
            });
        }

        let mut routes = desc.router;
        if let Some(timeout) = request_timeout {
            routes = routes.route_layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                timeout,
            ));
        }
        let routes = routes.route_layer(from_fn_with_state(ctx.metrics.clone(), instrument));
        router = if mount == "/" {
            router.merge(routes)
        } else {
            router.nest(mount.trim_end_matches('/'), routes)
        };
        tracing::debug!(module = module.name, mount = %mount, "mounted routes");
    }
    Ok(router)
}
