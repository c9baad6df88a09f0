use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CSP: &str = "default-src 'self'; object-src 'none'; media-src *; img-src *; style-src *; frame-ancestors 'self'";

/// Which sink receives per-route timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetricsKind {
    /// Emit timings as `metrics` log events.
    #[default]
    Log,
    /// Aggregate in memory and expose them on `/metrics`.
    Memory,
}

/// `no_proxy_list` accepts either a YAML list or a single comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NoProxyList {
    List(Vec<String>),
    Joined(String),
}

impl NoProxyList {
    pub fn joined(&self) -> String {
        match self {
            NoProxyList::List(items) => items.join(","),
            NoProxyList::Joined(s) => s.clone(),
        }
    }
}

/// API ingress configuration, read from `modules.api_ingress`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiIngressConfig {
    pub compression_level: u32,
    /// Value of `Access-Control-Allow-Origin`; empty or `false` disables CORS.
    pub cors: String,
    /// Content security policy; empty or `false` disables the CSP headers.
    pub csp: String,
    pub log_header_whitelist: Vec<String>,
    /// Path of the YAML API document, relative to the home dir.
    pub spec: String,
    pub enable_docs: bool,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub no_proxy_list: Option<NoProxyList>,
    pub body_limit_bytes: usize,
    pub metrics: MetricsKind,
}

impl Default for ApiIngressConfig {
    fn default() -> Self {
        Self {
            compression_level: 3,
            cors: "*".to_string(),
            csp: DEFAULT_CSP.to_string(),
            log_header_whitelist: [
                "cache-control",
                "content-type",
                "content-length",
                "if-match",
                "user-agent",
                "x-request-id",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            spec: "spec.yaml".to_string(),
            enable_docs: true,
            user_agent: None,
            proxy: None,
            no_proxy_list: None,
            body_limit_bytes: 16 * 1024 * 1024,
            metrics: MetricsKind::Log,
        }
    }
}

fn enabled(value: &str) -> Option<&str> {
    let v = value.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("false") {
        None
    } else {
        Some(v)
    }
}

impl ApiIngressConfig {
    pub fn cors_origin(&self) -> Option<&str> {
        enabled(&self.cors)
    }

    pub fn csp_policy(&self) -> Option<&str> {
        enabled(&self.csp)
    }

    /// Case-insensitive `^(?:a|b|...)$` over the configured header names.
    /// Entries are used as regex alternatives, so `x-.*` is allowed.
    pub fn header_allow_list(&self) -> Result<Regex, regex::Error> {
        let alternatives: Vec<&str> = self
            .log_header_whitelist
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .collect();
        RegexBuilder::new(&format!("^(?:{})$", alternatives.join("|")))
            .case_insensitive(true)
            .build()
    }

    pub fn user_agent_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.user_agent.as_deref().unwrap_or(fallback)
    }

    /// Export proxy settings for outgoing HTTP clients.
    pub fn export_proxy_env(&self) {
        let Some(proxy) = self.proxy.as_deref().filter(|p| !p.is_empty()) else {
            return;
        };
        std::env::set_var("HTTP_PROXY", proxy);
        if let Some(list) = &self.no_proxy_list {
            std::env::set_var("NO_PROXY", list.joined());
        }
    }
}
