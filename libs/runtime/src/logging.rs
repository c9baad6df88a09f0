//! `tracing` subscriber setup driven by [`LoggingConfig`].
//!
//! Every key of the config except `"default"` names a subsystem: a target
//! prefix such as `api_ingress` or `api_ingress::error`. Each subsystem gets
//! its own console level and, optionally, its own rotating JSON log file.
//! The `"default"` section covers every target not claimed by a subsystem.

use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::filter::{FilterFn, Targets};
use tracing_subscriber::fmt;

use crate::config::{LoggingConfig, Section};
use crate::paths::resolve_against;

const DEFAULT_SECTION: &str = "default";

fn parse_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

/// Returns true if target == prefix or target starts with "prefix::"
fn matches_prefix(target: &str, prefix: &str) -> bool {
    target == prefix
        || (target.starts_with(prefix) && target[prefix.len()..].starts_with("::"))
}

// -------- rotating file writers --------

type Rotating = Arc<Mutex<FileRotate<AppendTimestamp>>>;

#[derive(Clone)]
struct FileHandle(Option<Rotating>);

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(file) => file
                .lock()
                .map_err(|_| std::io::Error::other("log file lock poisoned"))?
                .write(buf),
            // No file for this target: drop silently.
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(file) => file
                .lock()
                .map_err(|_| std::io::Error::other("log file lock poisoned"))?
                .flush(),
            None => Ok(()),
        }
    }
}

/// Routes each record to the file of the subsystem owning its target.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<Rotating>,
    by_prefix: Vec<(String, Rotating)>,
}

impl FileRouter {
    fn resolve(&self, target: &str) -> Option<Rotating> {
        self.by_prefix
            .iter()
            .find(|(prefix, _)| matches_prefix(target, prefix))
            .map(|(_, file)| file.clone())
            .or_else(|| self.default.clone())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = FileHandle;

    fn make_writer(&'a self) -> Self::Writer {
        FileHandle(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        FileHandle(self.resolve(meta.target()))
    }
}

fn open_rotating(path: &Path, section: &Section) -> std::io::Result<Rotating> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let max_bytes = section.max_size_mb.unwrap_or(100) * 1024 * 1024;
    let limit = match section.max_backups {
        Some(n) => FileLimit::MaxFiles(n),
        None => FileLimit::Age(chrono::Duration::days(1)),
    };
    let rot = FileRotate::new(
        path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes as usize),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(Arc::new(Mutex::new(rot)))
}

fn open_section_file(name: &str, section: &Section, base_dir: &Path) -> Option<Rotating> {
    if section.file.trim().is_empty() {
        return None;
    }
    let path = resolve_against(&section.file, base_dir);
    match open_rotating(&path, section) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!(
                "Failed to init log file for '{}': {} ({})",
                name,
                path.display(),
                e
            );
            None
        }
    }
}

// -------- filters --------

struct Plan<'a> {
    default: Option<&'a Section>,
    subsystems: Vec<(&'a str, &'a Section)>,
}

impl<'a> Plan<'a> {
    fn from_config(cfg: &'a LoggingConfig) -> Self {
        let mut subsystems: Vec<_> = cfg
            .iter()
            .filter(|(k, _)| k.as_str() != DEFAULT_SECTION)
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        // Longest prefix first so nested subsystems win.
        subsystems.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        Self {
            default: cfg.get(DEFAULT_SECTION),
            subsystems,
        }
    }

    fn prefixes(&self) -> Vec<String> {
        self.subsystems.iter().map(|(n, _)| n.to_string()).collect()
    }

    fn targets(&self, level_of: impl Fn(&Section) -> &str, files_only: bool) -> Targets {
        let mut targets = Targets::new().with_default(LevelFilter::OFF);
        for (name, section) in &self.subsystems {
            if files_only && section.file.trim().is_empty() {
                continue;
            }
            if let Some(level) = parse_level(level_of(section)) {
                targets = targets.with_target(name.to_string(), LevelFilter::from_level(level));
            }
        }
        targets
    }
}

type DefaultFilter = FilterFn<Box<dyn Fn(&tracing::Metadata<'_>) -> bool + Send + Sync>>;

/// Everything not owned by a subsystem, up to `max_level`.
fn unclaimed_targets(prefixes: Vec<String>, max_level: Level) -> DefaultFilter {
    FilterFn::new(Box::new(move |meta: &tracing::Metadata<'_>| {
        let t = meta.target();
        !prefixes.iter().any(|p| matches_prefix(t, p)) && meta.level() <= &max_level
    }))
}

// -------- public init --------

/// Install the global subscriber.
///
/// `base_dir` resolves relative log file paths (usually `server.home_dir`).
/// Calling this more than once is harmless: later calls are ignored.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

    // Bridge `log` → `tracing` before installing the subscriber.
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = tracing_subscriber::fmt()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .try_init();
        return;
    }

    let plan = Plan::from_config(cfg);
    let ansi = std::io::stdout().is_terminal();

    let mut router = FileRouter::default();
    for (name, section) in &plan.subsystems {
        if let Some(file) = open_section_file(name, section, base_dir) {
            router.by_prefix.push((name.to_string(), file));
        }
    }
    if let Some(section) = plan.default {
        router.default = open_section_file(DEFAULT_SECTION, section, base_dir);
    }

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    layers.push(
        fmt::layer()
            .with_ansi(ansi)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(plan.targets(|s| s.console_level.as_str(), false))
            .boxed(),
    );

    if !router.is_empty() {
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(router.clone())
                .with_filter(plan.targets(|s| s.file_level.as_str(), true))
                .boxed(),
        );
    }

    if let Some(section) = plan.default {
        if let Some(level) = parse_level(&section.console_level) {
            layers.push(
                fmt::layer()
                    .with_ansi(ansi)
                    .with_target(true)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .with_filter(unclaimed_targets(plan.prefixes(), level))
                    .boxed(),
            );
        }
        if router.default.is_some() {
            if let Some(level) = parse_level(&section.file_level) {
                layers.push(
                    fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_target(true)
                        .with_timer(fmt::time::UtcTime::rfc_3339())
                        .with_writer(router)
                        .with_filter(unclaimed_targets(plan.prefixes(), level))
                        .boxed(),
                );
            }
        }
    }

    let _ = Registry::default().with(layers).try_init();
}

/// Snapshot of which files each subsystem writes to, for `check` output.
pub fn describe_log_files(cfg: &LoggingConfig, base_dir: &Path) -> HashMap<String, String> {
    cfg.iter()
        .filter(|(_, s)| !s.file.trim().is_empty())
        .map(|(name, s)| {
            (
                name.clone(),
                resolve_against(&s.file, base_dir).to_string_lossy().to_string(),
            )
        })
        .collect()
}
