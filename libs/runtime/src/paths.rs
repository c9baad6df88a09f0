use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

fn user_home() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "APPDATA";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Resolve the service home directory into an absolute path.
///
/// - `None` => `<user home>/<default_subdir>`
/// - `~` / `~/x` => expanded against the user home
/// - relative => joined with the current working directory
pub(crate) fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf> {
    let resolved = match configured {
        None => user_home()
            .context("cannot determine the user home directory")?
            .join(default_subdir),
        Some(raw) => {
            let expanded = if raw == "~" {
                user_home().context("cannot expand '~'")?
            } else if let Some(rest) = raw.strip_prefix("~/") {
                user_home().context("cannot expand '~'")?.join(rest)
            } else {
                PathBuf::from(raw)
            };
            if expanded.is_absolute() {
                expanded
            } else {
                std::env::current_dir()?.join(expanded)
            }
        }
    };

    if create {
        std::fs::create_dir_all(&resolved)
            .with_context(|| format!("failed to create {}", resolved.display()))?;
    }
    Ok(resolved)
}

/// Resolve a file path against `base_dir`; absolute paths are kept as-is.
pub(crate) fn resolve_against(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}
