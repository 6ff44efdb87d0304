use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{Error, Result, env_subst::substitute_env, schema::TracingConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["routespan.toml", "routespan.json"];

/// Load and validate config from the given path.
pub fn load_config(path: &Path) -> Result<TracingConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    let config = parse_config(&raw, path)?;
    config.validate()?;
    Ok(config)
}

/// Parse raw config text, picking the format from the file extension.
pub fn parse_config(raw: &str, path: &Path) -> Result<TracingConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./routespan.{toml,json}`
/// 2. `<user config dir>/routespan/routespan.{toml,json}`
///
/// Returns `TracingConfig::default()` if no file is found or the file is invalid.
pub fn discover_and_load() -> TracingConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return TracingConfig::default();
    };

    debug!(path = %path.display(), "loading config");
    load_config(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
        TracingConfig::default()
    })
}

/// Returns the user-global config directory.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "routespan").map(|d| d.config_dir().to_path_buf())
}

fn find_config_file() -> Option<PathBuf> {
    find_config_file_in(Path::new("."), config_dir().as_deref())
}

fn find_config_file_in(local_dir: &Path, global_dir: Option<&Path>) -> Option<PathBuf> {
    [Some(local_dir), global_dir]
        .into_iter()
        .flatten()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}
