use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::ParleyConfig};

/// Config file names, checked in order.
pub const CONFIG_FILENAMES: &[&str] = &["parley.toml", "parley.yaml", "parley.yml", "parley.json"];

/// Supported config file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Yaml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()).unwrap_or("toml") {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("unsupported config format: .{other}"),
        }
    }
}

/// Read, env-substitute and parse the config at `path`.
pub fn load_config(path: &Path) -> anyhow::Result<ParleyConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config(&substitute_env(&raw), Format::from_path(path)?)
}

pub fn parse_config(raw: &str, format: Format) -> anyhow::Result<ParleyConfig> {
    Ok(match format {
        Format::Toml => toml::from_str(raw)?,
        Format::Yaml => serde_yaml::from_str(raw)?,
        Format::Json => serde_json::from_str(raw)?,
    })
}

/// Parse into a generic JSON tree, for validation across formats.
pub fn parse_value(raw: &str, format: Format) -> anyhow::Result<serde_json::Value> {
    Ok(match format {
        Format::Toml => serde_json::to_value(toml::from_str::<toml::Value>(raw)?)?,
        Format::Yaml => serde_json::to_value(serde_yaml::from_str::<serde_yaml::Value>(raw)?)?,
        Format::Json => serde_json::from_str(raw)?,
    })
}

/// Load `explicit` if given, otherwise the first discovered config file.
///
/// Falls back to defaults when nothing is found. A file that exists but fails
/// to load is an error when given explicitly and a warning when discovered.
pub fn load_or_discover(explicit: Option<&Path>) -> anyhow::Result<ParleyConfig> {
    if let Some(path) = explicit {
        debug!(path = %path.display(), "loading config");
        return load_config(path);
    }
    Ok(discover_and_load())
}

/// Discover and load config from `./` then the user config directory.
pub fn discover_and_load() -> ParleyConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return ParleyConfig::default();
    };
    debug!(path = %path.display(), "loading config");
    load_config(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
        ParleyConfig::default()
    })
}

pub fn find_config_file() -> Option<PathBuf> {
    find_in(Path::new(".")).or_else(|| config_dir().and_then(|dir| find_in(&dir)))
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// User-global config directory, e.g. `~/.config/parley/`.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "parley").map(|d| d.config_dir().to_path_buf())
}
