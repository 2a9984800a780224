//! JSON config file load/save, mirroring the teacher's settings pattern:
//! missing fields fall back to `Config`'s defaults, and the file is
//! normalized once on load.

use std::fs;
use std::path::{Path, PathBuf};

use relay_core::config::Config;
use relay_core::error::RelayError;

pub fn default_config_path() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        })
        .join("relay-agent")
        .join("config.json")
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Err(RelayError::ConfigNotFound { path: path.to_path_buf() }.into());
    }
    let raw = fs::read_to_string(path)?;
    let mut config: Config = serde_json::from_str(&raw).map_err(|e| RelayError::Config(e.to_string()))?;
    config.normalize();
    Ok(config)
}

pub fn load_config_or_default(path: &Path) -> Config {
    match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "using default configuration");
            let mut config = Config::default();
            config.normalize();
            config
        }
    }
}

pub fn save_config(path: &Path, config: &Config) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
