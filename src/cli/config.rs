//! Configuration file discovery for the kvmirror CLI
//!
//! The engine configuration is read from the first of:
//! 1. `--config` command line flag
//! 2. `KVMIRROR_CONFIG` environment variable
//! 3. `~/.kvmirror/config.toml`, when it exists
//!
//! With none of these the built-in defaults plus environment overrides apply.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::EngineConfig;

/// Default configuration file path (~/.kvmirror/config.toml)
pub fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Unable to determine home directory")?;

    let mut path = PathBuf::from(home);
    path.push(".kvmirror");
    path.push("config.toml");
    Ok(path)
}

/// Pick the configuration file to load, if any.
pub fn resolve_config_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = flag {
        debug!(path = %path.display(), "Using config from --config flag");
        return Some(path);
    }

    if let Ok(path) = std::env::var("KVMIRROR_CONFIG") {
        if !path.is_empty() {
            debug!(path = %path, "Using config from KVMIRROR_CONFIG");
            return Some(PathBuf::from(path));
        }
    }

    match default_config_path() {
        Ok(path) if path.exists() => {
            debug!(path = %path.display(), "Using default config file");
            Some(path)
        }
        _ => None,
    }
}

/// Load the engine configuration, letting `--platform` win over file and environment.
pub fn load_engine_config(path: Option<&Path>, platform: Option<String>) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    if let Some(platform) = platform {
        config.platform = platform;
        config.validate().context("Invalid --platform")?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flag_wins() {
        let path = PathBuf::from("/tmp/kvmirror-flag.toml");
        assert_eq!(resolve_config_path(Some(path.clone())), Some(path));
    }

    #[test]
    fn test_platform_flag_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "backend = \"memory\"\nplatform = \"platform-a\"").unwrap();

        let config =
            load_engine_config(Some(file.path()), Some("platform-b".to_string())).unwrap();
        assert_eq!(config.platform, "platform-b");
    }

    #[test]
    fn test_platform_flag_is_validated() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "backend = \"memory\"").unwrap();

        let result = load_engine_config(Some(file.path()), Some("ci/platform-a".to_string()));
        assert!(result.is_err());
    }
}
