//! Resolver configuration.
//!
//! ```yaml
//! capture: true
//! log_args: true
//! log_args_as_entities: true
//! log_kwargs: true
//! warn_on_unresolved: true
//! ```
//!
//! Every key is optional. The file is looked up at `PROVDESC_CONFIG_PATH` when set, otherwise at
//! `<config dir>/provdesc/config.yaml`; a missing file means defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs_next::{config_dir, home_dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "PROVDESC_CONFIG_PATH";

/// Switches that control what the resolver records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// When false, resolution returns an empty record for every activity.
    pub capture: bool,
    /// Record positional arguments not covered by a declared parameter.
    pub log_args: bool,
    /// Record captured positional arguments as used entities instead of parameters.
    pub log_args_as_entities: bool,
    /// Record keyword arguments not covered by a declared parameter.
    pub log_kwargs: bool,
    /// Emit a warning for every reference that cannot be evaluated.
    pub warn_on_unresolved: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            capture: true,
            log_args: true,
            log_args_as_entities: true,
            log_kwargs: true,
            warn_on_unresolved: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read resolver configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid resolver configuration {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ResolverConfig {
    /// Loads the configuration from [`default_config_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&default_config_path())
    }

    /// Loads the configuration from a file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no resolver configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Returns the default path of the resolver configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("provdesc").join("config.yaml")
}

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if trimmed == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = trimmed.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_path_honors_environment_override() {
        let override_path = "~/custom/provdesc/config.yaml";
        temp_env::with_var(CONFIG_PATH_ENV, Some(override_path), || {
            assert_eq!(default_config_path(), expand_tilde(override_path));
        });
    }

    #[test]
    fn blank_override_falls_back_to_config_dir() {
        temp_env::with_var(CONFIG_PATH_ENV, Some("  "), || {
            assert!(default_config_path().ends_with("provdesc/config.yaml"));
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        let directory = tempfile::tempdir().expect("tempdir");
        let config = ResolverConfig::load_from_path(&directory.path().join("absent.yaml")).expect("defaults");
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "log_kwargs: false").expect("write");

        let config = ResolverConfig::load_from_path(file.path()).expect("config loads");
        assert!(!config.log_kwargs);
        assert!(config.capture);
        assert!(config.log_args);
        assert!(config.log_args_as_entities);
    }

    #[test]
    fn args_can_be_logged_as_parameters() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "log_args_as_entities: false").expect("write");

        let config = ResolverConfig::load_from_path(file.path()).expect("config loads");
        assert!(!config.log_args_as_entities);
        assert!(config.log_args);
    }

    #[test]
    fn load_reads_the_overridden_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "capture: false").expect("write");
        let path = file.path().to_string_lossy().into_owned();

        temp_env::with_var(CONFIG_PATH_ENV, Some(path.as_str()), || {
            let config = ResolverConfig::load().expect("config loads");
            assert!(!config.capture);
        });
    }

    #[test]
    fn rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "capture: [not, a, bool]").expect("write");
        assert!(matches!(ResolverConfig::load_from_path(file.path()), Err(ConfigError::Yaml { .. })));
    }
}
