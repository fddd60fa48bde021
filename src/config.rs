//! Run limits, loadable from YAML.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Nested user routine calls allowed before `StackOverflow`.
    pub max_call_depth: usize,
    /// Send a variable snapshot to the debug listener with every line.
    pub debug_snapshots: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            debug_snapshots: true,
        }
    }
}

impl RunConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = RunConfig::from_yaml("max_call_depth: 32\n").unwrap();
        assert_eq!(config.max_call_depth, 32);
        assert!(config.debug_snapshots);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RunConfig::from_yaml("max_depth: 3\n").unwrap_err();
        assert!(err.to_string().starts_with("Invalid config:"));
    }

    #[test]
    fn unreadable_file_names_the_path() {
        let err = RunConfig::load(Path::new("/nonexistent/run.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/run.yaml"));
    }
}
