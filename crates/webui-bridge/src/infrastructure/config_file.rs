//! Reading the optional TOML configuration file.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::BridgeConfigFile;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads `path`.  A missing file yields an empty [`BridgeConfigFile`] so a
/// default `--config` location may simply not exist.
///
/// # Errors
///
/// [`ConfigError::Io`] for read failures other than "not found",
/// [`ConfigError::Parse`] for malformed TOML.
pub fn load_config_file(path: &Path) -> Result<BridgeConfigFile, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BridgeConfigFile::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("webui-bridge-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let loaded = load_config_file(Path::new("/nonexistent/webui/bridge.toml")).unwrap();
        assert_eq!(loaded, BridgeConfigFile::default());
    }

    #[test]
    fn test_file_is_parsed() {
        // Arrange
        let path = scratch_file("[timeouts]\nresponse_secs = 5\n");

        // Act
        let loaded = load_config_file(&path).unwrap();

        // Assert
        assert_eq!(loaded.timeouts.response_secs, Some(5));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let path = scratch_file("[server\nbind_addr = ");
        assert!(matches!(load_config_file(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_file(path).ok();
    }
}
