//! Registry configuration file handling.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub version: String,
    /// Address the HTTP server binds to.
    pub bind: String,
    /// Path of the SQLite database file.
    pub database_path: PathBuf,
    /// Upper bound accepted for the `limit` pagination parameter.
    pub max_page_size: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            bind: "127.0.0.1:8460".to_string(),
            database_path: PathBuf::from("toolyard.db"),
            max_page_size: 1000,
        }
    }
}

/// Load the config at `path`, writing a default one first if none exists.
pub fn load_or_create(path: &Path) -> io::Result<RegistryConfig> {
    if !path.exists() {
        let config = RegistryConfig::default();
        let serialized = serde_json::to_vec_pretty(&config)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serialized)?;
        return Ok(config);
    }
    let contents = std::fs::read(path)?;
    serde_json::from_slice(&contents)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_default_on_first_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("toolyard.json");
        let config = load_or_create(&path).expect("load");
        assert!(path.exists());
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.max_page_size, 1000);
    }

    #[test]
    fn reloads_persisted_values() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("toolyard.json");
        let mut config = load_or_create(&path).expect("load");
        config.bind = "127.0.0.1:9000".to_string();
        std::fs::write(&path, serde_json::to_vec_pretty(&config).expect("serialize"))
            .expect("write");

        let reloaded = load_or_create(&path).expect("reload");
        assert_eq!(reloaded.bind, "127.0.0.1:9000");
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("toolyard.json");
        std::fs::write(&path, b"not json").expect("write");
        assert!(load_or_create(&path).is_err());
    }
}
