//! Manager configuration
//!
//! Loaded from `manager.toml` with defaults for every field. The upload
//! password, bind address and database path can be overridden from the
//! environment (`UPLOAD_PASSWORD`, `MANAGER_BIND`, `MANAGER_DB`), matching
//! how the original deployment received its password.

use crate::store::SeedConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Listen address
    pub bind: String,
    /// SQLite database path
    pub db_path: PathBuf,
    /// Shared upload password expected on client POSTs
    pub password: String,
    /// First-run database contents
    pub seed: SeedConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".into(),
            db_path: PathBuf::from("manager.db"),
            password: "password".into(),
            seed: SeedConfig::default(),
        }
    }
}

impl ManagerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        let candidates = [
            PathBuf::from("manager.toml"),
            PathBuf::from("config").join("manager.toml"),
        ];

        let mut config = Self::default();
        for path in &candidates {
            if path.exists() {
                match Self::load(path) {
                    Ok(loaded) => {
                        info!("Loaded config from {}", path.display());
                        config = loaded;
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        if let Ok(password) = std::env::var("UPLOAD_PASSWORD") {
            config.password = password;
        }
        if let Ok(bind) = std::env::var("MANAGER_BIND") {
            config.bind = bind;
        }
        if let Ok(db) = std::env::var("MANAGER_DB") {
            config.db_path = PathBuf::from(db);
        }
        config
    }
}
