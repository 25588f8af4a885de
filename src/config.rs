//! Client configuration
//!
//! Loaded from `client.toml` (working directory or `config/`), with every
//! field defaulted so the client also runs bare. `MANAGER_URL` and
//! `UPLOAD_PASSWORD` can be overridden from the environment, matching how
//! the manager receives its password.

use crate::hardware::sim::SimConfig;
use serde::Deserialize;
use sprout_shared::protocol;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the manager service
    pub manager_url: String,
    /// Shared upload password sent with every POST
    pub password: String,
    /// Seconds between scheduler polls
    pub poll_period_secs: u64,
    /// Seconds between fetch/report cycles
    pub update_period_secs: u64,
    /// Dwell for the `do nothing` command, seconds
    pub do_nothing_dwell_secs: u64,
    /// Manager-side name of the moisture sensor
    pub moisture_sensor_name: String,
    /// Manager-side name of the light sensor
    pub light_sensor_name: String,
    /// Pump throughput, millilitres per second
    pub pump_rate_ml_per_sec: f64,
    /// Seconds to wait for the line to drain after a targeted pump
    pub drain_wait_secs: u64,
    /// Seconds the diverter servo takes to settle
    pub diverter_settle_secs: u64,
    /// Diverter position per plant name, in [0, 1]
    pub diverter_targets: HashMap<String, f64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            manager_url: "http://127.0.0.1:8000".into(),
            password: "password".into(),
            poll_period_secs: protocol::EVENT_EXECUTION_PERIOD_SECS,
            update_period_secs: protocol::BATCH_UPDATE_PERIOD_SECS,
            do_nothing_dwell_secs: 10,
            moisture_sensor_name: "soil moisture sensor".into(),
            light_sensor_name: "light sensor".into(),
            pump_rate_ml_per_sec: 10.0,
            drain_wait_secs: 5,
            diverter_settle_secs: 1,
            diverter_targets: HashMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from the first candidate path that exists, falling back to
    /// defaults, then apply environment overrides.
    pub fn load_or_default() -> Self {
        let candidates = [
            PathBuf::from("client.toml"),
            PathBuf::from("config").join("client.toml"),
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

        if let Ok(url) = std::env::var("MANAGER_URL") {
            config.manager_url = url;
        }
        if let Ok(password) = std::env::var("UPLOAD_PASSWORD") {
            config.password = password;
        }
        config
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.poll_period_secs)
    }

    pub fn update_period(&self) -> Duration {
        Duration::from_secs(self.update_period_secs)
    }

    pub fn do_nothing_dwell(&self) -> Duration {
        Duration::from_secs(self.do_nothing_dwell_secs)
    }

    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            pump_rate_ml_per_sec: self.pump_rate_ml_per_sec,
            drain_wait: Duration::from_secs(self.drain_wait_secs),
            diverter_settle: Duration::from_secs(self.diverter_settle_secs),
            targets: self.diverter_targets.clone(),
        }
    }
}
