//! Simulated hardware for development off the Pi
//!
//! Timings mirror the real rig: pumping takes ml / rate seconds, moving the
//! diverter takes a settle delay, and pump-to-target waits for the line to
//! drain afterwards. Sensor values are a slow baseline with jitter.

use super::{Hardware, HardwareError};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

/// Timing and calibration for the simulated rig
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Pump throughput in millilitres per second
    pub pump_rate_ml_per_sec: f64,
    /// Time to wait for the line to drain after a targeted pump
    pub drain_wait: Duration,
    /// Time the diverter servo takes to settle on a new position
    pub diverter_settle: Duration,
    /// Diverter position per named target, in [0, 1]
    pub targets: HashMap<String, f64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pump_rate_ml_per_sec: 10.0,
            drain_wait: Duration::from_secs(5),
            diverter_settle: Duration::from_secs(1),
            targets: HashMap::new(),
        }
    }
}

pub struct SimulatedHardware {
    config: SimConfig,
    moisture_baseline: f64,
    light_baseline: f64,
}

impl SimulatedHardware {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            moisture_baseline: 0.42,
            light_baseline: 0.68,
        }
    }

    fn jittered(&self, baseline: f64) -> f64 {
        let noise = rand::thread_rng().gen_range(-0.05..0.05);
        (baseline + noise).clamp(0.0, 1.0)
    }

    fn pump_duration(&self, millilitres: u32) -> Duration {
        Duration::from_secs_f64(f64::from(millilitres) / self.config.pump_rate_ml_per_sec)
    }
}

#[async_trait]
impl Hardware for SimulatedHardware {
    async fn read_moisture(&self) -> Result<f64, HardwareError> {
        // The real driver averages three ADC samples over a second
        sleep(Duration::from_secs(1)).await;
        Ok(self.jittered(self.moisture_baseline))
    }

    async fn read_light(&self) -> Result<f64, HardwareError> {
        Ok(self.jittered(self.light_baseline))
    }

    async fn pump_volume(&self, millilitres: u32) -> Result<(), HardwareError> {
        let duration = self.pump_duration(millilitres);
        info!("Pumping {}ml ({:.1}s)", millilitres, duration.as_secs_f64());
        sleep(duration).await;
        Ok(())
    }

    async fn pump_volume_with_target(
        &self,
        millilitres: u32,
        target: &str,
    ) -> Result<(), HardwareError> {
        let position = *self
            .config
            .targets
            .get(target)
            .ok_or_else(|| HardwareError::UnknownTarget(target.to_string()))?;

        debug!("Moving diverter to {:?} (position {:.2})", target, position);
        sleep(self.config.diverter_settle).await;

        self.pump_volume(millilitres).await?;

        debug!("Waiting for line to drain");
        sleep(self.config.drain_wait).await;
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), HardwareError> {
        info!("Releasing simulated hardware");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim_with_target(name: &str) -> SimulatedHardware {
        let mut config = SimConfig {
            pump_rate_ml_per_sec: 1000.0,
            drain_wait: Duration::from_millis(1),
            diverter_settle: Duration::from_millis(1),
            targets: HashMap::new(),
        };
        config.targets.insert(name.to_string(), 0.5);
        SimulatedHardware::new(config)
    }

    #[tokio::test]
    async fn unknown_target_is_rejected() {
        let sim = sim_with_target("Roberto");
        let err = sim
            .pump_volume_with_target(10, "Clara")
            .await
            .expect_err("target is not configured");
        assert!(matches!(err, HardwareError::UnknownTarget(name) if name == "Clara"));
    }

    #[tokio::test]
    async fn known_target_pumps() {
        let sim = sim_with_target("Roberto");
        sim.pump_volume_with_target(10, "Roberto")
            .await
            .expect("configured target pumps");
    }

    #[tokio::test]
    async fn light_reading_is_normalized() {
        let sim = sim_with_target("Roberto");
        let value = sim.read_light().await.expect("light reads");
        assert!((0.0..=1.0).contains(&value));
    }
}
