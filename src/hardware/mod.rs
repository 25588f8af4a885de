//! Hardware boundary for the watering rig
//!
//! The client reaches the moisture/light sensors, the pump relay and the
//! diverter servo only through the [`Hardware`] trait. The shipped
//! implementation is [`sim::SimulatedHardware`]; the real MCP3008/GPIO
//! drivers live outside this crate behind the same trait.

pub mod sim;

pub use sim::{SimConfig, SimulatedHardware};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during sensing or actuation
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("unknown diverter target: {0}")]
    UnknownTarget(String),

    #[error("actuation failed: {0}")]
    Actuation(String),

    #[error("sensor read failed: {0}")]
    SensorRead(String),
}

/// The moisture/light sensors, pump and diverter servo
///
/// Pumping calls block the calling task for the duration of the physical
/// action (seconds). Effects are real and are not undone on failure.
#[async_trait]
pub trait Hardware: Send + Sync {
    /// Sample the soil moisture sensor, normalized to [0, 1]
    async fn read_moisture(&self) -> Result<f64, HardwareError>;

    /// Sample the light sensor, normalized to [0, 1]
    async fn read_light(&self) -> Result<f64, HardwareError>;

    /// Run the pump until `millilitres` have been delivered
    async fn pump_volume(&self, millilitres: u32) -> Result<(), HardwareError>;

    /// Move the diverter to `target`, pump, then wait for the line to drain
    async fn pump_volume_with_target(
        &self,
        millilitres: u32,
        target: &str,
    ) -> Result<(), HardwareError>;

    /// Release GPIO/PWM resources on shutdown
    async fn cleanup(&self) -> Result<(), HardwareError>;
}
