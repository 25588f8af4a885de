//! Executes parsed commands against the hardware boundary

use super::Command;
use crate::hardware::{Hardware, HardwareError};
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Why a command did not execute
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("command not recognized: {0:?}")]
    NotRecognized(String),

    #[error(transparent)]
    Hardware(#[from] HardwareError),
}

/// Run a parsed command to completion.
///
/// Blocks the calling task for the duration of any physical action. Hardware
/// effects performed before a failure are not undone.
pub async fn run(
    command: &Command,
    hardware: &dyn Hardware,
    dwell: Duration,
) -> Result<(), CommandError> {
    match command {
        Command::DoNothing => {
            info!("Doing nothing for {:.0}s", dwell.as_secs_f64());
            sleep(dwell).await;
            Ok(())
        }
        Command::PumpVolume { millilitres } => {
            hardware.pump_volume(*millilitres).await?;
            Ok(())
        }
        Command::PumpVolumeWithTarget { millilitres, target } => {
            hardware.pump_volume_with_target(*millilitres, target).await?;
            Ok(())
        }
        Command::Unrecognized(raw) => Err(CommandError::NotRecognized(raw.clone())),
    }
}
