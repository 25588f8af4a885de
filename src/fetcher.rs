//! Update Fetcher
//!
//! Each cycle pulls the task list from the manager and hands it to the
//! scheduler, then asks the scheduler for a fresh sensor batch and posts it
//! back. Network failures are logged and swallowed; the next cycle retries
//! naturally.

use crate::api::ManagerApi;
use crate::scheduler::SchedulerMsg;
use sprout_shared::SensorBatch;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Fetcher {
    api: Arc<dyn ManagerApi>,
    scheduler_tx: mpsc::Sender<SchedulerMsg>,
    password: String,
    period: Duration,
}

impl Fetcher {
    pub fn new(
        api: Arc<dyn ManagerApi>,
        scheduler_tx: mpsc::Sender<SchedulerMsg>,
        password: String,
        period: Duration,
    ) -> Self {
        Self {
            api,
            scheduler_tx,
            password,
            period,
        }
    }

    /// One fetch/report cycle. Every failure terminates in a log line.
    async fn cycle(&self) {
        info!("Checking for task updates...");
        match self.api.fetch_tasks().await {
            Ok(tasks) => {
                info!("Update downloaded successfully");
                if self
                    .scheduler_tx
                    .send(SchedulerMsg::ReplaceTasks(tasks))
                    .await
                    .is_err()
                {
                    warn!("Scheduler is gone, dropping task update");
                    return;
                }
            }
            Err(e) => error!("Failed to download update with {}", e),
        }

        info!("Reading sensor values...");
        let (reply, reply_rx) = oneshot::channel();
        if self
            .scheduler_tx
            .send(SchedulerMsg::ReadSensors { reply })
            .await
            .is_err()
        {
            warn!("Scheduler is gone, skipping sensor update");
            return;
        }
        let sensors = match reply_rx.await {
            Ok(sensors) => sensors,
            Err(_) => {
                warn!("Scheduler dropped the sensor request");
                return;
            }
        };

        let batch = SensorBatch {
            password: self.password.clone(),
            sensors,
        };
        info!("Posting sensor update...");
        match self.api.post_readings(&batch).await {
            Ok(()) => info!("Sensor update posted successfully"),
            Err(e) => error!("Failed to post sensor update with {}", e),
        }
    }

    /// Run until cancelled. The first cycle fires immediately; later cycles
    /// are spaced by the update period, with the sleep raced against the
    /// cancellation token.
    pub async fn run(self, token: CancellationToken) {
        loop {
            self.cycle().await;

            tokio::select! {
                _ = token.cancelled() => break,
                _ = sleep(self.period) => {}
            }
        }

        info!("Update fetcher stopped");
    }
}
