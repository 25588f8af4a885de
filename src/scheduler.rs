//! Scheduler/Executor
//!
//! Owns the local task set and the hardware handle. Every poll period it
//! snapshots the due tasks, executes them serially, notifies the manager
//! (best-effort), then removes them. Between polls it services messages from
//! the update fetcher, so task replacement and sensor sampling can never
//! overlap an actuation.

use crate::api::ManagerApi;
use crate::command::{runner, Command};
use crate::hardware::Hardware;
use sprout_shared::{now_ts, CompletionNotice, ScheduledTask, SensorReading};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Messages the update fetcher sends to the scheduler
pub enum SchedulerMsg {
    /// Wholesale replacement of the local task set
    ReplaceTasks(Vec<ScheduledTask>),
    /// Sample the sensors and reply with a fresh batch
    ReadSensors {
        reply: oneshot::Sender<Vec<SensorReading>>,
    },
}

/// Knobs the scheduler needs from the client config
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub password: String,
    pub poll_period: Duration,
    pub do_nothing_dwell: Duration,
    pub moisture_sensor_name: String,
    pub light_sensor_name: String,
}

/// A fetched task with its command parsed once at ingestion
struct LocalTask {
    task: ScheduledTask,
    command: Command,
}

pub struct Scheduler {
    api: Arc<dyn ManagerApi>,
    hardware: Arc<dyn Hardware>,
    settings: SchedulerSettings,
    tasks: Vec<LocalTask>,
}

impl Scheduler {
    pub fn new(
        api: Arc<dyn ManagerApi>,
        hardware: Arc<dyn Hardware>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            api,
            hardware,
            settings,
            tasks: Vec::new(),
        }
    }

    /// Replace the local set with a fetched list, unless it is identical.
    /// Returns whether the set changed.
    fn replace_tasks(&mut self, new_tasks: Vec<ScheduledTask>) -> bool {
        let unchanged = self.tasks.len() == new_tasks.len()
            && self.tasks.iter().zip(&new_tasks).all(|(a, b)| &a.task == b);
        if unchanged {
            info!("No new tasks found");
            return false;
        }

        info!("New tasks found: {:?}", new_tasks);
        self.tasks = new_tasks
            .into_iter()
            .map(|task| LocalTask {
                command: Command::parse(&task.command),
                task,
            })
            .collect();
        true
    }

    /// Sample both sensors. A failed read is logged and omitted from the
    /// batch; the manager treats the sensor as silent for this cycle.
    async fn read_sensors(&self) -> Vec<SensorReading> {
        let mut readings = Vec::with_capacity(2);

        match self.hardware.read_moisture().await {
            Ok(value) => readings.push(SensorReading::new(
                self.settings.moisture_sensor_name.clone(),
                value,
                now_ts(),
            )),
            Err(e) => warn!("Failed to read moisture sensor: {}", e),
        }

        match self.hardware.read_light().await {
            Ok(value) => readings.push(SensorReading::new(
                self.settings.light_sensor_name.clone(),
                value,
                now_ts(),
            )),
            Err(e) => warn!("Failed to read light sensor: {}", e),
        }

        readings
    }

    /// One scheduler cycle: execute every task due at the time the cycle
    /// started. The due list is snapshotted before any execution so removal
    /// never races the iteration.
    async fn tick(&mut self) {
        let current_time = now_ts() as f64;
        let due: Vec<(i64, Command)> = self
            .tasks
            .iter()
            .filter(|t| t.task.next_time <= current_time)
            .map(|t| (t.task.task_id, t.command.clone()))
            .collect();

        for (task_id, command) in due {
            info!("Queuing task #{}", task_id);
            self.execute(task_id, &command).await;
        }
    }

    /// Execute one task, notify the manager, then drop the task locally.
    /// Execution failure is logged but does not block progress: the task is
    /// still reported and removed.
    async fn execute(&mut self, task_id: i64, command: &Command) {
        info!("Executing command: {:?}...", command);
        match runner::run(command, &*self.hardware, self.settings.do_nothing_dwell).await {
            Ok(()) => info!("Command executed successfully"),
            Err(e) => error!("Command failed with error message: {}", e),
        }

        let notice = CompletionNotice {
            password: self.settings.password.clone(),
            task_id,
            completion_time: now_ts(),
        };
        info!("Posting task completion notification...");
        if let Err(e) = self.api.notify_completed(&notice).await {
            error!("Failed to post task completion notification with {}", e);
        }

        self.tasks.retain(|t| t.task.task_id != task_id);
    }

    /// Run until cancelled, alternating between poll ticks and fetcher
    /// messages.
    pub async fn run(mut self, mut rx: mpsc::Receiver<SchedulerMsg>, token: CancellationToken) {
        let mut ticker = interval(self.settings.poll_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
                Some(msg) = rx.recv() => match msg {
                    SchedulerMsg::ReplaceTasks(new_tasks) => {
                        self.replace_tasks(new_tasks);
                    }
                    SchedulerMsg::ReadSensors { reply } => {
                        let _ = reply.send(self.read_sensors().await);
                    }
                },
            }
        }

        info!("Scheduler stopped");
    }
}
