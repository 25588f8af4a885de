//! Sprout Shared Wire Types
//!
//! This crate provides the JSON bodies exchanged between the Raspberry Pi
//! client and the manager service, plus timestamp helpers and the protocol
//! constants both sides agree on.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in whole seconds since Unix epoch
pub fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Protocol parameters shared by client and manager
pub mod protocol {
    /// Minimum amount of time between scheduler polls (seconds)
    pub const EVENT_EXECUTION_PERIOD_SECS: u64 = 30;

    /// Amount of time between GET/POST update cycles (seconds)
    pub const BATCH_UPDATE_PERIOD_SECS: u64 = 30 * 60;

    /// The longest the client can be silent for and still be considered OK (seconds)
    pub const CLIENT_SILENCE_PERIOD_SECS: u64 = 60 * 60;

    /// Path serving the task list (trailing slash is part of the contract)
    pub const NEXT_TASKS_PATH: &str = "next_tasks/";

    /// Path accepting sensor batches
    pub const SENSOR_UPDATE_PATH: &str = "sensor_update/";

    /// Path accepting task completion notices
    pub const NOTIFY_TASK_PATH: &str = "notify_task/";
}

/// A task scheduled by the manager for the client to execute.
///
/// `next_time` travels as fractional Unix seconds; the manager stores
/// sub-second precision and the client only ever compares it to the wall
/// clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub task_id: i64,
    pub command: String,
    pub next_time: f64,
}

/// One sensor sample, keyed by the sensor's manager-side name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_name: String,
    pub value: f64,
    pub time: u64,
}

impl SensorReading {
    /// Create a reading with the value clamped to [0, 1] and rounded to
    /// three decimals, stamped with whole Unix seconds.
    pub fn new(sensor_name: impl Into<String>, value: f64, time: u64) -> Self {
        let bounded = value.clamp(0.0, 1.0);
        Self {
            sensor_name: sensor_name.into(),
            value: (bounded * 1000.0).round() / 1000.0,
            time,
        }
    }
}

/// Response body of `GET next_tasks/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub scheduled_tasks: Vec<ScheduledTask>,
}

/// Request body of `POST sensor_update/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorBatch {
    pub password: String,
    pub sensors: Vec<SensorReading>,
}

/// Request body of `POST notify_task/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub password: String,
    pub task_id: i64,
    pub completion_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduled_task_wire_field_names() {
        let json = r#"{"task_id": 3, "command": "pump 50ml", "next_time": 1595000000.5}"#;
        let task: ScheduledTask = serde_json::from_str(json).expect("task parses");
        assert_eq!(task.task_id, 3);
        assert_eq!(task.command, "pump 50ml");
        assert_eq!(task.next_time, 1595000000.5);
    }

    #[test]
    fn task_list_round_trips_through_envelope() {
        let response = TaskListResponse {
            scheduled_tasks: vec![ScheduledTask {
                task_id: 1,
                command: "do nothing".into(),
                next_time: 100.0,
            }],
        };
        let json = serde_json::to_value(&response).expect("serializes");
        assert!(json.get("scheduled_tasks").is_some());
        assert_eq!(json["scheduled_tasks"][0]["task_id"], 1);
    }

    #[test]
    fn sensor_reading_is_bounded_and_rounded() {
        let reading = SensorReading::new("soil moisture sensor", 0.123456, 42);
        assert_eq!(reading.value, 0.123);

        let high = SensorReading::new("soil moisture sensor", 1.7, 42);
        assert_eq!(high.value, 1.0);

        let low = SensorReading::new("soil moisture sensor", -0.2, 42);
        assert_eq!(low.value, 0.0);
    }

    #[test]
    fn sensor_batch_wire_shape() {
        let batch = SensorBatch {
            password: "password".into(),
            sensors: vec![SensorReading::new("light sensor", 0.5, 7)],
        };
        let json = serde_json::to_value(&batch).expect("serializes");
        assert_eq!(json["password"], "password");
        assert_eq!(json["sensors"][0]["sensor_name"], "light sensor");
        assert_eq!(json["sensors"][0]["time"], 7);
    }
}
