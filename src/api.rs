//! Client side of the manager HTTP protocol
//!
//! The workers talk to the manager only through the [`ManagerApi`] trait so
//! tests can fake the far side without an HTTP fixture. [`HttpManagerApi`] is
//! the real implementation over reqwest.

use async_trait::async_trait;
use reqwest::StatusCode;
use sprout_shared::{protocol, CompletionNotice, SensorBatch, ScheduledTask, TaskListResponse};
use thiserror::Error;

/// Errors surfaced by manager requests
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection-level failure (refused, DNS, malformed body)
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The manager answered with a non-success status
    #[error("status code: {status} ({reason})")]
    Status { status: u16, reason: &'static str },
}

impl ApiError {
    fn from_status(status: StatusCode) -> Self {
        ApiError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("unknown"),
        }
    }
}

/// The three manager endpoints the client uses
#[async_trait]
pub trait ManagerApi: Send + Sync {
    /// `GET next_tasks/`
    async fn fetch_tasks(&self) -> Result<Vec<ScheduledTask>, ApiError>;

    /// `POST sensor_update/`
    async fn post_readings(&self, batch: &SensorBatch) -> Result<(), ApiError>;

    /// `POST notify_task/`
    async fn notify_completed(&self, notice: &CompletionNotice) -> Result<(), ApiError>;
}

/// Real manager client over HTTP
pub struct HttpManagerApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpManagerApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(status: StatusCode) -> Result<(), ApiError> {
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::from_status(status))
        }
    }
}

#[async_trait]
impl ManagerApi for HttpManagerApi {
    async fn fetch_tasks(&self) -> Result<Vec<ScheduledTask>, ApiError> {
        let response = self
            .client
            .get(self.url(protocol::NEXT_TASKS_PATH))
            .send()
            .await?;
        Self::check(response.status())?;
        let body: TaskListResponse = response.json().await?;
        Ok(body.scheduled_tasks)
    }

    async fn post_readings(&self, batch: &SensorBatch) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(protocol::SENSOR_UPDATE_PATH))
            .json(batch)
            .send()
            .await?;
        Self::check(response.status())
    }

    async fn notify_completed(&self, notice: &CompletionNotice) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(protocol::NOTIFY_TASK_PATH))
            .json(notice)
            .send()
            .await?;
        Self::check(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let api = HttpManagerApi::new("http://192.168.1.156:8000");
        assert_eq!(
            api.url(protocol::NEXT_TASKS_PATH),
            "http://192.168.1.156:8000/next_tasks/"
        );
    }

    #[test]
    fn status_errors_carry_code_and_reason() {
        let err = ApiError::from_status(StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "status code: 403 (Forbidden)");
    }
}
