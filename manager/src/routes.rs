//! HTTP handlers
//!
//! Three client-facing endpoints (`next_tasks/`, `sensor_update/`,
//! `notify_task/`) plus read endpoints for operators. Client POSTs carry the
//! shared upload password: wrong password is a 403, any store failure is an
//! opaque 500.

use crate::store::{Store, StoreError};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sprout_shared::{now_ts, protocol, CompletionNotice, SensorBatch};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// How many completion events the history endpoint returns
const TASK_HISTORY_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub password: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/tasks/", get(task_list))
        .route("/tasks/{task_id}/", get(task_details))
        .route("/sensors/", get(sensor_list))
        .route("/sensors/{sensor_id}/", get(sensor_details))
        .route("/sensors/{sensor_id}/data/", get(sensor_data))
        .route("/plants/", get(plant_list))
        .route("/plants/{plant_id}/", get(plant_details))
        .route("/task_history/", get(task_history))
        .route("/next_tasks/", get(next_tasks))
        .route("/sensor_update/", post(sensor_update))
        .route("/notify_task/", post(notify_task))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn internal_error(e: StoreError) -> Response {
    error!("Store error: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Client health summary: when the client last reported, and whether that
/// is recent enough to call it OK.
async fn home(State(state): State<AppState>) -> Response {
    match state.store.latest_reading_time() {
        Ok(last_update_time) => {
            let client_ok = last_update_time.is_some_and(|t| {
                now_ts().saturating_sub(t.max(0) as u64) < protocol::CLIENT_SILENCE_PERIOD_SECS
            });
            Json(serde_json::json!({
                "last_update_time": last_update_time,
                "client_ok": client_ok,
            }))
            .into_response()
        }
        Err(e) => internal_error(e),
    }
}

async fn task_list(State(state): State<AppState>) -> Response {
    match state.store.tasks_sorted() {
        Ok(tasks) => Json(serde_json::json!({ "tasks": tasks })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn task_details(State(state): State<AppState>, Path(task_id): Path<i64>) -> Response {
    match state.store.task(task_id) {
        Ok(Some(task)) => Json(serde_json::json!({ "task": task })).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error(e),
    }
}

async fn sensor_list(State(state): State<AppState>) -> Response {
    match state.store.sensors() {
        Ok(sensors) => Json(serde_json::json!({ "sensors": sensors })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn sensor_details(State(state): State<AppState>, Path(sensor_id): Path<i64>) -> Response {
    match state.store.sensor(sensor_id) {
        Ok(Some(sensor)) => Json(serde_json::json!({ "sensor": sensor })).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error(e),
    }
}

/// Chart series for one sensor: `{"data": [{x, y}]}` sorted by time.
async fn sensor_data(State(state): State<AppState>, Path(sensor_id): Path<i64>) -> Response {
    match state.store.sensor_data(sensor_id) {
        Ok(data) => Json(serde_json::json!({ "data": data })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn plant_list(State(state): State<AppState>) -> Response {
    match state.store.plants() {
        Ok(plants) => Json(serde_json::json!({ "plants": plants })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn plant_details(State(state): State<AppState>, Path(plant_id): Path<i64>) -> Response {
    match state.store.plant(plant_id) {
        Ok(Some(plant)) => Json(serde_json::json!({ "plant": plant })).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error(e),
    }
}

async fn task_history(State(state): State<AppState>) -> Response {
    match state.store.task_history(TASK_HISTORY_LIMIT) {
        Ok(history) => Json(serde_json::json!({ "history": history })).into_response(),
        Err(e) => internal_error(e),
    }
}

/// The task list served to the client: every enabled task.
async fn next_tasks(State(state): State<AppState>) -> Response {
    match state.store.enabled_tasks() {
        Ok(tasks) => {
            let scheduled_tasks: Vec<serde_json::Value> = tasks
                .iter()
                .map(|task| {
                    serde_json::json!({
                        "task_id": task.id,
                        "command": task.command,
                        "next_time": task.next_scheduled_time,
                    })
                })
                .collect();
            Json(serde_json::json!({ "scheduled_tasks": scheduled_tasks })).into_response()
        }
        Err(e) => internal_error(e),
    }
}

async fn sensor_update(State(state): State<AppState>, Json(batch): Json<SensorBatch>) -> Response {
    if batch.password != state.password {
        return StatusCode::FORBIDDEN.into_response();
    }

    match state.store.insert_readings(&batch.sensors) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => internal_error(e),
    }
}

async fn notify_task(
    State(state): State<AppState>,
    Json(notice): Json<CompletionNotice>,
) -> Response {
    if notice.password != state.password {
        return StatusCode::FORBIDDEN.into_response();
    }

    match state
        .store
        .complete_task(notice.task_id, notice.completion_time as i64)
    {
        Ok(name) => {
            info!(
                "Task #{} ({:?}) completed at {}",
                notice.task_id, name, notice.completion_time
            );
            StatusCode::OK.into_response()
        }
        Err(e) => internal_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprout_shared::SensorReading;

    fn state() -> AppState {
        AppState {
            store: Arc::new(Store::open_in_memory().expect("store opens")),
            password: "password".into(),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        serde_json::from_slice(&bytes).expect("body is JSON")
    }

    fn batch(password: &str, state: &AppState) -> SensorBatch {
        state
            .store
            .create_sensor("soil moisture sensor")
            .expect("sensor");
        SensorBatch {
            password: password.into(),
            sensors: vec![SensorReading::new("soil moisture sensor", 0.5, 10)],
        }
    }

    #[tokio::test]
    async fn wrong_password_is_forbidden_and_persists_nothing() {
        let state = state();
        let batch = batch("wrong", &state);

        let response = sensor_update(State(state.clone()), Json(batch)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            state.store.latest_reading_time().expect("query"),
            None
        );
    }

    #[tokio::test]
    async fn correct_password_persists_the_batch() {
        let state = state();
        let batch = batch("password", &state);

        let response = sensor_update(State(state.clone()), Json(batch)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            state.store.latest_reading_time().expect("query"),
            Some(10)
        );
    }

    #[tokio::test]
    async fn unknown_sensor_in_batch_is_an_opaque_500() {
        let state = state();
        let batch = SensorBatch {
            password: "password".into(),
            sensors: vec![SensorReading::new("phantom sensor", 0.5, 10)],
        };

        let response = sensor_update(State(state), Json(batch)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn notify_for_missing_task_is_a_500() {
        let state = state();
        let notice = CompletionNotice {
            password: "password".into(),
            task_id: 42,
            completion_time: 100,
        };

        let response = notify_task(State(state), Json(notice)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn next_tasks_serves_only_enabled_tasks_in_wire_shape() {
        let state = state();
        let kept = state
            .store
            .create_task("water Roberto", "pump 50ml to Roberto", 100.5)
            .expect("task");
        let disabled = state
            .store
            .create_task("rest", "do nothing", 50.0)
            .expect("task");
        state.store.set_task_enabled(disabled, false).expect("disable");

        let body = body_json(next_tasks(State(state)).await).await;
        let tasks = body["scheduled_tasks"].as_array().expect("array");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["task_id"], kept);
        assert_eq!(tasks[0]["command"], "pump 50ml to Roberto");
        assert_eq!(tasks[0]["next_time"], 100.5);
    }

    #[tokio::test]
    async fn home_reports_stale_client_as_not_ok() {
        let state = state();
        let body = body_json(home(State(state.clone())).await).await;
        assert_eq!(body["client_ok"], false);
        assert_eq!(body["last_update_time"], serde_json::Value::Null);

        // a fresh reading flips client_ok
        state.store.create_sensor("light sensor").expect("sensor");
        state
            .store
            .insert_readings(&[SensorReading::new("light sensor", 0.5, now_ts())])
            .expect("reading persists");
        let body = body_json(home(State(state)).await).await;
        assert_eq!(body["client_ok"], true);
    }

    #[tokio::test]
    async fn missing_task_detail_is_a_404() {
        let state = state();
        let response = task_details(State(state), Path(7)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
