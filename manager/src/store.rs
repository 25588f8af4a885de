//! Manager relational store
//!
//! One SQLite connection behind a mutex; the schema is bootstrapped at open.
//! Tables mirror the domain: tasks, sensors, readings, plants, the
//! plant/sensor and plant/task junctions, and a task completion history.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sprout_shared::SensorReading;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unknown sensor: {0}")]
    UnknownSensor(String),

    #[error("no such task: {0}")]
    NoSuchTask(i64),

    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRow {
    pub id: i64,
    pub name: String,
    pub command: String,
    pub next_scheduled_time: f64,
    pub last_completed_time: Option<i64>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlantRow {
    pub id: i64,
    pub name: String,
}

/// A plant with the sensors and tasks linked to it
#[derive(Debug, Clone, Serialize)]
pub struct PlantDetail {
    pub id: i64,
    pub name: String,
    pub sensor_ids: Vec<i64>,
    pub task_ids: Vec<i64>,
}

/// One chart point for a sensor's reading series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub id: i64,
    pub task_id: i64,
    pub task_name: String,
    pub completed_at: i64,
}

/// First-run contents, read from the manager config
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub sensors: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<SeedTask>,
    #[serde(default)]
    pub plants: Vec<SeedPlant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedTask {
    pub name: String,
    pub command: String,
    pub next_time: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPlant {
    pub name: String,
    #[serde(default)]
    pub sensors: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the manager database.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.migrate()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                command TEXT NOT NULL DEFAULT '',
                next_scheduled_time REAL NOT NULL,
                last_completed_time INTEGER,
                enabled INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS sensors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sensor_id INTEGER NOT NULL REFERENCES sensors(id),
                value REAL NOT NULL,
                time INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS plants (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS plant_sensors (
                plant_id INTEGER NOT NULL REFERENCES plants(id),
                sensor_id INTEGER NOT NULL REFERENCES sensors(id),
                PRIMARY KEY (plant_id, sensor_id)
            );

            CREATE TABLE IF NOT EXISTS plant_tasks (
                plant_id INTEGER NOT NULL REFERENCES plants(id),
                task_id INTEGER NOT NULL REFERENCES tasks(id),
                PRIMARY KEY (plant_id, task_id)
            );

            CREATE TABLE IF NOT EXISTS task_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                task_name TEXT NOT NULL,
                completed_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Populate an empty database from the config's seed block. A database
    /// that already has any sensor, task or plant is left alone.
    pub fn seed(&self, seed: &SeedConfig) -> Result<bool, StoreError> {
        {
            let conn = self.lock()?;
            let count: i64 = conn.query_row(
                "SELECT (SELECT COUNT(*) FROM sensors)
                      + (SELECT COUNT(*) FROM tasks)
                      + (SELECT COUNT(*) FROM plants)",
                [],
                |r| r.get(0),
            )?;
            if count > 0 {
                return Ok(false);
            }
        }

        for name in &seed.sensors {
            self.create_sensor(name)?;
        }
        for task in &seed.tasks {
            self.create_task(&task.name, &task.command, task.next_time)?;
        }
        for plant in &seed.plants {
            let plant_id = self.create_plant(&plant.name)?;
            let conn = self.lock()?;
            for sensor_name in &plant.sensors {
                conn.execute(
                    "INSERT INTO plant_sensors (plant_id, sensor_id)
                     SELECT ?1, id FROM sensors WHERE name = ?2",
                    params![plant_id, sensor_name],
                )?;
            }
            for task_name in &plant.tasks {
                conn.execute(
                    "INSERT INTO plant_tasks (plant_id, task_id)
                     SELECT ?1, id FROM tasks WHERE name = ?2",
                    params![plant_id, task_name],
                )?;
            }
        }
        Ok(true)
    }

    pub fn create_sensor(&self, name: &str) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute("INSERT INTO sensors (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn create_task(
        &self,
        name: &str,
        command: &str,
        next_time: f64,
    ) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (name, command, next_scheduled_time) VALUES (?1, ?2, ?3)",
            params![name, command, next_time],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn create_plant(&self, name: &str) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute("INSERT INTO plants (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_task_enabled(&self, task_id: i64, enabled: bool) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tasks SET enabled = ?2 WHERE id = ?1",
            params![task_id, enabled],
        )?;
        if changed == 0 {
            return Err(StoreError::NoSuchTask(task_id));
        }
        Ok(())
    }

    fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
        Ok(TaskRow {
            id: row.get(0)?,
            name: row.get(1)?,
            command: row.get(2)?,
            next_scheduled_time: row.get(3)?,
            last_completed_time: row.get(4)?,
            enabled: row.get(5)?,
        })
    }

    /// Tasks the client should run, i.e. every enabled task.
    pub fn enabled_tasks(&self) -> Result<Vec<TaskRow>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, command, next_scheduled_time, last_completed_time, enabled
             FROM tasks WHERE enabled = 1",
        )?;
        let tasks = stmt
            .query_map([], Self::task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// All tasks, soonest first.
    pub fn tasks_sorted(&self) -> Result<Vec<TaskRow>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, command, next_scheduled_time, last_completed_time, enabled
             FROM tasks ORDER BY next_scheduled_time",
        )?;
        let tasks = stmt
            .query_map([], Self::task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn task(&self, task_id: i64) -> Result<Option<TaskRow>, StoreError> {
        let conn = self.lock()?;
        let task = conn
            .query_row(
                "SELECT id, name, command, next_scheduled_time, last_completed_time, enabled
                 FROM tasks WHERE id = ?1",
                params![task_id],
                Self::task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn sensors(&self) -> Result<Vec<SensorRow>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM sensors ORDER BY name")?;
        let sensors = stmt
            .query_map([], |row| {
                Ok(SensorRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sensors)
    }

    pub fn sensor(&self, sensor_id: i64) -> Result<Option<SensorRow>, StoreError> {
        let conn = self.lock()?;
        let sensor = conn
            .query_row(
                "SELECT id, name FROM sensors WHERE id = ?1",
                params![sensor_id],
                |row| {
                    Ok(SensorRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(sensor)
    }

    /// Reading series for one sensor, time ascending.
    pub fn sensor_data(&self, sensor_id: i64) -> Result<Vec<DataPoint>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT time, value FROM readings WHERE sensor_id = ?1 ORDER BY time",
        )?;
        let points = stmt
            .query_map(params![sensor_id], |row| {
                Ok(DataPoint {
                    x: row.get::<_, i64>(0)? as f64,
                    y: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(points)
    }

    pub fn plants(&self) -> Result<Vec<PlantRow>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM plants ORDER BY name")?;
        let plants = stmt
            .query_map([], |row| {
                Ok(PlantRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plants)
    }

    pub fn plant(&self, plant_id: i64) -> Result<Option<PlantDetail>, StoreError> {
        let conn = self.lock()?;
        let plant = conn
            .query_row(
                "SELECT id, name FROM plants WHERE id = ?1",
                params![plant_id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((id, name)) = plant else {
            return Ok(None);
        };

        let mut stmt =
            conn.prepare("SELECT sensor_id FROM plant_sensors WHERE plant_id = ?1")?;
        let sensor_ids = stmt
            .query_map(params![plant_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        let mut stmt = conn.prepare("SELECT task_id FROM plant_tasks WHERE plant_id = ?1")?;
        let task_ids = stmt
            .query_map(params![plant_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(Some(PlantDetail {
            id,
            name,
            sensor_ids,
            task_ids,
        }))
    }

    /// Time of the newest reading across all sensors, if any.
    pub fn latest_reading_time(&self) -> Result<Option<i64>, StoreError> {
        let conn = self.lock()?;
        let time = conn.query_row("SELECT MAX(time) FROM readings", [], |row| row.get(0))?;
        Ok(time)
    }

    /// Persist a batch of readings keyed by sensor name. The whole batch is
    /// one transaction: an unknown sensor anywhere means nothing from the
    /// batch is observed as persisted.
    pub fn insert_readings(&self, readings: &[SensorReading]) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for reading in readings {
            let sensor_id: Option<i64> = tx
                .query_row(
                    "SELECT id FROM sensors WHERE name = ?1",
                    params![reading.sensor_name],
                    |row| row.get(0),
                )
                .optional()?;
            let sensor_id =
                sensor_id.ok_or_else(|| StoreError::UnknownSensor(reading.sensor_name.clone()))?;
            tx.execute(
                "INSERT INTO readings (sensor_id, value, time) VALUES (?1, ?2, ?3)",
                params![sensor_id, reading.value, reading.time as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Record a completion: update the task's last-completed timestamp and
    /// append to the history. Returns the task's name.
    pub fn complete_task(&self, task_id: i64, completion_time: i64) -> Result<String, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let name: Option<String> = tx
            .query_row(
                "SELECT name FROM tasks WHERE id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()?;
        let name = name.ok_or(StoreError::NoSuchTask(task_id))?;

        tx.execute(
            "UPDATE tasks SET last_completed_time = ?2 WHERE id = ?1",
            params![task_id, completion_time],
        )?;
        tx.execute(
            "INSERT INTO task_history (task_id, task_name, completed_at) VALUES (?1, ?2, ?3)",
            params![task_id, name, completion_time],
        )?;
        tx.commit()?;
        Ok(name)
    }

    /// Recent completion events, newest first.
    pub fn task_history(&self, limit: u32) -> Result<Vec<HistoryRow>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, task_id, task_name, completed_at FROM task_history
             ORDER BY completed_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(HistoryRow {
                    id: row.get(0)?,
                    task_id: row.get(1)?,
                    task_name: row.get(2)?,
                    completed_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().expect("in-memory store opens")
    }

    fn reading(name: &str, value: f64, time: u64) -> SensorReading {
        SensorReading::new(name, value, time)
    }

    #[test]
    fn unknown_sensor_rolls_back_the_whole_batch() {
        let store = store();
        store.create_sensor("soil moisture sensor").expect("sensor");

        let err = store
            .insert_readings(&[
                reading("soil moisture sensor", 0.5, 10),
                reading("phantom sensor", 0.5, 10),
            ])
            .expect_err("unknown sensor fails the batch");
        assert!(matches!(err, StoreError::UnknownSensor(name) if name == "phantom sensor"));

        // the known sensor's reading must not have been persisted either
        assert_eq!(store.latest_reading_time().expect("query"), None);
    }

    #[test]
    fn readings_persist_and_sort_by_time() {
        let store = store();
        let sensor_id = store.create_sensor("soil moisture sensor").expect("sensor");
        store
            .insert_readings(&[
                reading("soil moisture sensor", 0.6, 20),
                reading("soil moisture sensor", 0.4, 10),
            ])
            .expect("batch persists");

        let data = store.sensor_data(sensor_id).expect("series");
        assert_eq!(
            data,
            vec![DataPoint { x: 10.0, y: 0.4 }, DataPoint { x: 20.0, y: 0.6 }]
        );
        assert_eq!(store.latest_reading_time().expect("query"), Some(20));
    }

    #[test]
    fn completing_a_task_updates_it_and_appends_history() {
        let store = store();
        let task_id = store
            .create_task("water Roberto", "pump 50ml to Roberto", 100.0)
            .expect("task");

        let name = store.complete_task(task_id, 123).expect("completes");
        assert_eq!(name, "water Roberto");

        let task = store.task(task_id).expect("query").expect("exists");
        assert_eq!(task.last_completed_time, Some(123));

        let history = store.task_history(10).expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].task_id, task_id);
        assert_eq!(history[0].completed_at, 123);
    }

    #[test]
    fn completing_a_missing_task_fails() {
        let store = store();
        let err = store.complete_task(99, 123).expect_err("no such task");
        assert!(matches!(err, StoreError::NoSuchTask(99)));
    }

    #[test]
    fn enabled_filter_hides_disabled_tasks() {
        let store = store();
        let keep = store.create_task("keep", "do nothing", 1.0).expect("task");
        let disabled = store.create_task("drop", "do nothing", 2.0).expect("task");
        store.set_task_enabled(disabled, false).expect("disable");

        let tasks = store.enabled_tasks().expect("query");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, keep);
    }

    #[test]
    fn seed_populates_only_an_empty_database() {
        let store = store();
        let seed = SeedConfig {
            sensors: vec!["soil moisture sensor".into()],
            tasks: vec![SeedTask {
                name: "water Roberto".into(),
                command: "pump 50ml to Roberto".into(),
                next_time: 100.0,
            }],
            plants: vec![SeedPlant {
                name: "Roberto".into(),
                sensors: vec!["soil moisture sensor".into()],
                tasks: vec!["water Roberto".into()],
            }],
        };

        assert!(store.seed(&seed).expect("first seed runs"));
        assert!(!store.seed(&seed).expect("second seed is a no-op"));

        let plants = store.plants().expect("plants");
        assert_eq!(plants.len(), 1);
        let detail = store
            .plant(plants[0].id)
            .expect("query")
            .expect("plant exists");
        assert_eq!(detail.sensor_ids.len(), 1);
        assert_eq!(detail.task_ids.len(), 1);
    }
}
