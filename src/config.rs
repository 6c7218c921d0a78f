use std::path::PathBuf;

use chrono::{NaiveTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::slot::{parse_time, TIME_FORMAT};

pub const APP_NAME: &str = "finadvisor";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DB_FILE_NAME: &str = "finadvisor.sqlite";

/// Data directory used when no Tauri handle is around (CLI tools, tests).
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

pub fn db_file_path() -> PathBuf {
    app_data_dir().join(DB_FILE_NAME)
}

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "finadvisor_lib=info,warn"
}

/// Settings used when generating a new advisor's availability window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingConfig {
    pub window_days: i64,
    #[serde(with = "crate::slot::hhmm")]
    pub day_start: NaiveTime,
    #[serde(with = "crate::slot::hhmm")]
    pub day_end: NaiveTime,
    pub slot_minutes: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        BookingConfig {
            window_days: 30,
            day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            day_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
            slot_minutes: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfigPayload {
    pub window_days: i64,
    pub day_start: String,
    pub day_end: String,
    pub slot_minutes: i64,
}

impl BookingConfig {
    /// Range checks shared by user input and stored rows.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=366).contains(&self.window_days) {
            return Err("window_days must be between 1 and 366".to_string());
        }
        if !(15..=240).contains(&self.slot_minutes) {
            return Err("slot_minutes must be between 15 and 240".to_string());
        }
        if self.day_start >= self.day_end {
            return Err("day_start must be before day_end".to_string());
        }
        if (self.day_end - self.day_start).num_minutes() < self.slot_minutes {
            return Err("day span must fit at least one slot".to_string());
        }
        Ok(())
    }
}

impl ConfigPayload {
    pub fn validate(&self) -> AppResult<BookingConfig> {
        let day_start = parse_time(&self.day_start)
            .map_err(|_| AppError::InvalidInput(format!("invalid day_start: {}", self.day_start)))?;
        let day_end = parse_time(&self.day_end)
            .map_err(|_| AppError::InvalidInput(format!("invalid day_end: {}", self.day_end)))?;
        let config = BookingConfig {
            window_days: self.window_days,
            day_start,
            day_end,
            slot_minutes: self.slot_minutes,
        };
        config.validate().map_err(AppError::InvalidInput)?;
        Ok(config)
    }
}

pub(crate) fn ensure_config_row(conn: &Connection) -> AppResult<()> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM config", [], |row| row.get(0))?;
    if existing == 0 {
        let defaults = BookingConfig::default();
        conn.execute(
            "INSERT INTO config (id, window_days, day_start, day_end, slot_minutes, created_ts_utc, updated_ts_utc)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                defaults.window_days,
                defaults.day_start.format(TIME_FORMAT).to_string(),
                defaults.day_end.format(TIME_FORMAT).to_string(),
                defaults.slot_minutes,
                Utc::now().timestamp_millis()
            ],
        )?;
    }
    Ok(())
}

pub fn fetch_config(conn: &Connection) -> AppResult<BookingConfig> {
    let (window_days, day_start, day_end, slot_minutes): (i64, String, String, i64) = conn
        .query_row(
            "SELECT window_days, day_start, day_end, slot_minutes FROM config WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

    let config = BookingConfig {
        window_days,
        day_start: parse_time(&day_start)?,
        day_end: parse_time(&day_end)?,
        slot_minutes,
    };
    config
        .validate()
        .map_err(|reason| AppError::schema("config", reason))?;
    Ok(config)
}

pub fn update_config(conn: &Connection, payload: &ConfigPayload) -> AppResult<BookingConfig> {
    let config = payload.validate()?;
    conn.execute(
        "UPDATE config SET window_days = ?1, day_start = ?2, day_end = ?3, slot_minutes = ?4, updated_ts_utc = ?5 WHERE id = 1",
        params![
            config.window_days,
            config.day_start.format(TIME_FORMAT).to_string(),
            config.day_end.format(TIME_FORMAT).to_string(),
            config.slot_minutes,
            Utc::now().timestamp_millis()
        ],
    )?;
    tracing::info!(
        window_days = config.window_days,
        slot_minutes = config.slot_minutes,
        "booking config updated"
    );

    fetch_config(conn)
}
