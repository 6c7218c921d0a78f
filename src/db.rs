use std::{fs, path::Path};

use rusqlite::Connection;

use crate::config;
use crate::error::{AppError, AppResult};

#[cfg(feature = "desktop")]
use std::path::PathBuf;
#[cfg(feature = "desktop")]
use tauri::{AppHandle, Manager};

/// Falls back to the platform data dir when Tauri cannot resolve its own.
#[cfg(feature = "desktop")]
pub fn db_path(app: &AppHandle) -> PathBuf {
    match app.path().app_data_dir() {
        Ok(data_dir) => data_dir.join(config::DB_FILE_NAME),
        Err(err) => {
            tracing::warn!(error = %err, "app data dir unavailable, using default");
            config::db_file_path()
        }
    }
}

#[cfg(feature = "desktop")]
pub fn open_app_connection(app: &AppHandle) -> AppResult<Connection> {
    open_connection(&db_path(app))
}

pub fn open_connection(path: &Path) -> AppResult<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| AppError::Persistence(err.to_string()))?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Open (creating if needed) the database at `path` with the schema in place.
pub fn open_database(path: &Path) -> AppResult<Connection> {
    let conn = open_connection(path)?;
    init_db(&conn)?;
    Ok(conn)
}

pub fn open_memory_database() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    init_db(&conn)?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS advisors (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          specialty TEXT,
          created_ts_utc INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS slots (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          advisor_id INTEGER NOT NULL,
          date_local TEXT NOT NULL,
          start_time TEXT NOT NULL,
          end_time TEXT NOT NULL,
          booked INTEGER NOT NULL DEFAULT 0,
          FOREIGN KEY(advisor_id) REFERENCES advisors(id) ON DELETE CASCADE,
          UNIQUE(advisor_id, date_local, start_time)
        );
        CREATE TABLE IF NOT EXISTS appointments (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          advisor_id INTEGER NOT NULL,
          user_id TEXT NOT NULL,
          date_local TEXT NOT NULL,
          time TEXT NOT NULL,
          status TEXT NOT NULL,
          notes TEXT,
          created_ts_utc INTEGER NOT NULL,
          updated_ts_utc INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_appointments_user ON appointments(user_id);
        CREATE TABLE IF NOT EXISTS streak_events (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          user_id TEXT NOT NULL,
          cadence TEXT NOT NULL,
          ts_utc INTEGER NOT NULL,
          date_local TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_streak_events_user ON streak_events(user_id, cadence);
        CREATE TABLE IF NOT EXISTS config (
          id INTEGER PRIMARY KEY CHECK (id = 1),
          window_days INTEGER NOT NULL,
          day_start TEXT NOT NULL,
          day_end TEXT NOT NULL,
          slot_minutes INTEGER NOT NULL,
          created_ts_utc INTEGER NOT NULL,
          updated_ts_utc INTEGER NOT NULL
        );",
    )?;

    config::ensure_config_row(conn)?;
    tracing::debug!("database schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|row| row.unwrap())
            .collect();
        names
    }

    #[test]
    fn creates_all_tables() {
        let conn = open_memory_database().expect("open");
        assert_eq!(
            table_names(&conn),
            vec!["advisors", "appointments", "config", "slots", "streak_events"]
        );
    }

    #[test]
    fn init_is_idempotent() {
        let conn = open_memory_database().expect("open");
        init_db(&conn).expect("second init");
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM config", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn foreign_keys_enabled() {
        let conn = open_memory_database().expect("open");
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn open_database_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("finadvisor-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join(config::DB_FILE_NAME);
        let conn = open_database(&path).expect("open file db");
        drop(conn);
        assert!(path.exists());
        fs::remove_dir_all(&dir).ok();
    }
}
