use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("no open slot on {date}")]
    NoAvailability { date: NaiveDate },

    #[error("slot {date} {} is already booked", .time.format("%H:%M"))]
    SlotAlreadyBooked { date: NaiveDate, time: NaiveTime },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored value for {field} does not match schema: {value}")]
    SchemaMismatch { field: String, value: String },

    #[error("cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    pub(crate) fn schema(field: &str, value: impl Into<String>) -> Self {
        AppError::SchemaMismatch {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub(crate) fn transition(action: &str, state: &str) -> Self {
        AppError::InvalidTransition {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Everything except corrupted stored data can be fixed by retrying or
    /// picking something else.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AppError::SchemaMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_already_booked_message_uses_short_time() {
        let err = AppError::SlotAlreadyBooked {
            date: NaiveDate::from_ymd_opt(2025, 5, 12).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        };
        assert_eq!(err.to_string(), "slot 2025-05-12 09:00 is already booked");
    }

    #[test]
    fn schema_mismatch_is_not_recoverable() {
        assert!(!AppError::schema("cadence", "hourly").is_recoverable());
        assert!(AppError::Persistence("disk full".into()).is_recoverable());
        assert!(AppError::transition("submit", "selecting_date").is_recoverable());
    }
}
