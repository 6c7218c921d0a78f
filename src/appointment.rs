use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::enums::AppointmentStatus;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appointment {
    pub id: i64,
    pub advisor_id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(with = "crate::slot::hhmm")]
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_ts_utc: i64,
}

impl AppointmentStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }

    /// Only a scheduled appointment can move, and only forward.
    pub fn transition_to(self, next: AppointmentStatus) -> AppResult<AppointmentStatus> {
        match (self, next) {
            (AppointmentStatus::Scheduled, AppointmentStatus::Completed)
            | (AppointmentStatus::Scheduled, AppointmentStatus::Cancelled) => Ok(next),
            _ => Err(AppError::transition(
                &format!("mark appointment {next}"),
                self.as_str(),
            )),
        }
    }
}
