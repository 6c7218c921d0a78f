use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::appointment::Appointment;
use crate::config::BookingConfig;
use crate::db;
use crate::enums::{AppointmentStatus, Cadence};
use crate::error::{AppError, AppResult};
use crate::slot::{generate_window, parse_date, parse_time, DayAvailability, Slot, DATE_FORMAT, TIME_FORMAT};
use crate::streak::StreakEvent;

/// Persistence seam used by the booking flow and streak tracking.
pub trait AdvisorStore {
    fn fetch_availability(&self, advisor_id: i64) -> AppResult<Vec<DayAvailability>>;

    /// Marks the slot booked and records the appointment in one step.
    /// Fails with `SlotAlreadyBooked` if someone else got there first.
    fn commit_booking(
        &self,
        user_id: &str,
        advisor_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        notes: Option<&str>,
    ) -> AppResult<Appointment>;

    /// Returns the id of the stored event.
    fn append_streak_event(
        &self,
        user_id: &str,
        cadence: Cadence,
        ts_utc: i64,
        date_local: NaiveDate,
    ) -> AppResult<i64>;

    /// Oldest first.
    fn load_streak_log(&self, user_id: &str, cadence: Cadence) -> AppResult<Vec<StreakEvent>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisor {
    pub id: i64,
    pub name: String,
    pub specialty: Option<String>,
    pub created_ts_utc: i64,
}

pub struct SqliteStore {
    conn: Connection,
}

fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn fmt_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

struct AppointmentRow {
    id: i64,
    advisor_id: i64,
    user_id: String,
    date_local: String,
    time: String,
    status: String,
    notes: Option<String>,
    created_ts_utc: i64,
}

impl AppointmentRow {
    const COLUMNS: &'static str =
        "id, advisor_id, user_id, date_local, time, status, notes, created_ts_utc";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(AppointmentRow {
            id: row.get(0)?,
            advisor_id: row.get(1)?,
            user_id: row.get(2)?,
            date_local: row.get(3)?,
            time: row.get(4)?,
            status: row.get(5)?,
            notes: row.get(6)?,
            created_ts_utc: row.get(7)?,
        })
    }

    fn into_appointment(self) -> AppResult<Appointment> {
        Ok(Appointment {
            id: self.id,
            advisor_id: self.advisor_id,
            user_id: self.user_id,
            date: parse_date(&self.date_local)?,
            time: parse_time(&self.time)?,
            status: self.status.parse()?,
            notes: self.notes,
            created_ts_utc: self.created_ts_utc,
        })
    }
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        SqliteStore { conn }
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Ok(SqliteStore::new(db::open_memory_database()?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates the advisor and generates its availability window once.
    pub fn create_advisor(
        &self,
        name: &str,
        specialty: Option<&str>,
        created_on: NaiveDate,
        booking: &BookingConfig,
    ) -> AppResult<Advisor> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("advisor name is required".to_string()));
        }
        booking.validate().map_err(AppError::InvalidInput)?;
        let created_ts_utc = Utc::now().timestamp_millis();
        let window = generate_window(created_on, booking);

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO advisors (name, specialty, created_ts_utc) VALUES (?1, ?2, ?3)",
            params![name, specialty, created_ts_utc],
        )?;
        let id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO slots (advisor_id, date_local, start_time, end_time, booked)
                 VALUES (?1, ?2, ?3, ?4, 0)",
            )?;
            for day in &window {
                for slot in day.slots() {
                    stmt.execute(params![
                        id,
                        fmt_date(day.date),
                        fmt_time(slot.start),
                        fmt_time(slot.end)
                    ])?;
                }
            }
        }
        tx.commit()?;

        tracing::info!(advisor_id = id, days = window.len(), "advisor created");
        Ok(Advisor {
            id,
            name: name.to_string(),
            specialty: specialty.map(str::to_string),
            created_ts_utc,
        })
    }

    pub fn list_advisors(&self) -> AppResult<Vec<Advisor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, specialty, created_ts_utc FROM advisors ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Advisor {
                id: row.get(0)?,
                name: row.get(1)?,
                specialty: row.get(2)?,
                created_ts_utc: row.get(3)?,
            })
        })?;

        let mut advisors = Vec::new();
        for row in rows {
            advisors.push(row?);
        }
        Ok(advisors)
    }

    fn advisor_exists(&self, advisor_id: i64) -> AppResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM advisors WHERE id = ?1", [advisor_id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_appointment(&self, appointment_id: i64) -> AppResult<Appointment> {
        let sql = format!(
            "SELECT {} FROM appointments WHERE id = ?1",
            AppointmentRow::COLUMNS
        );
        self.conn
            .query_row(&sql, [appointment_id], AppointmentRow::from_row)
            .optional()?
            .ok_or_else(|| AppError::NotFound {
                entity: "appointment".to_string(),
                id: appointment_id.to_string(),
            })?
            .into_appointment()
    }

    pub fn list_appointments(&self, user_id: &str) -> AppResult<Vec<Appointment>> {
        let sql = format!(
            "SELECT {} FROM appointments WHERE user_id = ?1 ORDER BY date_local, time",
            AppointmentRow::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([user_id], AppointmentRow::from_row)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.into_appointment()?);
        }
        Ok(appointments)
    }

    /// Status changes only; the slot stays booked whatever happens.
    pub fn update_appointment_status(
        &self,
        appointment_id: i64,
        next: AppointmentStatus,
    ) -> AppResult<Appointment> {
        let current = self.get_appointment(appointment_id)?;
        let status = current.status.transition_to(next)?;
        self.conn.execute(
            "UPDATE appointments SET status = ?1, updated_ts_utc = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().timestamp_millis(), appointment_id],
        )?;
        tracing::info!(appointment_id, status = status.as_str(), "appointment status changed");

        self.get_appointment(appointment_id)
    }
}

impl AdvisorStore for SqliteStore {
    fn fetch_availability(&self, advisor_id: i64) -> AppResult<Vec<DayAvailability>> {
        if !self.advisor_exists(advisor_id)? {
            return Err(AppError::NotFound {
                entity: "advisor".to_string(),
                id: advisor_id.to_string(),
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT date_local, start_time, end_time, booked FROM slots
             WHERE advisor_id = ?1 ORDER BY date_local, start_time",
        )?;
        let rows = stmt.query_map([advisor_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut grouped: Vec<(NaiveDate, Vec<Slot>)> = Vec::new();
        for row in rows {
            let (date_local, start, end, booked) = row?;
            let date = parse_date(&date_local)?;
            let start = parse_time(&start)?;
            let end = parse_time(&end)?;
            let slot = Slot::restore(start, end, booked != 0)
                .map_err(|_| AppError::schema("slot", format!("{date_local} {start}-{end}")))?;
            match grouped.last_mut() {
                Some((last, slots)) if *last == date => slots.push(slot),
                _ => grouped.push((date, vec![slot])),
            }
        }

        grouped
            .into_iter()
            .map(|(date, slots)| {
                DayAvailability::new(date, slots)
                    .map_err(|err| AppError::schema("slots", err.to_string()))
            })
            .collect()
    }

    fn commit_booking(
        &self,
        user_id: &str,
        advisor_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        notes: Option<&str>,
    ) -> AppResult<Appointment> {
        let date_local = fmt_date(date);
        let time_text = fmt_time(time);
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        let now = Utc::now().timestamp_millis();

        let tx = self.conn.unchecked_transaction()?;
        let claimed = tx.execute(
            "UPDATE slots SET booked = 1
             WHERE advisor_id = ?1 AND date_local = ?2 AND start_time = ?3 AND booked = 0",
            params![advisor_id, date_local, time_text],
        )?;
        if claimed == 0 {
            let exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM slots WHERE advisor_id = ?1 AND date_local = ?2 AND start_time = ?3",
                params![advisor_id, date_local, time_text],
                |row| row.get(0),
            )?;
            return Err(if exists > 0 {
                AppError::SlotAlreadyBooked { date, time }
            } else {
                AppError::NoAvailability { date }
            });
        }

        tx.execute(
            "INSERT INTO appointments (advisor_id, user_id, date_local, time, status, notes, created_ts_utc, updated_ts_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                advisor_id,
                user_id,
                date_local,
                time_text,
                AppointmentStatus::Scheduled.as_str(),
                notes,
                now
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(appointment_id = id, advisor_id, %date, "booking committed");
        Ok(Appointment {
            id,
            advisor_id,
            user_id: user_id.to_string(),
            date,
            time,
            status: AppointmentStatus::Scheduled,
            notes: notes.map(str::to_string),
            created_ts_utc: now,
        })
    }

    fn append_streak_event(
        &self,
        user_id: &str,
        cadence: Cadence,
        ts_utc: i64,
        date_local: NaiveDate,
    ) -> AppResult<i64> {
        self.conn.execute(
            "INSERT INTO streak_events (user_id, cadence, ts_utc, date_local) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, cadence.as_str(), ts_utc, fmt_date(date_local)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn load_streak_log(&self, user_id: &str, cadence: Cadence) -> AppResult<Vec<StreakEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, cadence, ts_utc, date_local FROM streak_events
             WHERE user_id = ?1 ORDER BY ts_utc, id",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, stored_cadence, ts_utc, date_local) = row?;
            // every row is parsed so a bad cadence shows up whichever log is asked for
            let stored_cadence: Cadence = stored_cadence.parse()?;
            if stored_cadence != cadence {
                continue;
            }
            events.push(StreakEvent {
                id: Some(id),
                user_id: user_id.to_string(),
                cadence: stored_cadence,
                ts_utc,
                date_local: parse_date(&date_local)?,
            });
        }
        Ok(events)
    }
}
