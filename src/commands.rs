use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Local, NaiveDate, Utc};
use tauri::{AppHandle, State};

use crate::appointment::Appointment;
use crate::availability::AvailabilityCalendar;
use crate::booking::{BookingFlow, BookingView};
use crate::config::{self, BookingConfig, ConfigPayload};
use crate::db;
use crate::enums::{AppointmentStatus, Cadence};
use crate::insight::{streak_insight, CoachingInsight};
use crate::slot::{parse_date, parse_time, Slot};
use crate::store::{Advisor, AdvisorStore, SqliteStore};
use crate::streak::{compute_streak, StreakSummary};
use crate::tracker::StreakTracker;

/// Booking wizards in progress, one per user.
#[derive(Default)]
pub struct BookingSessions(Mutex<HashMap<String, BookingFlow>>);

fn open_store(app: &AppHandle) -> Result<SqliteStore, String> {
    db::open_app_connection(app)
        .map(SqliteStore::new)
        .map_err(|err| err.to_string())
}

fn resolve_date_local(date_local: Option<String>) -> Result<NaiveDate, String> {
    match date_local {
        Some(raw) => parse_date(&raw).map_err(|err| err.to_string()),
        None => Ok(Local::now().date_naive()),
    }
}

fn with_flow<T>(
    sessions: &BookingSessions,
    user_id: &str,
    action: impl FnOnce(&mut BookingFlow) -> Result<T, String>,
) -> Result<T, String> {
    let mut guard = sessions.0.lock().map_err(|err| err.to_string())?;
    let flow = guard
        .get_mut(user_id)
        .ok_or_else(|| format!("no booking in progress for {}", user_id))?;
    action(flow)
}

#[tauri::command(rename_all = "snake_case")]
pub fn list_advisors(app: AppHandle) -> Result<Vec<Advisor>, String> {
    let store = open_store(&app)?;
    store.list_advisors().map_err(|err| err.to_string())
}

#[tauri::command(rename_all = "snake_case")]
pub fn create_advisor(
    app: AppHandle,
    name: String,
    specialty: Option<String>,
) -> Result<Advisor, String> {
    let store = open_store(&app)?;
    let booking = config::fetch_config(store.connection()).map_err(|err| err.to_string())?;
    store
        .create_advisor(
            &name,
            specialty.as_deref(),
            Local::now().date_naive(),
            &booking,
        )
        .map_err(|err| err.to_string())
}

#[tauri::command(rename_all = "snake_case")]
pub fn get_available_dates(
    app: AppHandle,
    advisor_id: i64,
    year: i32,
    month: u32,
) -> Result<Vec<NaiveDate>, String> {
    let store = open_store(&app)?;
    let days = store
        .fetch_availability(advisor_id)
        .map_err(|err| err.to_string())?;
    Ok(AvailabilityCalendar::new(days).available_dates_in_month(year, month))
}

#[tauri::command(rename_all = "snake_case")]
pub fn list_open_slots(
    app: AppHandle,
    advisor_id: i64,
    date_local: String,
) -> Result<Vec<Slot>, String> {
    let date = parse_date(&date_local).map_err(|err| err.to_string())?;
    let store = open_store(&app)?;
    let days = store
        .fetch_availability(advisor_id)
        .map_err(|err| err.to_string())?;
    Ok(AvailabilityCalendar::new(days).slots_for(date))
}

#[tauri::command(rename_all = "snake_case")]
pub fn start_booking(
    app: AppHandle,
    sessions: State<'_, BookingSessions>,
    user_id: String,
    advisor_id: i64,
) -> Result<BookingView, String> {
    let store = open_store(&app)?;
    let flow = BookingFlow::start(&store, &user_id, advisor_id).map_err(|err| err.to_string())?;
    let view = flow.view();
    sessions
        .0
        .lock()
        .map_err(|err| err.to_string())?
        .insert(user_id, flow);
    Ok(view)
}

#[tauri::command(rename_all = "snake_case")]
pub fn get_booking(
    sessions: State<'_, BookingSessions>,
    user_id: String,
) -> Result<BookingView, String> {
    with_flow(&sessions, &user_id, |flow| Ok(flow.view()))
}

#[tauri::command(rename_all = "snake_case")]
pub fn booking_select_date(
    sessions: State<'_, BookingSessions>,
    user_id: String,
    date_local: String,
) -> Result<BookingView, String> {
    let date = parse_date(&date_local).map_err(|err| err.to_string())?;
    with_flow(&sessions, &user_id, |flow| {
        flow.select_date(date).map_err(|err| err.to_string())?;
        Ok(flow.view())
    })
}

#[tauri::command(rename_all = "snake_case")]
pub fn booking_select_time(
    sessions: State<'_, BookingSessions>,
    user_id: String,
    time: String,
) -> Result<BookingView, String> {
    let time = parse_time(&time).map_err(|err| err.to_string())?;
    with_flow(&sessions, &user_id, |flow| {
        flow.select_time(time).map_err(|err| err.to_string())?;
        Ok(flow.view())
    })
}

#[tauri::command(rename_all = "snake_case")]
pub fn booking_back(
    sessions: State<'_, BookingSessions>,
    user_id: String,
) -> Result<BookingView, String> {
    with_flow(&sessions, &user_id, |flow| {
        flow.back().map_err(|err| err.to_string())?;
        Ok(flow.view())
    })
}

/// On a lost race the error comes back and `get_booking` shows the
/// remaining slots for the same date.
#[tauri::command(rename_all = "snake_case")]
pub fn booking_submit(
    app: AppHandle,
    sessions: State<'_, BookingSessions>,
    user_id: String,
    notes: Option<String>,
) -> Result<Appointment, String> {
    let store = open_store(&app)?;
    with_flow(&sessions, &user_id, |flow| {
        flow.submit(&store, notes.as_deref())
            .map_err(|err| err.to_string())
    })
}

#[tauri::command(rename_all = "snake_case")]
pub fn booking_cancel(
    sessions: State<'_, BookingSessions>,
    user_id: String,
) -> Result<(), String> {
    let mut guard = sessions.0.lock().map_err(|err| err.to_string())?;
    if let Some(mut flow) = guard.remove(&user_id) {
        if !flow.state().is_terminal() {
            flow.cancel().map_err(|err| err.to_string())?;
        }
    }
    Ok(())
}

#[tauri::command(rename_all = "snake_case")]
pub fn list_appointments(app: AppHandle, user_id: String) -> Result<Vec<Appointment>, String> {
    let store = open_store(&app)?;
    store
        .list_appointments(&user_id)
        .map_err(|err| err.to_string())
}

#[tauri::command(rename_all = "snake_case")]
pub fn update_appointment_status(
    app: AppHandle,
    appointment_id: i64,
    status: AppointmentStatus,
) -> Result<Appointment, String> {
    let store = open_store(&app)?;
    store
        .update_appointment_status(appointment_id, status)
        .map_err(|err| err.to_string())
}

#[tauri::command(rename_all = "snake_case")]
pub fn record_streak_event(
    app: AppHandle,
    user_id: String,
    cadence: Cadence,
    date_local: Option<String>,
) -> Result<StreakSummary, String> {
    let date_local = resolve_date_local(date_local)?;
    let store = open_store(&app)?;
    let mut tracker =
        StreakTracker::load(&store, &user_id, cadence).map_err(|err| err.to_string())?;
    let now = Utc::now().timestamp_millis();
    tracker
        .record(&store, now, date_local)
        .map_err(|err| err.to_string())?;
    Ok(tracker.summary(now))
}

#[tauri::command(rename_all = "snake_case")]
pub fn get_streak(
    app: AppHandle,
    user_id: String,
    cadence: Cadence,
) -> Result<StreakSummary, String> {
    let store = open_store(&app)?;
    let log = store
        .load_streak_log(&user_id, cadence)
        .map_err(|err| err.to_string())?;
    Ok(compute_streak(&log, cadence, Utc::now().timestamp_millis()))
}

#[tauri::command(rename_all = "snake_case")]
pub fn get_streak_insight(
    app: AppHandle,
    user_id: String,
    cadence: Cadence,
) -> Result<CoachingInsight, String> {
    let summary = get_streak(app, user_id, cadence)?;
    Ok(streak_insight(&summary, cadence))
}

#[tauri::command(rename_all = "snake_case")]
pub fn get_config(app: AppHandle) -> Result<BookingConfig, String> {
    let store = open_store(&app)?;
    config::fetch_config(store.connection()).map_err(|err| err.to_string())
}

#[tauri::command(rename_all = "snake_case")]
pub fn update_config(app: AppHandle, payload: ConfigPayload) -> Result<BookingConfig, String> {
    let store = open_store(&app)?;
    config::update_config(store.connection(), &payload).map_err(|err| err.to_string())
}
