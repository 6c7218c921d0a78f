pub mod appointment;
pub mod availability;
pub mod booking;
pub mod config;
pub mod db;
pub mod enums;
pub mod error;
pub mod insight;
pub mod reconcile;
pub mod slot;
pub mod store;
pub mod streak;
pub mod tracker;

#[cfg(feature = "desktop")]
mod commands;

pub use error::{AppError, AppResult};

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    tauri::Builder::default()
        .manage(commands::BookingSessions::default())
        .setup(|app| {
            db::open_database(&db::db_path(app.handle()))?;
            Ok(())
        })
        .plugin(tauri_plugin_opener::init())
        .invoke_handler(tauri::generate_handler![
            commands::list_advisors,
            commands::create_advisor,
            commands::get_available_dates,
            commands::list_open_slots,
            commands::start_booking,
            commands::get_booking,
            commands::booking_select_date,
            commands::booking_select_time,
            commands::booking_back,
            commands::booking_submit,
            commands::booking_cancel,
            commands::list_appointments,
            commands::update_appointment_status,
            commands::record_streak_event,
            commands::get_streak,
            commands::get_streak_insight,
            commands::get_config,
            commands::update_config
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
