//! Three-step booking wizard: pick a date, pick a time, confirm details.
//!
//! The flow works on a local copy of the advisor's calendar. Only `submit`
//! talks to the store; cancelling never does.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::appointment::Appointment;
use crate::availability::AvailabilityCalendar;
use crate::error::{AppError, AppResult};
use crate::slot::Slot;
use crate::store::AdvisorStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum BookingState {
    SelectingDate,
    SelectingTime {
        date: NaiveDate,
    },
    ConfirmingDetails {
        date: NaiveDate,
        #[serde(with = "crate::slot::hhmm")]
        time: NaiveTime,
    },
    Completed {
        appointment: Appointment,
    },
    Cancelled,
}

impl BookingState {
    pub fn name(&self) -> &'static str {
        match self {
            BookingState::SelectingDate => "selecting_date",
            BookingState::SelectingTime { .. } => "selecting_time",
            BookingState::ConfirmingDetails { .. } => "confirming_details",
            BookingState::Completed { .. } => "completed",
            BookingState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingState::Completed { .. } | BookingState::Cancelled)
    }

    fn selected_date(&self) -> Option<NaiveDate> {
        match self {
            BookingState::SelectingTime { date } | BookingState::ConfirmingDetails { date, .. } => {
                Some(*date)
            }
            _ => None,
        }
    }
}

/// What the UI needs to render the current step.
#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    pub advisor_id: i64,
    pub state: BookingState,
    pub open_slots: Vec<Slot>,
}

#[derive(Debug, Clone)]
pub struct BookingFlow {
    user_id: String,
    advisor_id: i64,
    calendar: AvailabilityCalendar,
    state: BookingState,
}

impl BookingFlow {
    pub fn new(user_id: &str, advisor_id: i64, calendar: AvailabilityCalendar) -> Self {
        BookingFlow {
            user_id: user_id.to_string(),
            advisor_id,
            calendar,
            state: BookingState::SelectingDate,
        }
    }

    /// Loads the advisor's current availability and opens the wizard.
    pub fn start<S: AdvisorStore + ?Sized>(
        store: &S,
        user_id: &str,
        advisor_id: i64,
    ) -> AppResult<Self> {
        let days = store.fetch_availability(advisor_id)?;
        Ok(BookingFlow::new(
            user_id,
            advisor_id,
            AvailabilityCalendar::new(days),
        ))
    }

    pub fn state(&self) -> &BookingState {
        &self.state
    }

    pub fn calendar(&self) -> &AvailabilityCalendar {
        &self.calendar
    }

    pub fn view(&self) -> BookingView {
        BookingView {
            advisor_id: self.advisor_id,
            state: self.state.clone(),
            open_slots: self
                .state
                .selected_date()
                .map(|date| self.calendar.slots_for(date))
                .unwrap_or_default(),
        }
    }

    fn invalid(&self, action: &str) -> AppError {
        AppError::transition(action, self.state.name())
    }

    fn set_state(&mut self, next: BookingState) {
        tracing::debug!(
            user_id = %self.user_id,
            from = self.state.name(),
            to = next.name(),
            "booking step"
        );
        self.state = next;
    }

    /// Picking a date drops any time picked before it.
    pub fn select_date(&mut self, date: NaiveDate) -> AppResult<()> {
        match self.state {
            BookingState::SelectingDate
            | BookingState::SelectingTime { .. }
            | BookingState::ConfirmingDetails { .. } => {}
            _ => return Err(self.invalid("select a date")),
        }
        if !self.calendar.has_availability(date) {
            return Err(AppError::NoAvailability { date });
        }
        self.set_state(BookingState::SelectingTime { date });
        Ok(())
    }

    pub fn select_time(&mut self, time: NaiveTime) -> AppResult<()> {
        let BookingState::SelectingTime { date } = self.state else {
            return Err(self.invalid("select a time"));
        };
        match self.calendar.slot(date, time) {
            None => return Err(AppError::NoAvailability { date }),
            Some(slot) if slot.booked() => return Err(AppError::SlotAlreadyBooked { date, time }),
            Some(_) => {}
        }
        self.set_state(BookingState::ConfirmingDetails { date, time });
        Ok(())
    }

    pub fn back(&mut self) -> AppResult<()> {
        match self.state {
            BookingState::ConfirmingDetails { date, .. } => {
                self.set_state(BookingState::SelectingTime { date });
                Ok(())
            }
            BookingState::SelectingTime { .. } => {
                self.set_state(BookingState::SelectingDate);
                Ok(())
            }
            _ => Err(self.invalid("go back")),
        }
    }

    /// Commits the chosen slot through the store.
    ///
    /// A lost race (`SlotAlreadyBooked`) sends the flow back to time
    /// selection for the same date. Other failures leave the flow on the
    /// confirmation step so the user can submit again.
    pub fn submit<S: AdvisorStore + ?Sized>(
        &mut self,
        store: &S,
        notes: Option<&str>,
    ) -> AppResult<Appointment> {
        let BookingState::ConfirmingDetails { date, time } = self.state else {
            return Err(self.invalid("submit"));
        };

        if !self.calendar.is_open(date, time) {
            self.set_state(BookingState::SelectingTime { date });
            return Err(AppError::SlotAlreadyBooked { date, time });
        }

        match store.commit_booking(&self.user_id, self.advisor_id, date, time, notes) {
            Ok(appointment) => {
                self.close_local_slot(date, time);
                self.set_state(BookingState::Completed {
                    appointment: appointment.clone(),
                });
                Ok(appointment)
            }
            Err(AppError::SlotAlreadyBooked { .. }) => {
                tracing::warn!(advisor_id = self.advisor_id, %date, %time, "slot taken before confirmation");
                self.close_local_slot(date, time);
                self.set_state(BookingState::SelectingTime { date });
                Err(AppError::SlotAlreadyBooked { date, time })
            }
            Err(err) => {
                tracing::warn!(advisor_id = self.advisor_id, error = %err, "booking commit failed");
                Err(err)
            }
        }
    }

    fn close_local_slot(&mut self, date: NaiveDate, time: NaiveTime) {
        if let Err(err) = self.calendar.mark_booked(date, time) {
            tracing::debug!(error = %err, "local slot already closed");
        }
    }

    /// Drops every selection. Safe to call repeatedly.
    pub fn cancel(&mut self) -> AppResult<()> {
        if matches!(self.state, BookingState::Completed { .. }) {
            return Err(self.invalid("cancel"));
        }
        if self.state != BookingState::Cancelled {
            self.set_state(BookingState::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::config::BookingConfig;
    use crate::enums::{AppointmentStatus, Cadence};
    use crate::slot::DayAvailability;
    use crate::store::{Advisor, SqliteStore};
    use crate::streak::StreakEvent;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    /// Wraps a real store and counts booking commits.
    struct CountingStore {
        inner: SqliteStore,
        commits: Cell<u32>,
        fail_next: Cell<bool>,
    }

    impl CountingStore {
        fn new() -> (Self, Advisor) {
            let inner = SqliteStore::open_in_memory().unwrap();
            let booking = BookingConfig {
                window_days: 3,
                ..BookingConfig::default()
            };
            // Friday; window covers Mon 12th to Wed 14th
            let advisor = inner
                .create_advisor("Dewi", None, d(9), &booking)
                .unwrap();
            let store = CountingStore {
                inner,
                commits: Cell::new(0),
                fail_next: Cell::new(false),
            };
            (store, advisor)
        }
    }

    impl AdvisorStore for CountingStore {
        fn fetch_availability(&self, advisor_id: i64) -> AppResult<Vec<DayAvailability>> {
            self.inner.fetch_availability(advisor_id)
        }

        fn commit_booking(
            &self,
            user_id: &str,
            advisor_id: i64,
            date: NaiveDate,
            time: NaiveTime,
            notes: Option<&str>,
        ) -> AppResult<Appointment> {
            self.commits.set(self.commits.get() + 1);
            if self.fail_next.replace(false) {
                return Err(AppError::Persistence("connection reset".to_string()));
            }
            self.inner
                .commit_booking(user_id, advisor_id, date, time, notes)
        }

        fn append_streak_event(
            &self,
            user_id: &str,
            cadence: Cadence,
            ts_utc: i64,
            date_local: NaiveDate,
        ) -> AppResult<i64> {
            self.inner
                .append_streak_event(user_id, cadence, ts_utc, date_local)
        }

        fn load_streak_log(&self, user_id: &str, cadence: Cadence) -> AppResult<Vec<StreakEvent>> {
            self.inner.load_streak_log(user_id, cadence)
        }
    }

    fn to_confirmation(flow: &mut BookingFlow, date: NaiveDate, time: NaiveTime) {
        flow.select_date(date).unwrap();
        flow.select_time(time).unwrap();
    }

    #[test]
    fn happy_path_completes_and_books_slot() {
        let (store, advisor) = CountingStore::new();
        let mut flow = BookingFlow::start(&store, "user-1", advisor.id).unwrap();
        assert_eq!(flow.state(), &BookingState::SelectingDate);

        to_confirmation(&mut flow, d(12), t(10));
        assert_eq!(
            flow.state(),
            &BookingState::ConfirmingDetails { date: d(12), time: t(10) }
        );

        let appointment = flow.submit(&store, Some("portfolio review")).unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
        assert_eq!(appointment.user_id, "user-1");
        assert!(matches!(flow.state(), BookingState::Completed { .. }));
        assert!(!flow.calendar().is_open(d(12), t(10)));
        assert_eq!(store.commits.get(), 1);

        let days = store.fetch_availability(advisor.id).unwrap();
        assert!(days[0].slot_at(t(10)).unwrap().booked());
    }

    #[test]
    fn date_without_slots_is_rejected() {
        let (store, advisor) = CountingStore::new();
        let mut flow = BookingFlow::start(&store, "user-1", advisor.id).unwrap();

        // Saturday, outside the generated window
        let result = flow.select_date(d(17));
        assert!(matches!(result, Err(AppError::NoAvailability { .. })));
        assert_eq!(flow.state(), &BookingState::SelectingDate);
    }

    #[test]
    fn fully_booked_date_is_rejected() {
        let day = DayAvailability::new(
            d(12),
            vec![Slot::restore(t(9), t(10), true).unwrap()],
        )
        .unwrap();
        let mut flow = BookingFlow::new("user-1", 1, AvailabilityCalendar::new(vec![day]));
        assert!(flow.select_date(d(12)).is_err());
        assert_eq!(flow.state(), &BookingState::SelectingDate);
    }

    #[test]
    fn choosing_a_new_date_clears_time() {
        let (store, advisor) = CountingStore::new();
        let mut flow = BookingFlow::start(&store, "user-1", advisor.id).unwrap();
        to_confirmation(&mut flow, d(12), t(10));

        flow.select_date(d(13)).unwrap();
        assert_eq!(flow.state(), &BookingState::SelectingTime { date: d(13) });
    }

    #[test]
    fn back_keeps_the_date() {
        let (store, advisor) = CountingStore::new();
        let mut flow = BookingFlow::start(&store, "user-1", advisor.id).unwrap();
        to_confirmation(&mut flow, d(13), t(11));

        flow.back().unwrap();
        assert_eq!(flow.state(), &BookingState::SelectingTime { date: d(13) });
        flow.back().unwrap();
        assert_eq!(flow.state(), &BookingState::SelectingDate);
        assert!(flow.back().is_err());
    }

    #[test]
    fn booked_or_missing_time_is_rejected() {
        let (store, advisor) = CountingStore::new();
        store
            .inner
            .commit_booking("someone", advisor.id, d(12), t(9), None)
            .unwrap();
        let mut flow = BookingFlow::start(&store, "user-1", advisor.id).unwrap();
        flow.select_date(d(12)).unwrap();

        assert!(matches!(
            flow.select_time(t(9)),
            Err(AppError::SlotAlreadyBooked { .. })
        ));
        assert!(matches!(
            flow.select_time(t(20)),
            Err(AppError::NoAvailability { .. })
        ));
        assert_eq!(flow.state(), &BookingState::SelectingTime { date: d(12) });
    }

    #[test]
    fn lost_race_returns_to_time_selection() {
        let (store, advisor) = CountingStore::new();
        let mut first = BookingFlow::start(&store, "user-1", advisor.id).unwrap();
        let mut second = BookingFlow::start(&store, "user-2", advisor.id).unwrap();
        to_confirmation(&mut first, d(12), t(10));
        to_confirmation(&mut second, d(12), t(10));

        first.submit(&store, None).unwrap();
        let lost = second.submit(&store, None);

        assert!(matches!(lost, Err(AppError::SlotAlreadyBooked { .. })));
        assert_eq!(second.state(), &BookingState::SelectingTime { date: d(12) });
        assert!(!second.calendar().is_open(d(12), t(10)));
        assert!(second.view().open_slots.iter().all(|slot| slot.start != t(10)));

        second.select_time(t(11)).unwrap();
        second.submit(&store, None).unwrap();
        assert_eq!(store.commits.get(), 3);
    }

    #[test]
    fn persistence_failure_stays_on_confirmation() {
        let (store, advisor) = CountingStore::new();
        let mut flow = BookingFlow::start(&store, "user-1", advisor.id).unwrap();
        to_confirmation(&mut flow, d(14), t(15));

        store.fail_next.set(true);
        assert!(matches!(
            flow.submit(&store, None),
            Err(AppError::Persistence(_))
        ));
        assert_eq!(
            flow.state(),
            &BookingState::ConfirmingDetails { date: d(14), time: t(15) }
        );

        flow.submit(&store, None).unwrap();
        assert_eq!(store.commits.get(), 2);
    }

    #[test]
    fn cancel_never_commits() {
        let (store, advisor) = CountingStore::new();
        let mut flow = BookingFlow::start(&store, "user-1", advisor.id).unwrap();
        to_confirmation(&mut flow, d(12), t(10));

        for _ in 0..3 {
            flow.cancel().unwrap();
        }
        assert_eq!(flow.state(), &BookingState::Cancelled);
        assert_eq!(store.commits.get(), 0);
        assert!(flow.submit(&store, None).is_err());
        assert_eq!(store.commits.get(), 0);
        assert!(flow.select_date(d(12)).is_err());
    }

    #[test]
    fn cancel_after_completion_is_rejected() {
        let (store, advisor) = CountingStore::new();
        let mut flow = BookingFlow::start(&store, "user-1", advisor.id).unwrap();
        to_confirmation(&mut flow, d(12), t(10));
        flow.submit(&store, None).unwrap();

        assert!(matches!(
            flow.cancel(),
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(flow.state().is_terminal());
    }

    #[test]
    fn submit_requires_confirmation_step() {
        let (store, advisor) = CountingStore::new();
        let mut flow = BookingFlow::start(&store, "user-1", advisor.id).unwrap();
        flow.select_date(d(12)).unwrap();
        assert!(matches!(
            flow.submit(&store, None),
            Err(AppError::InvalidTransition { .. })
        ));
        assert_eq!(store.commits.get(), 0);
    }

    #[test]
    fn view_serializes_step_tag() {
        let (store, advisor) = CountingStore::new();
        let mut flow = BookingFlow::start(&store, "user-1", advisor.id).unwrap();
        flow.select_date(d(12)).unwrap();

        let json = serde_json::to_value(flow.view()).unwrap();
        assert_eq!(json["state"]["step"], "selecting_time");
        assert_eq!(json["state"]["date"], "2025-05-12");
        assert_eq!(json["open_slots"].as_array().unwrap().len(), 8);
    }
}
