use chrono::NaiveDate;
use uuid::Uuid;

use crate::enums::Cadence;
use crate::error::AppResult;
use crate::reconcile::{Entry, PendingList};
use crate::store::AdvisorStore;
use crate::streak::{compute_streak, StreakEvent, StreakSummary};

/// One user's habit log for one cadence, with optimistic appends.
#[derive(Debug, Clone)]
pub struct StreakTracker {
    user_id: String,
    cadence: Cadence,
    log: PendingList<StreakEvent>,
}

impl StreakTracker {
    pub fn load<S: AdvisorStore + ?Sized>(
        store: &S,
        user_id: &str,
        cadence: Cadence,
    ) -> AppResult<Self> {
        let events = store.load_streak_log(user_id, cadence)?;
        let log = PendingList::from_confirmed(
            events
                .into_iter()
                .filter_map(|event| event.id.map(|id| (id, event))),
        );
        Ok(StreakTracker {
            user_id: user_id.to_string(),
            cadence,
            log,
        })
    }

    /// Shows the event locally before the store has answered.
    pub fn begin_record(&mut self, ts_utc: i64, date_local: NaiveDate) -> Uuid {
        self.log.add_tentative(StreakEvent {
            id: None,
            user_id: self.user_id.clone(),
            cadence: self.cadence,
            ts_utc,
            date_local,
        })
    }

    /// Applies the store's answer to a pending event.
    pub fn settle(&mut self, temp_id: Uuid, outcome: AppResult<i64>) -> AppResult<()> {
        match outcome {
            Ok(id) => {
                self.log.confirm(temp_id, id)?.id = Some(id);
                Ok(())
            }
            Err(err) => {
                self.log.reject(temp_id)?;
                tracing::warn!(
                    user_id = %self.user_id,
                    cadence = self.cadence.as_str(),
                    error = %err,
                    "streak event rolled back"
                );
                Err(err)
            }
        }
    }

    pub fn record<S: AdvisorStore + ?Sized>(
        &mut self,
        store: &S,
        ts_utc: i64,
        date_local: NaiveDate,
    ) -> AppResult<()> {
        let temp_id = self.begin_record(ts_utc, date_local);
        let outcome = store.append_streak_event(&self.user_id, self.cadence, ts_utc, date_local);
        self.settle(temp_id, outcome)
    }

    pub fn entries(&self) -> &[Entry<StreakEvent>] {
        self.log.entries()
    }

    /// Summary over everything shown, pending entries included.
    pub fn summary(&self, now_ms: i64) -> StreakSummary {
        let events: Vec<StreakEvent> = self.log.items().cloned().collect();
        compute_streak(&events, self.cadence, now_ms)
    }

    /// Summary over stored entries only.
    pub fn confirmed_summary(&self, now_ms: i64) -> StreakSummary {
        let events: Vec<StreakEvent> = self.log.confirmed_items().cloned().collect();
        compute_streak(&events, self.cadence, now_ms)
    }
}
