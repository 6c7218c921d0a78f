//! Habit streaks inferred from an append-only event log.
//!
//! A streak is the run of newest-first events whose gaps stay within the
//! cadence interval plus a 10% grace buffer. Events logged on the same
//! calendar day collapse to one before the walk.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::enums::Cadence;

pub const GRACE_FACTOR: f64 = 1.1;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

impl Cadence {
    pub fn interval_ms(&self) -> i64 {
        match self {
            Cadence::Daily => DAY_MS,
            Cadence::Weekly => 7 * DAY_MS,
            Cadence::Monthly => 30 * DAY_MS,
        }
    }

    /// Longest gap that still keeps a streak alive.
    pub fn grace_limit_ms(&self) -> f64 {
        GRACE_FACTOR * self.interval_ms() as f64
    }

    fn within_grace(&self, gap_ms: i64) -> bool {
        gap_ms as f64 <= self.grace_limit_ms()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakEvent {
    /// Set once the store has the event.
    pub id: Option<i64>,
    pub user_id: String,
    pub cadence: Cadence,
    pub ts_utc: i64,
    pub date_local: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StreakSummary {
    pub count: u32,
    pub broken: bool,
    pub last_ts_utc: Option<i64>,
}

pub fn compute_streak(log: &[StreakEvent], cadence: Cadence, now_ms: i64) -> StreakSummary {
    let mut events: Vec<&StreakEvent> = log.iter().filter(|e| e.cadence == cadence).collect();
    events.sort_by(|a, b| b.ts_utc.cmp(&a.ts_utc));

    let mut seen_days = HashSet::new();
    events.retain(|e| seen_days.insert(e.date_local));

    let Some(newest) = events.first() else {
        return StreakSummary::default();
    };

    let mut count = 1;
    for pair in events.windows(2) {
        if !cadence.within_grace(pair[0].ts_utc - pair[1].ts_utc) {
            break;
        }
        count += 1;
    }

    StreakSummary {
        count,
        broken: !cadence.within_grace(now_ms - newest.ts_utc),
        last_ts_utc: Some(newest.ts_utc),
    }
}
