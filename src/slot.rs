use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::Serialize;

use crate::config::BookingConfig;
use crate::error::{AppError, AppResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

pub fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| AppError::schema("date", raw))
}

pub fn parse_time(raw: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT).map_err(|_| AppError::schema("time", raw))
}

/// A bookable time-of-day window. `booked` only ever goes from false to true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    booked: bool,
}

impl Slot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> AppResult<Self> {
        if start >= end {
            return Err(AppError::InvalidInput(format!(
                "slot start {} must be before end {}",
                start.format(TIME_FORMAT),
                end.format(TIME_FORMAT)
            )));
        }
        Ok(Slot {
            start,
            end,
            booked: false,
        })
    }

    /// Rebuilds a slot read back from storage.
    pub(crate) fn restore(start: NaiveTime, end: NaiveTime, booked: bool) -> AppResult<Self> {
        let mut slot = Slot::new(start, end)?;
        slot.booked = booked;
        Ok(slot)
    }

    pub fn booked(&self) -> bool {
        self.booked
    }

    pub(crate) fn set_booked(&mut self) {
        self.booked = true;
    }

    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One advisor's slots on one calendar date, ordered and non-overlapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    slots: Vec<Slot>,
}

impl DayAvailability {
    pub fn new(date: NaiveDate, mut slots: Vec<Slot>) -> AppResult<Self> {
        slots.sort_by_key(|slot| slot.start);
        for slot in &slots {
            if slot.start >= slot.end {
                return Err(AppError::InvalidInput(format!(
                    "slot on {date} starting {} ends before it starts",
                    slot.start.format(TIME_FORMAT)
                )));
            }
        }
        if let Some(pair) = slots.windows(2).find(|pair| pair[0].overlaps(&pair[1])) {
            return Err(AppError::InvalidInput(format!(
                "slots on {date} overlap at {}",
                pair[1].start.format(TIME_FORMAT)
            )));
        }
        Ok(DayAvailability { date, slots })
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn open_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| !slot.booked)
    }

    pub fn has_open_slot(&self) -> bool {
        self.open_slots().next().is_some()
    }

    pub fn slot_at(&self, start: NaiveTime) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.start == start)
    }

    pub(crate) fn slot_at_mut(&mut self, start: NaiveTime) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.start == start)
    }
}

/// Slots covering `[day_start, day_end)` in `slot_minutes` steps. A trailing
/// remainder shorter than one step is dropped. A step that is not positive
/// or does not fit a `Duration` yields no slots.
pub fn day_template(config: &BookingConfig) -> Vec<Slot> {
    let Some(step) = Duration::try_minutes(config.slot_minutes) else {
        return Vec::new();
    };
    if step <= Duration::zero() {
        return Vec::new();
    }
    let mut slots = Vec::new();
    let mut start = config.day_start;
    while start < config.day_end {
        let (end, wrapped) = start.overflowing_add_signed(step);
        if wrapped != 0 || end > config.day_end {
            break;
        }
        slots.push(Slot {
            start,
            end,
            booked: false,
        });
        start = end;
    }
    slots
}

/// Rolling window of `window_days` weekdays starting the day after `created_on`.
pub fn generate_window(created_on: NaiveDate, config: &BookingConfig) -> Vec<DayAvailability> {
    let template = day_template(config);
    let wanted = usize::try_from(config.window_days).unwrap_or(0);

    created_on
        .iter_days()
        .skip(1)
        .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
        .take(wanted)
        .map(|date| DayAvailability {
            date,
            slots: template.clone(),
        })
        .collect()
}

/// `NaiveTime` as `HH:MM` on the wire.
pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::Serializer;

    use super::TIME_FORMAT;

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(TIME_FORMAT).to_string())
    }
}
