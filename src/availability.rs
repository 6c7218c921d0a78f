use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::error::{AppError, AppResult};
use crate::slot::{DayAvailability, Slot};

/// One advisor's generated window, keyed by date.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityCalendar {
    days: BTreeMap<NaiveDate, DayAvailability>,
}

impl AvailabilityCalendar {
    pub fn new(days: Vec<DayAvailability>) -> Self {
        let days = days.into_iter().map(|day| (day.date, day)).collect();
        AvailabilityCalendar { days }
    }

    /// Dates outside the window simply have nothing open.
    pub fn has_availability(&self, date: NaiveDate) -> bool {
        self.days
            .get(&date)
            .map(DayAvailability::has_open_slot)
            .unwrap_or(false)
    }

    /// Unbooked slots for `date`, in start order.
    pub fn slots_for(&self, date: NaiveDate) -> Vec<Slot> {
        self.days
            .get(&date)
            .map(|day| day.open_slots().copied().collect())
            .unwrap_or_default()
    }

    pub fn available_dates_in_month(&self, year: i32, month: u32) -> Vec<NaiveDate> {
        self.days
            .values()
            .filter(|day| day.date.year() == year && day.date.month() == month)
            .filter(|day| day.has_open_slot())
            .map(|day| day.date)
            .collect()
    }

    pub fn slot(&self, date: NaiveDate, time: NaiveTime) -> Option<&Slot> {
        self.days.get(&date).and_then(|day| day.slot_at(time))
    }

    pub fn is_open(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.slot(date, time).map(|slot| !slot.booked()).unwrap_or(false)
    }

    pub fn mark_booked(&mut self, date: NaiveDate, time: NaiveTime) -> AppResult<()> {
        let slot = self
            .days
            .get_mut(&date)
            .and_then(|day| day.slot_at_mut(time))
            .ok_or(AppError::NoAvailability { date })?;
        if slot.booked() {
            return Err(AppError::SlotAlreadyBooked { date, time });
        }
        slot.set_booked();
        Ok(())
    }
}
