use chrono::{Months, NaiveDate};
use im::OrdMap;

use crate::error::{Result, TrackerError};

pub trait MapValues<K, V> {
    fn map_values<F: Fn(&V) -> V>(&self, f: F) -> OrdMap<K, V>;
}

impl<K, V> MapValues<K, V> for OrdMap<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    fn map_values<F: Fn(&V) -> V>(&self, f: F) -> OrdMap<K, V> {
        self.iter().map(|(k, v)| (k.clone(), f(v))).collect()
    }
}

/// Calendar-month arithmetic: the day of month is kept when the target month has it,
/// otherwise it is clamped to that month's last day.
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months)).ok_or_else(|| {
        TrackerError::validation(format!("{} + {} months is out of range", date, months))
    })
}

/// Whole days from `from` to `to`, floored at zero.
pub fn days_past(from: NaiveDate, to: NaiveDate) -> u32 {
    let days = (to - from).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}
