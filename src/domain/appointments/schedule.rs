use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

pub const MIN_DURATION_MINUTES: i32 = 15;
pub const MAX_DURATION_MINUTES: i32 = 240;
pub const CONFLICT_LEAD_MINUTES: i64 = 30;
pub const WORKDAY_START_HOUR: u32 = 9;
pub const WORKDAY_END_HOUR: u32 = 17;

pub fn validate_duration(minutes: i32) -> Result<(), String> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(format!(
            "Duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
        ))
    }
}

/// Start times of other bookings that collide with a new booking at `start`.
/// A booking conflicts when it starts within 30 minutes before `start` or before the new
/// booking ends (both ends inclusive).
pub fn conflict_window(start: DateTime<Utc>, duration_minutes: i32) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        start - Duration::minutes(CONFLICT_LEAD_MINUTES),
        start + Duration::minutes(i64::from(duration_minutes)),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_available: bool,
}

/// Splits the working day into back-to-back slots of `duration_minutes` and flags those that
/// overlap any of `busy` (half-open `[start, end)` intervals).
pub fn day_slots(
    date: NaiveDate,
    duration_minutes: i32,
    busy: &[(DateTime<Utc>, DateTime<Utc>)],
) -> Vec<Slot> {
    let at = |hour: u32| {
        NaiveTime::from_hms_opt(hour, 0, 0).map(|t| date.and_time(t).and_utc())
    };
    let (Some(day_start), Some(day_end)) = (at(WORKDAY_START_HOUR), at(WORKDAY_END_HOUR)) else {
        return Vec::new();
    };
    if duration_minutes <= 0 {
        return Vec::new();
    }
    let step = Duration::minutes(i64::from(duration_minutes));
    let mut slots = Vec::new();
    let mut cursor = day_start;
    while cursor + step <= day_end {
        let end = cursor + step;
        let is_available = !busy.iter().any(|(b_start, b_end)| cursor < *b_end && end > *b_start);
        slots.push(Slot {
            start: cursor,
            end,
            is_available,
        });
        cursor = end;
    }
    slots
}
