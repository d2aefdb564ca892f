//! Two-shift day: 08:00–20:00 and 20:00–08:00.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike};

use crate::timing::format_hms;

pub const DAY_SHIFT_START: u32 = 8;
pub const NIGHT_SHIFT_START: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Day,
    Night,
}

pub fn current_shift<Tz: TimeZone>(now: &DateTime<Tz>) -> Shift {
    if (DAY_SHIFT_START..NIGHT_SHIFT_START).contains(&now.hour()) {
        Shift::Day
    } else {
        Shift::Night
    }
}

/// Wall-clock end of the shift `now` falls in. `None` only when the boundary
/// does not exist in the local zone (DST gap).
pub fn shift_end<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let hour = now.hour();
    let (date, end_hour) = if (DAY_SHIFT_START..NIGHT_SHIFT_START).contains(&hour) {
        (now.date_naive(), NIGHT_SHIFT_START)
    } else if hour >= NIGHT_SHIFT_START {
        (now.date_naive().succ_opt()?, DAY_SHIFT_START)
    } else {
        (now.date_naive(), DAY_SHIFT_START)
    };
    let naive = date.and_time(NaiveTime::from_hms_opt(end_hour, 0, 0)?);
    now.timezone().from_local_datetime(&naive).earliest()
}

/// Countdown to the end of the current shift as `HH:MM:SS`.
pub fn time_left_in_shift<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    let left = shift_end(now)
        .map(|end| end.signed_duration_since(now.clone()))
        .unwrap_or_else(Duration::zero);
    format_hms(left.num_milliseconds() as f64 / 1000.0)
}
