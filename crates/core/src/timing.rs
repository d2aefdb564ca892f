//! Production timing arithmetic behind each machine card.
//!
//! Every function here is total: malformed or missing inputs degrade to zero
//! or a placeholder, never to an error. A cycle time of zero means "unknown".

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::machine::MachineStatus;

static MINUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)m").expect("valid regex"));
static SECONDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)s").expect("valid regex"));
static BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?|\.\d+)").expect("valid regex"));

fn capture(re: &Regex, input: &str) -> Option<f64> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parse `"2m 30s"`, `"2.5m"`, `"90s"` or a bare `"150"` into seconds.
pub fn parse_cycle_time(input: &str) -> f64 {
    let minutes = capture(&MINUTES, input);
    let seconds = capture(&SECONDS, input);
    let total = minutes.unwrap_or(0.0) * 60.0 + seconds.unwrap_or(0.0);
    if total > 0.0 {
        return total;
    }
    capture(&BARE, input).unwrap_or(0.0)
}

/// Whole parts one bar yields after the cut-off remnant. Zero disables stock estimates.
pub fn parts_per_bar(workpiece: Option<f64>, cutoff: Option<f64>, part: Option<f64>) -> u32 {
    match (workpiece, part) {
        (Some(workpiece), Some(part)) if workpiece > 0.0 && part > 0.0 => {
            let usable = workpiece - cutoff.unwrap_or(0.0);
            if usable <= 0.0 {
                0
            } else {
                (usable / part).floor() as u32
            }
        }
        _ => 0,
    }
}

pub fn remaining_seconds(goal: u64, count: u64, cycle_seconds: f64) -> f64 {
    let remaining = goal.saturating_sub(count);
    if remaining == 0 || cycle_seconds <= 0.0 {
        return 0.0;
    }
    remaining as f64 * cycle_seconds
}

/// `HH:MM:SS`, hours unbounded.
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds.floor() as u64 } else { 0 };
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

pub fn progress_percent(count: u64, goal: u64) -> f64 {
    (count as f64 / goal.max(1) as f64 * 100.0).min(100.0)
}

#[derive(Debug, Clone)]
pub enum Completion<Tz: TimeZone> {
    /// Goal met; nothing left to run.
    Completed,
    /// Parts remain but the cycle time is unknown.
    Unknown,
    At(DateTime<Tz>),
}

impl<Tz: TimeZone> Completion<Tz> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Completion::Completed)
    }
}

impl<Tz: TimeZone> fmt::Display for Completion<Tz>
where
    Tz::Offset: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Completed => f.write_str("Completed"),
            Completion::Unknown => f.write_str("---"),
            Completion::At(at) => write!(f, "{}", at.format("%a. %d %b")),
        }
    }
}

pub fn completion_estimate<Tz: TimeZone>(
    goal: u64,
    count: u64,
    cycle_seconds: f64,
    now: DateTime<Tz>,
) -> Completion<Tz> {
    if goal.saturating_sub(count) == 0 {
        return Completion::Completed;
    }
    let remaining = remaining_seconds(goal, count, cycle_seconds);
    if remaining <= 0.0 {
        return Completion::Unknown;
    }
    let delta = chrono::Duration::milliseconds((remaining * 1000.0).round() as i64);
    match now.checked_add_signed(delta) {
        Some(at) => Completion::At(at),
        None => Completion::Unknown,
    }
}

/// Time left on the part currently in the spindle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PartTimer {
    Inactive,
    Remaining(f64),
}

impl fmt::Display for PartTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PartTimer::Inactive => f.write_str("0s"),
            PartTimer::Remaining(seconds) => {
                let tenths = (seconds.max(0.0) * 10.0).round() as u64;
                let minutes = tenths / 600;
                let secs = (tenths / 10) % 60;
                let tenth = tenths % 10;
                if minutes > 0 {
                    write!(f, "{minutes}m {secs}.{tenth}s")
                } else {
                    write!(f, "{secs}.{tenth}s")
                }
            }
        }
    }
}

/// Saw-tooth from `cycle_seconds` down toward zero, restarting at every counted part.
///
/// Anchoring on `last_part_at` ties this timer to the same clock as the part
/// counter, so it cannot drift away from the telemetry increments.
pub fn part_timer<Tz: TimeZone>(
    status: MachineStatus,
    cycle_seconds: f64,
    last_part_at: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> PartTimer {
    if status != MachineStatus::Running || cycle_seconds <= 0.0 {
        return PartTimer::Inactive;
    }
    let now = now.with_timezone(&Utc);
    let anchor = last_part_at.unwrap_or(now);
    let elapsed = (now - anchor).num_milliseconds().max(0) as f64 / 1000.0;
    PartTimer::Remaining(cycle_seconds - elapsed % cycle_seconds)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StockEstimate {
    TimeLeft { hours: u64, minutes: u64 },
    Percent(f64),
}

impl fmt::Display for StockEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StockEstimate::TimeLeft { hours, minutes } if hours > 0 => {
                write!(f, "{hours}h {minutes}m left")
            }
            StockEstimate::TimeLeft { minutes, .. } => write!(f, "{minutes}m left"),
            StockEstimate::Percent(level) => write!(f, "{:.0}%", level),
        }
    }
}

pub fn stock_estimate(
    status: MachineStatus,
    cycle_seconds: f64,
    parts_per_bar: u32,
    stock_level: f64,
) -> StockEstimate {
    if status == MachineStatus::Running && cycle_seconds > 0.0 && parts_per_bar > 0 {
        let bar_seconds = parts_per_bar as f64 * cycle_seconds;
        let remaining = (stock_level.clamp(0.0, 100.0) / 100.0 * bar_seconds).floor() as u64;
        return StockEstimate::TimeLeft {
            hours: remaining / 3600,
            minutes: (remaining % 3600) / 60,
        };
    }
    StockEstimate::Percent(stock_level)
}

/// `"24 Jan, 14:05"` for a parseable timestamp, `--/--` when empty, the input
/// verbatim otherwise.
pub fn format_start_time<Tz>(raw: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "--/--".to_string();
    }
    let parsed = DateTime::parse_from_rfc3339(trimmed)
        .map(|at| at.with_timezone(tz))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        });
    match parsed {
        Some(at) => at.format("%-d %b, %H:%M").to_string(),
        None => raw.to_string(),
    }
}

/// Percent deviation of the measured cycle from the planned one. `None` when
/// either side is unknown.
pub fn cycle_variance(planned: &str, actual: &str) -> Option<f64> {
    let planned = parse_cycle_time(planned);
    let actual = parse_cycle_time(actual);
    if planned <= 0.0 || actual <= 0.0 {
        return None;
    }
    Some((actual - planned) / planned * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 24, h, m, s).unwrap()
    }

    #[test]
    fn parses_cycle_time_formats() {
        assert_eq!(parse_cycle_time("2m 30s"), 150.0);
        assert_eq!(parse_cycle_time("150"), 150.0);
        assert_eq!(parse_cycle_time("2.5m"), 150.0);
        assert_eq!(parse_cycle_time("45s"), 45.0);
        assert_eq!(parse_cycle_time("1.5s"), 1.5);
        assert_eq!(parse_cycle_time("3m"), 180.0);
    }

    #[test]
    fn unparseable_cycle_time_is_zero() {
        assert_eq!(parse_cycle_time(""), 0.0);
        assert_eq!(parse_cycle_time("fast"), 0.0);
        assert_eq!(parse_cycle_time("-5"), 0.0);
        assert_eq!(parse_cycle_time("0m 0s"), 0.0);
    }

    #[test]
    fn parts_per_bar_uses_usable_length() {
        assert_eq!(parts_per_bar(Some(3000.0), Some(300.0), Some(27.0)), 100);
        assert_eq!(parts_per_bar(Some(3000.0), None, Some(30.0)), 100);
        assert_eq!(parts_per_bar(None, Some(300.0), Some(27.0)), 0);
        assert_eq!(parts_per_bar(Some(3000.0), Some(300.0), Some(0.0)), 0);
        assert_eq!(parts_per_bar(Some(200.0), Some(300.0), Some(10.0)), 0);
    }

    #[test]
    fn remaining_time_for_three_parts_at_150s() {
        let cycle = parse_cycle_time("2m 30s");
        assert_eq!(cycle, 150.0);
        let remaining = remaining_seconds(10, 7, cycle);
        assert_eq!(remaining, 450.0);
        assert_eq!(format_hms(remaining), "00:07:30");
    }

    #[test]
    fn met_goal_is_completed_and_never_negative() {
        assert_eq!(remaining_seconds(10, 12, 150.0), 0.0);
        assert_eq!(format_hms(remaining_seconds(10, 10, 150.0)), "00:00:00");
        assert!(completion_estimate(10, 12, 150.0, at(8, 0, 0)).is_completed());
        assert!(completion_estimate(0, 0, 0.0, at(8, 0, 0)).is_completed());
    }

    #[test]
    fn unknown_cycle_does_not_claim_completion() {
        let estimate = completion_estimate(10, 2, 0.0, at(8, 0, 0));
        assert!(!estimate.is_completed());
        assert_eq!(estimate.to_string(), "---");
        assert_eq!(format_hms(remaining_seconds(10, 2, 0.0)), "00:00:00");
    }

    #[test]
    fn completion_date_projects_from_now() {
        // 100 parts * 1h = 100h after Wed 24 Jan 08:00 is Sun 28 Jan 12:00.
        let estimate = completion_estimate(100, 0, 3600.0, at(8, 0, 0));
        assert_eq!(estimate.to_string(), "Sun. 28 Jan");
    }

    #[test]
    fn hours_are_unbounded() {
        assert_eq!(format_hms(360_000.0 + 61.0), "100:01:01");
    }

    #[test]
    fn part_timer_saw_tooth_restarts_each_cycle() {
        let anchor = at(8, 0, 0);
        let running = MachineStatus::Running;
        assert_eq!(part_timer(running, 10.0, Some(anchor), &anchor), PartTimer::Remaining(10.0));
        let later = anchor + Duration::milliseconds(2_500);
        assert_eq!(part_timer(running, 10.0, Some(anchor), &later).to_string(), "7.5s");
        let wrapped = anchor + Duration::milliseconds(12_000);
        assert_eq!(part_timer(running, 10.0, Some(anchor), &wrapped).to_string(), "8.0s");
        let long = anchor + Duration::milliseconds(30_300);
        assert_eq!(part_timer(running, 150.0, Some(anchor), &long).to_string(), "1m 59.7s");
    }

    #[test]
    fn part_timer_inactive_unless_running_with_cycle() {
        let now = at(8, 0, 0);
        assert_eq!(part_timer(MachineStatus::Paused, 10.0, None, &now), PartTimer::Inactive);
        assert_eq!(part_timer(MachineStatus::Running, 0.0, None, &now).to_string(), "0s");
    }

    #[test]
    fn stock_estimate_falls_back_to_percentage() {
        let running = MachineStatus::Running;
        // 100 parts per bar * 150s = 15000s per bar; half a bar = 2h 5m.
        assert_eq!(stock_estimate(running, 150.0, 100, 50.0).to_string(), "2h 5m left");
        assert_eq!(stock_estimate(running, 6.0, 100, 50.0).to_string(), "5m left");
        assert_eq!(stock_estimate(running, 150.0, 0, 42.0).to_string(), "42%");
        let idle = stock_estimate(MachineStatus::Idle, 150.0, 100, 42.0);
        assert_eq!(idle, StockEstimate::Percent(42.0));
    }

    #[test]
    fn start_time_passes_invalid_input_through() {
        assert_eq!(format_start_time("2024-01-24T14:05:00Z", &Utc), "24 Jan, 14:05");
        assert_eq!(format_start_time("2024-01-24T14:05:00", &Utc), "24 Jan, 14:05");
        assert_eq!(format_start_time("last tuesday", &Utc), "last tuesday");
        assert_eq!(format_start_time("", &Utc), "--/--");
    }

    #[test]
    fn progress_clamps_to_full() {
        assert_eq!(progress_percent(5, 10), 50.0);
        assert_eq!(progress_percent(15, 10), 100.0);
        assert_eq!(progress_percent(0, 0), 0.0);
    }

    #[test]
    fn cycle_variance_compares_actual_to_planned() {
        assert_eq!(cycle_variance("2m", "2m 30s"), Some(25.0));
        assert_eq!(cycle_variance("", "2m"), None);
    }

    proptest! {
        #[test]
        fn minutes_and_seconds_sum(m in 0u32..500, s in 0u32..60) {
            prop_assume!(m + s > 0);
            let parsed = parse_cycle_time(&format!("{m}m {s}s"));
            prop_assert_eq!(parsed, f64::from(m) * 60.0 + f64::from(s));
        }

        #[test]
        fn bare_numbers_are_seconds(n in 1u32..100_000) {
            prop_assert_eq!(parse_cycle_time(&n.to_string()), f64::from(n));
        }

        #[test]
        fn alphabetic_input_is_zero(text in "[a-ln-rt-z ]{0,12}") {
            prop_assert_eq!(parse_cycle_time(&text), 0.0);
        }

        #[test]
        fn remaining_never_negative(
            goal in 0u64..10_000,
            count in 0u64..20_000,
            cycle in 0.0f64..600.0
        ) {
            let remaining = remaining_seconds(goal, count, cycle);
            prop_assert!(remaining >= 0.0);
            if count >= goal {
                prop_assert_eq!(format_hms(remaining), "00:00:00");
            }
        }
    }
}
