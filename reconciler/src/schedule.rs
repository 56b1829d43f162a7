use std::time::Duration;

use chrono::{Days, Local, NaiveDateTime, NaiveTime, TimeZone};

pub fn parse_run_at(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
}

/// First moment strictly after `now` whose wall-clock time is `run_at`.
pub fn next_run_after(now: NaiveDateTime, run_at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(run_at);
    if today > now {
        today
    } else {
        now.date()
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(run_at))
            .unwrap_or(today)
    }
}

/// Time to sleep from the local clock until the next `run_at`.
pub fn delay_until_next(run_at: NaiveTime) -> Duration {
    let now = Local::now();
    let next = next_run_after(now.naive_local(), run_at);
    // DST gaps make some local times ambiguous or missing; take the earliest.
    let target = Local
        .from_local_datetime(&next)
        .earliest()
        .map(|t| t.signed_duration_since(now))
        .unwrap_or_else(|| next - now.naive_local());
    target.to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn parses_hh_mm() {
        assert_eq!(parse_run_at("17:20").unwrap(), NaiveTime::from_hms_opt(17, 20, 0).unwrap());
        assert_eq!(parse_run_at(" 08:05 ").unwrap(), NaiveTime::from_hms_opt(8, 5, 0).unwrap());
        assert!(parse_run_at("25:00").is_err());
        assert!(parse_run_at("soon").is_err());
    }

    #[test]
    fn later_today_when_not_yet_passed() {
        let run_at = parse_run_at("17:20").unwrap();
        assert_eq!(next_run_after(at(2025, 6, 2, 9, 0), run_at), at(2025, 6, 2, 17, 20));
    }

    #[test]
    fn tomorrow_when_already_passed_or_exact() {
        let run_at = parse_run_at("17:20").unwrap();
        assert_eq!(next_run_after(at(2025, 6, 2, 17, 20), run_at), at(2025, 6, 3, 17, 20));
        assert_eq!(next_run_after(at(2025, 12, 31, 23, 0), run_at), at(2026, 1, 1, 17, 20));
    }

    #[test]
    fn delay_is_at_most_one_day() {
        let run_at = parse_run_at("00:00").unwrap();
        assert!(delay_until_next(run_at) <= Duration::from_secs(25 * 3600));
    }
}
