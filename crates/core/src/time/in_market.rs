use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::HashSet;

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

// NSE closes at 15:30 IST; the daily snapshot runs once evening data has settled.
const DEFAULT_DAILY_HOUR_IST: u32 = 18;
const DEFAULT_DAILY_MINUTE_IST: u32 = 30;

// Fixed-date national holidays the exchange always observes, as (month, day).
const NATIONAL_HOLIDAYS: [(u32, u32); 3] = [(1, 26), (8, 15), (10, 2)];

pub fn ist() -> anyhow::Result<FixedOffset> {
    FixedOffset::east_opt(IST_OFFSET_SECS).context("invalid IST offset")
}

/// Calendar date in India for the given instant.
pub fn today_ist(now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    Ok(now_utc.with_timezone(&ist()?).date_naive())
}

/// Parses `HH:MM`; `None` gives the default post-close time.
pub fn parse_daily_at(s: Option<&str>) -> anyhow::Result<NaiveTime> {
    match s {
        Some(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .with_context(|| format!("invalid daily time {s:?}, expected HH:MM")),
        None => NaiveTime::from_hms_opt(DEFAULT_DAILY_HOUR_IST, DEFAULT_DAILY_MINUTE_IST, 0)
            .context("invalid default daily time"),
    }
}

/// Weekdays that are neither a national holiday nor in the configured `holidays`.
pub fn is_trading_day(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> bool {
    !is_weekend(date) && !is_national_holiday(date) && !holidays.contains(&date)
}

/// First trading-day instant at `at` (IST) strictly after `now_utc`.
pub fn next_run_after(
    now_utc: DateTime<Utc>,
    at: NaiveTime,
    holidays: &HashSet<NaiveDate>,
) -> anyhow::Result<DateTime<Utc>> {
    let tz = ist()?;
    let mut date = today_ist(now_utc)?;

    for _ in 0..=366 {
        if is_trading_day(date, holidays) {
            let fire = tz
                .from_local_datetime(&date.and_time(at))
                .single()
                .context("ambiguous IST local time")?
                .with_timezone(&Utc);
            if fire > now_utc {
                return Ok(fire);
            }
        }
        date = date + Duration::days(1);
    }

    anyhow::bail!("no trading day within a year of {now_utc}")
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn is_national_holiday(date: NaiveDate) -> bool {
    NATIONAL_HOLIDAYS.contains(&(date.month(), date.day()))
}

/// Exchange-specific closures from `NSE_MARKET_HOLIDAYS="YYYY-MM-DD,YYYY-MM-DD"`.
pub fn configured_holidays() -> HashSet<NaiveDate> {
    std::env::var("NSE_MARKET_HOLIDAYS")
        .map(|s| parse_holidays(&s).into_iter().collect())
        .unwrap_or_default()
}

fn parse_holidays(s: &str) -> Vec<NaiveDate> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter_map(|p| match NaiveDate::parse_from_str(p, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                tracing::warn!(value = p, "ignoring malformed holiday date");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evening() -> NaiveTime {
        parse_daily_at(None).unwrap()
    }

    #[test]
    fn ist_date_rolls_over_before_utc() {
        // 2026-10-15 19:00 UTC = 2026-10-16 00:30 IST
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 19, 0, 0).unwrap();
        assert_eq!(today_ist(now).unwrap(), NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
    }

    #[test]
    fn fires_same_day_before_cutoff() {
        // 2026-10-16 (Friday) 09:00 UTC = 14:30 IST
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let next = next_run_after(now, evening(), &HashSet::new()).unwrap();
        // 18:30 IST = 13:00 UTC
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 16, 13, 0, 0).unwrap());
    }

    #[test]
    fn skips_weekend_after_friday_run() {
        // Friday 18:30 IST exactly: the next run is Monday.
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 13, 0, 0).unwrap();
        let next = next_run_after(now, evening(), &HashSet::new()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 19, 13, 0, 0).unwrap());
    }

    #[test]
    fn skips_holidays() {
        let holidays: HashSet<_> = [NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()].into();
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 6, 0, 0).unwrap();
        let next = next_run_after(now, evening(), &holidays).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 20, 13, 0, 0).unwrap());
    }

    #[test]
    fn default_time_is_evening_ist() {
        assert_eq!(evening(), NaiveTime::from_hms_opt(18, 30, 0).unwrap());
    }

    #[test]
    fn national_holidays_hold_in_any_year() {
        // 2035-01-26 is a Friday, 2041-10-02 a Wednesday.
        let none = HashSet::new();
        assert!(!is_trading_day(NaiveDate::from_ymd_opt(2035, 1, 26).unwrap(), &none));
        assert!(!is_trading_day(NaiveDate::from_ymd_opt(2041, 10, 2).unwrap(), &none));
        assert!(is_trading_day(NaiveDate::from_ymd_opt(2035, 1, 25).unwrap(), &none));

        // Thursday 2035-01-25 after the run: Friday the 26th is skipped, so Monday.
        let now = Utc.with_ymd_and_hms(2035, 1, 25, 14, 0, 0).unwrap();
        let next = next_run_after(now, evening(), &none).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2035, 1, 29, 13, 0, 0).unwrap());
    }

    #[test]
    fn parses_custom_time_and_holiday_list() {
        assert_eq!(
            parse_daily_at(Some("15:45")).unwrap(),
            NaiveTime::from_hms_opt(15, 45, 0).unwrap()
        );
        assert!(parse_daily_at(Some("4pm")).is_err());
        assert_eq!(
            parse_holidays("2026-11-09, bad ,,2026-12-25"),
            vec![
                NaiveDate::from_ymd_opt(2026, 11, 9).unwrap(),
                NaiveDate::from_ymd_opt(2026, 12, 25).unwrap(),
            ]
        );
    }
}
