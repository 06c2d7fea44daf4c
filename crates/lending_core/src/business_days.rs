//! crates/lending_core/src/business_days.rs
//!
//! Signed business-day arithmetic on top of a `HolidayCalendar`.
//!
//! There is exactly one walker. "N business days before" and "N business days
//! after" differ only in the sign of the offset.

use crate::calendar::{CalendarError, HolidayCalendar};
use crate::domain::CalendarDate;

/// Calendar days allowed per requested business day before a walk is abandoned.
pub const WALK_BOUND_FACTOR: u64 = 21;

/// Shifts `date` by `n` business days.
///
/// `n == 0` returns `date` unchanged, even on a non-business day. Otherwise the
/// walk moves one calendar day at a time and counts a step only when the day
/// it lands on is a business day.
pub fn offset_by_business_days(
    calendar: &HolidayCalendar,
    date: CalendarDate,
    n: i64,
) -> Result<CalendarDate, CalendarError> {
    if n == 0 {
        return Ok(date);
    }

    let wanted = n.unsigned_abs();
    let limit = WALK_BOUND_FACTOR.saturating_mul(wanted);
    let overflow = || CalendarError::WalkOverflow {
        from: date,
        offset: n,
        limit,
    };

    let mut current = date;
    let mut counted = 0u64;
    let mut walked = 0u64;
    while counted < wanted {
        if walked >= limit {
            return Err(overflow());
        }
        current = if n > 0 {
            current.succ_opt()
        } else {
            current.pred_opt()
        }
        .ok_or_else(overflow)?;
        walked += 1;
        if calendar.is_business_day(current) {
            counted += 1;
        }
    }
    Ok(current)
}

/// True when `today` is exactly `n` business days before `target`.
pub fn is_exactly_n_business_days_before(
    calendar: &HolidayCalendar,
    target: CalendarDate,
    today: CalendarDate,
    n: u32,
) -> Result<bool, CalendarError> {
    Ok(today == offset_by_business_days(calendar, target, -i64::from(n))?)
}

/// True when `today` is exactly `n` business days after `target`.
pub fn is_exactly_n_business_days_after(
    calendar: &HolidayCalendar,
    target: CalendarDate,
    today: CalendarDate,
    n: u32,
) -> Result<bool, CalendarError> {
    Ok(today == offset_by_business_days(calendar, target, i64::from(n))?)
}

pub fn is_exactly_one_business_day_before(
    calendar: &HolidayCalendar,
    target: CalendarDate,
    today: CalendarDate,
) -> Result<bool, CalendarError> {
    is_exactly_n_business_days_before(calendar, target, today, 1)
}

pub fn is_exactly_one_business_day_after(
    calendar: &HolidayCalendar,
    target: CalendarDate,
    today: CalendarDate,
) -> Result<bool, CalendarError> {
    is_exactly_n_business_days_after(calendar, target, today, 1)
}

/// Signed count of business days in `(from, to]`, negative when `to < from`.
pub fn business_days_between(calendar: &HolidayCalendar, from: CalendarDate, to: CalendarDate) -> i64 {
    if from == to {
        return 0;
    }
    let (start, end, sign) = if from < to { (from, to, 1) } else { (to, from, -1) };
    let count = start
        .iter_days()
        .skip(1)
        .take_while(|d| *d <= end)
        .filter(|d| calendar.is_business_day(*d))
        .count();
    sign * count as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarConfig;
    use chrono::{NaiveDate, Weekday};

    fn date(y: i32, m: u32, d: u32) -> CalendarDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn zero_offset_returns_date_even_on_weekend() {
        let cal = HolidayCalendar::weekends_only();
        let saturday = date(2024, 1, 6);
        assert_eq!(offset_by_business_days(&cal, saturday, 0), Ok(saturday));
    }

    #[test]
    fn one_business_day_before_skips_weekend() {
        let cal = HolidayCalendar::weekends_only();
        assert_eq!(offset_by_business_days(&cal, date(2024, 1, 9), -1), Ok(date(2024, 1, 8)));
        assert_eq!(offset_by_business_days(&cal, date(2024, 1, 8), -1), Ok(date(2024, 1, 5)));
    }

    #[test]
    fn forward_walk_counts_landed_business_days() {
        let cal = HolidayCalendar::weekends_only();
        // Friday + 1 => Monday, Friday + 6 => the following Monday.
        assert_eq!(offset_by_business_days(&cal, date(2024, 1, 5), 1), Ok(date(2024, 1, 8)));
        assert_eq!(offset_by_business_days(&cal, date(2024, 1, 5), 6), Ok(date(2024, 1, 15)));
        // Starting on a Saturday, the first business day landed on is Monday.
        assert_eq!(offset_by_business_days(&cal, date(2024, 1, 6), 1), Ok(date(2024, 1, 8)));
    }

    #[test]
    fn holidays_are_skipped() {
        let cal = HolidayCalendar::japan();
        // Monday 2024-01-08 is Coming of Age Day, so Tuesday's previous business day is Friday.
        assert_eq!(offset_by_business_days(&cal, date(2024, 1, 9), -1), Ok(date(2024, 1, 5)));
        // Golden Week 2026: Thursday 4/30 -> Thursday 5/7.
        assert_eq!(offset_by_business_days(&cal, date(2026, 4, 30), 2), Ok(date(2026, 5, 7)));
    }

    #[test]
    fn round_trip_from_business_days() {
        let cal = HolidayCalendar::japan();
        let start = date(2024, 1, 2);
        for day in start.iter_days().take(400).filter(|d| cal.is_business_day(*d)) {
            for n in 0..12 {
                let there = offset_by_business_days(&cal, day, n).unwrap();
                assert_eq!(offset_by_business_days(&cal, there, -n), Ok(day), "{day} by {n}");
            }
        }
    }

    #[test]
    fn before_date_is_unique_per_target() {
        let cal = HolidayCalendar::weekends_only();
        let target = date(2024, 1, 8);
        let hits: Vec<_> = date(2023, 12, 25)
            .iter_days()
            .take(21)
            .filter(|d| is_exactly_one_business_day_before(&cal, target, *d).unwrap())
            .collect();
        assert_eq!(hits, vec![date(2024, 1, 5)]);
    }

    #[test]
    fn friday_due_date_is_followed_by_monday() {
        let cal = HolidayCalendar::weekends_only();
        let friday = date(2024, 1, 12);
        assert_eq!(is_exactly_one_business_day_after(&cal, friday, date(2024, 1, 15)), Ok(true));
        assert_eq!(is_exactly_one_business_day_after(&cal, friday, date(2024, 1, 13)), Ok(false));
        assert_eq!(is_exactly_one_business_day_after(&cal, friday, date(2024, 1, 14)), Ok(false));
    }

    #[test]
    fn n_day_predicates_share_the_walker() {
        let cal = HolidayCalendar::weekends_only();
        let target = date(2024, 1, 10); // Wednesday
        assert_eq!(is_exactly_n_business_days_before(&cal, target, date(2024, 1, 5), 3), Ok(true));
        assert_eq!(is_exactly_n_business_days_after(&cal, target, date(2024, 1, 15), 3), Ok(true));
    }

    #[test]
    fn all_days_off_overflows() {
        let cal = HolidayCalendar::new(CalendarConfig {
            weekend: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
            ..CalendarConfig::default()
        })
        .unwrap();
        let from = date(2024, 1, 9);
        assert_eq!(
            offset_by_business_days(&cal, from, -2),
            Err(CalendarError::WalkOverflow {
                from,
                offset: -2,
                limit: 42,
            })
        );
    }

    #[test]
    fn counts_business_days_between_dates() {
        let cal = HolidayCalendar::weekends_only();
        assert_eq!(business_days_between(&cal, date(2024, 1, 5), date(2024, 1, 8)), 1);
        assert_eq!(business_days_between(&cal, date(2024, 1, 8), date(2024, 1, 5)), -1);
        assert_eq!(business_days_between(&cal, date(2024, 1, 1), date(2024, 1, 15)), 10);
        assert_eq!(business_days_between(&cal, date(2024, 1, 6), date(2024, 1, 6)), 0);
    }
}
