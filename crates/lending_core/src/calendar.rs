//! crates/lending_core/src/calendar.rs
//!
//! Business-day calendar: classifies a date as a business day or not, from a
//! declarative table of holiday rules plus a weekend definition.
//!
//! Rules are data, not control flow. A jurisdiction is just another
//! `CalendarConfig`, and "nth weekday of month" rules are computed exactly for
//! any year instead of being approximated by day-of-month ranges.

use std::collections::HashSet;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::CalendarDate;

/// Name reported for days that are off only because of substitute observance.
pub const SUBSTITUTE_HOLIDAY_NAME: &str = "Substitute Holiday";

// A run of consecutive holidays longer than this is never looked through.
const MAX_SUBSTITUTE_LOOKBACK: usize = 7;

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    /// A rule or weekend definition was rejected while building a calendar.
    #[error("Invalid calendar configuration: {0}")]
    InvalidConfiguration(String),

    /// A business-day walk ran past its iteration bound, which means the
    /// calendar marks (almost) every day as non-business.
    #[error("Walking {offset} business days from {from} exceeded {limit} calendar days")]
    WalkOverflow {
        from: CalendarDate,
        offset: i64,
        limit: u64,
    },
}

//=========================================================================================
// Configuration
//=========================================================================================

/// One entry of a jurisdiction's holiday table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HolidayRule {
    /// The same month/day every year.
    Fixed { name: String, month: u32, day: u32 },
    /// The `n`th occurrence (1-based) of `weekday` in `month`, e.g. the third Monday of July.
    NthWeekday {
        name: String,
        month: u32,
        weekday: Weekday,
        n: u8,
    },
    /// The last occurrence of `weekday` in `month`.
    LastWeekday {
        name: String,
        month: u32,
        weekday: Weekday,
    },
}

impl HolidayRule {
    pub fn name(&self) -> &str {
        match self {
            HolidayRule::Fixed { name, .. }
            | HolidayRule::NthWeekday { name, .. }
            | HolidayRule::LastWeekday { name, .. } => name,
        }
    }

    /// The date this rule falls on in `year`, if it exists that year.
    pub fn date_in(&self, year: i32) -> Option<CalendarDate> {
        match *self {
            HolidayRule::Fixed { month, day, .. } => NaiveDate::from_ymd_opt(year, month, day),
            HolidayRule::NthWeekday {
                month, weekday, n, ..
            } => nth_weekday_of_month(year, month, weekday, n),
            HolidayRule::LastWeekday { month, weekday, .. } => {
                last_weekday_of_month(year, month, weekday)
            }
        }
    }

    pub fn matches(&self, date: CalendarDate) -> bool {
        self.date_in(date.year()) == Some(date)
    }

    fn validate(&self) -> Result<(), CalendarError> {
        let month = match *self {
            HolidayRule::Fixed { month, .. }
            | HolidayRule::NthWeekday { month, .. }
            | HolidayRule::LastWeekday { month, .. } => month,
        };
        if !(1..=12).contains(&month) {
            return Err(CalendarError::InvalidConfiguration(format!(
                "rule '{}' has month {} outside 1..=12",
                self.name(),
                month
            )));
        }
        match *self {
            // 2024 is a leap year, so Feb 29 is accepted and simply skipped in other years.
            HolidayRule::Fixed { month, day, .. } if NaiveDate::from_ymd_opt(2024, month, day).is_none() => {
                Err(CalendarError::InvalidConfiguration(format!(
                    "rule '{}' has day {} which never exists in month {}",
                    self.name(),
                    day,
                    month
                )))
            }
            HolidayRule::NthWeekday { n, .. } if !(1..=5).contains(&n) => {
                Err(CalendarError::InvalidConfiguration(format!(
                    "rule '{}' has occurrence {} outside 1..=5",
                    self.name(),
                    n
                )))
            }
            _ => Ok(()),
        }
    }
}

fn default_weekend() -> Vec<Weekday> {
    vec![Weekday::Sat, Weekday::Sun]
}

/// A jurisdiction's calendar: weekend days, holiday rules, and whether
/// holidays falling on a Sunday move to the next free weekday.
///
/// This is the raw, unchecked form. Only a `HolidayCalendar` is known to be
/// valid; build one with `HolidayCalendar::new` or deserialize it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_weekend")]
    pub weekend: Vec<Weekday>,
    #[serde(default)]
    pub rules: Vec<HolidayRule>,
    #[serde(default)]
    pub substitute_holidays: bool,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            weekend: default_weekend(),
            rules: Vec::new(),
            substitute_holidays: false,
        }
    }
}

impl CalendarConfig {
    /// National holidays of Japan that follow fixed or "Happy Monday" rules.
    pub fn japan() -> Self {
        let fixed = |name: &str, month, day| HolidayRule::Fixed {
            name: name.to_string(),
            month,
            day,
        };
        let monday = |name: &str, month, n| HolidayRule::NthWeekday {
            name: name.to_string(),
            month,
            weekday: Weekday::Mon,
            n,
        };
        Self {
            weekend: default_weekend(),
            rules: vec![
                fixed("New Year's Day", 1, 1),
                monday("Coming of Age Day", 1, 2),
                fixed("National Foundation Day", 2, 11),
                fixed("Emperor's Birthday", 2, 23),
                fixed("Showa Day", 4, 29),
                fixed("Constitution Memorial Day", 5, 3),
                fixed("Greenery Day", 5, 4),
                fixed("Children's Day", 5, 5),
                monday("Marine Day", 7, 3),
                fixed("Mountain Day", 8, 11),
                monday("Respect for the Aged Day", 9, 3),
                monday("Sports Day", 10, 2),
                fixed("Culture Day", 11, 3),
                fixed("Labour Thanksgiving Day", 11, 23),
            ],
            substitute_holidays: true,
        }
    }
}

//=========================================================================================
// HolidayCalendar
//=========================================================================================

/// A validated calendar. Every query is a pure function of the date and the config.
///
/// Deserializes from the same JSON as `CalendarConfig`, running the checks of `new`.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "CalendarConfig")]
pub struct HolidayCalendar {
    config: CalendarConfig,
}

impl TryFrom<CalendarConfig> for HolidayCalendar {
    type Error = CalendarError;

    fn try_from(config: CalendarConfig) -> Result<Self, Self::Error> {
        Self::new(config)
    }
}

impl HolidayCalendar {
    /// Validates `config` and builds a calendar from it.
    pub fn new(config: CalendarConfig) -> Result<Self, CalendarError> {
        let mut seen = HashSet::new();
        for day in &config.weekend {
            if !seen.insert(*day) {
                return Err(CalendarError::InvalidConfiguration(format!(
                    "weekend lists {} more than once",
                    day
                )));
            }
        }
        for rule in &config.rules {
            rule.validate()?;
        }
        Ok(Self { config })
    }

    /// Saturday and Sunday off, no holidays.
    pub fn weekends_only() -> Self {
        Self {
            config: CalendarConfig::default(),
        }
    }

    pub fn japan() -> Self {
        Self {
            config: CalendarConfig::japan(),
        }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn is_weekend(&self, date: CalendarDate) -> bool {
        self.config.weekend.contains(&date.weekday())
    }

    pub fn is_non_business_day(&self, date: CalendarDate) -> bool {
        self.is_weekend(date) || self.holiday_name(date).is_some()
    }

    pub fn is_business_day(&self, date: CalendarDate) -> bool {
        !self.is_non_business_day(date)
    }

    /// The holiday observed on `date`, ignoring plain weekends.
    pub fn holiday_name(&self, date: CalendarDate) -> Option<&str> {
        if let Some(rule) = self.rule_for(date) {
            return Some(rule.name());
        }
        if self.is_substitute_holiday(date) {
            return Some(SUBSTITUTE_HOLIDAY_NAME);
        }
        None
    }

    /// Every holiday observed in `year`, in date order.
    pub fn holidays_in_year(&self, year: i32) -> Vec<(CalendarDate, String)> {
        let Some(first) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            return Vec::new();
        };
        first
            .iter_days()
            .take_while(|d| d.year() == year)
            .filter_map(|d| self.holiday_name(d).map(|name| (d, name.to_string())))
            .collect()
    }

    fn rule_for(&self, date: CalendarDate) -> Option<&HolidayRule> {
        self.config.rules.iter().find(|rule| rule.matches(date))
    }

    // A weekday that is not itself a holiday is observed as a substitute when
    // the run of holidays ending the day before it contains a Sunday.
    fn is_substitute_holiday(&self, date: CalendarDate) -> bool {
        if !self.config.substitute_holidays || self.rule_for(date).is_some() {
            return false;
        }
        let mut day = date;
        for _ in 0..MAX_SUBSTITUTE_LOOKBACK {
            let Some(prev) = day.pred_opt() else {
                return false;
            };
            if self.rule_for(prev).is_none() {
                return false;
            }
            if prev.weekday() == Weekday::Sun {
                return true;
            }
            day = prev;
        }
        false
    }
}

//=========================================================================================
// Weekday-of-month helpers
//=========================================================================================

/// The first date in `month` of `year` that falls on `weekday`.
pub fn first_weekday_occurrence(year: i32, month: u32, weekday: Weekday) -> Option<CalendarDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let delta = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    first.checked_add_days(Days::new(u64::from(delta)))
}

/// The `n`th (1-based) `weekday` of the month, or `None` when the month has fewer.
pub fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<CalendarDate> {
    if n == 0 {
        return None;
    }
    let first = first_weekday_occurrence(year, month, weekday)?;
    let date = first.checked_add_days(Days::new(7 * (u64::from(n) - 1)))?;
    (date.month() == month).then_some(date)
}

pub fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<CalendarDate> {
    let next_month_start = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = next_month_start.pred_opt()?;
    let delta = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    last.checked_sub_days(Days::new(u64::from(delta)))
}
