//! services/api/src/adapters/files.rs
//!
//! Loaders for the JSON files that configure the holiday calendar and the
//! staff directory.

use std::path::Path;

use lending_core::{CalendarConfig, HolidayCalendar, Staff, StaticStaffDirectory};
use tracing::info;

use crate::error::ApiError;

/// Loads a calendar from `path`, or the Japanese preset when no path is given.
pub fn load_calendar(path: Option<&Path>) -> Result<HolidayCalendar, ApiError> {
    let Some(path) = path else {
        info!("No HOLIDAY_CALENDAR_PATH set; using the Japanese holiday calendar.");
        return Ok(HolidayCalendar::japan());
    };
    let text = std::fs::read_to_string(path)?;
    let config: CalendarConfig = serde_json::from_str(&text)?;
    info!(
        "Loaded {} holiday rules from {}",
        config.rules.len(),
        path.display()
    );
    Ok(HolidayCalendar::new(config)?)
}

/// Loads a JSON array of staff entries, or an empty directory when no path is given.
pub fn load_staff_directory(path: Option<&Path>) -> Result<StaticStaffDirectory, ApiError> {
    let Some(path) = path else {
        return Ok(StaticStaffDirectory::default());
    };
    let text = std::fs::read_to_string(path)?;
    let staff: Vec<Staff> = serde_json::from_str(&text)?;
    info!("Loaded {} staff entries from {}", staff.len(), path.display());
    Ok(StaticStaffDirectory::new(staff))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lending_core::StaffDirectory;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", uuid::Uuid::new_v4(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_to_japan_without_a_path() {
        let calendar = load_calendar(None).unwrap();
        let coming_of_age = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert!(calendar.is_non_business_day(coming_of_age));
    }

    #[test]
    fn loads_calendar_file() {
        let path = temp_file(
            "calendar.json",
            r#"{"weekend": ["Fri", "Sat"], "rules": [{"type": "fixed", "name": "Founding", "month": 3, "day": 1}]}"#,
        );
        let calendar = load_calendar(Some(&path)).unwrap();
        assert_eq!(
            calendar.holiday_name(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            Some("Founding")
        );
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn invalid_calendar_rules_are_rejected() {
        let path = temp_file(
            "bad-calendar.json",
            r#"{"rules": [{"type": "nth_weekday", "name": "Broken", "month": 7, "weekday": "Mon", "n": 0}]}"#,
        );
        assert!(matches!(load_calendar(Some(&path)), Err(ApiError::Calendar(_))));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn loads_staff_directory_file() {
        let path = temp_file(
            "staff.json",
            r#"[{"id": "1234", "name": "山田 太郎", "email": "yamada@example.com"}]"#,
        );
        let directory = load_staff_directory(Some(&path)).unwrap();
        assert_eq!(
            directory.find_by_id("1234").map(|s| s.name),
            Some("山田 太郎".to_string())
        );
        std::fs::remove_file(path).ok();
    }
}
