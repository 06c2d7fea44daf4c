//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use chrono::Utc;
use lending_core::{
    CalendarDate, HolidayCalendar, InsightService, LendingRecordStore, ReminderScheduler,
    StaffDirectory,
};
use std::sync::Arc;
use tokio::sync::Mutex;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LendingRecordStore>,
    pub config: Arc<Config>,
    pub calendar: Arc<HolidayCalendar>,
    pub scheduler: Arc<ReminderScheduler>,
    pub staff: Arc<dyn StaffDirectory>,
    pub insight_adapter: Arc<dyn InsightService>,
    /// Held for the whole of a reminder run; at most one run is in flight.
    pub run_guard: Arc<Mutex<()>>,
}

impl AppState {
    /// Today's date in the configured business time zone.
    pub fn today(&self) -> CalendarDate {
        Utc::now()
            .with_timezone(&self.config.business_utc_offset)
            .date_naive()
    }
}
