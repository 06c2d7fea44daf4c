pub mod business_days;
pub mod calendar;
pub mod domain;
pub mod ports;
pub mod reminders;
pub mod scheduler;

pub use business_days::{
    business_days_between, is_exactly_n_business_days_after, is_exactly_n_business_days_before,
    is_exactly_one_business_day_after, is_exactly_one_business_day_before, offset_by_business_days,
};
pub use calendar::{CalendarConfig, CalendarError, HolidayCalendar, HolidayRule};
pub use domain::{
    CalendarDate, Device, DeviceStatus, HistoryAction, HistoryEntry, LendingRecord, LendingStatus,
    NewLending, ReminderKind, ReminderPayload, Staff,
};
pub use ports::{
    InsightService, LendingRecordStore, MailService, PortError, PortResult, StaffDirectory,
    StaticStaffDirectory,
};
pub use reminders::{
    change_return_date, days_overdue, due_reminder, is_overdue, is_week_overdue, trigger_date,
    DefaultReminderTemplate, ReminderResetPolicy, ReminderTemplate,
};
pub use scheduler::{ReminderScheduler, RunReport, SentReminder};
