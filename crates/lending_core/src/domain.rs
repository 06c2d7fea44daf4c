//! crates/lending_core/src/domain.rs
//!
//! Defines the pure, core data structures for the lending tracker.
//! These structs are independent of any database, but serialize to JSON so
//! adapters and config files can share a single shape.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A calendar day with no time-of-day or time-zone component.
/// Compared by (year, month, day) value, never by timestamp.
pub type CalendarDate = NaiveDate;

//=========================================================================================
// Lending Records
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LendingStatus {
    Active,
    Returned,
}

impl LendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LendingStatus::Active => "active",
            LendingStatus::Returned => "returned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(LendingStatus::Active),
            "returned" => Some(LendingStatus::Returned),
            _ => None,
        }
    }
}

/// The two reminder notifications a record can receive.
///
/// `BeforeDue` fires one business day before the expected return date,
/// `AfterDue` one business day after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReminderKind {
    #[serde(rename = "1day_before")]
    BeforeDue,
    #[serde(rename = "1day_after")]
    AfterDue,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 2] = [ReminderKind::BeforeDue, ReminderKind::AfterDue];

    /// The stable wire name, shared by the JSON form and the database column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::BeforeDue => "1day_before",
            ReminderKind::AfterDue => "1day_after",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1day_before" => Some(ReminderKind::BeforeDue),
            "1day_after" => Some(ReminderKind::AfterDue),
            _ => None,
        }
    }

    /// Signed business-day displacement of the trigger from the expected return date.
    pub fn business_day_offset(&self) -> i64 {
        match self {
            ReminderKind::BeforeDue => -1,
            ReminderKind::AfterDue => 1,
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user-supplied part of a new borrowing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLending {
    pub device_id: String,
    pub user_name: String,
    pub employee_id: String,
    pub user_email: String,
    pub start_date: CalendarDate,
    pub expected_return_date: CalendarDate,
    #[serde(default)]
    pub reason: String,
}

/// One borrowing event, active or closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LendingRecord {
    pub id: String,
    pub device_id: String,
    pub user_name: String,
    pub employee_id: String,
    pub user_email: String,
    pub start_date: CalendarDate,
    pub expected_return_date: CalendarDate,
    #[serde(default)]
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub status: LendingStatus,
    #[serde(default)]
    pub reminders_sent: BTreeSet<ReminderKind>,
}

impl LendingRecord {
    /// Opens a new active record with a fresh id and no reminders sent.
    pub fn new(lending: NewLending) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            device_id: lending.device_id,
            user_name: lending.user_name,
            employee_id: lending.employee_id,
            user_email: lending.user_email,
            start_date: lending.start_date,
            expected_return_date: lending.expected_return_date,
            reason: lending.reason,
            created_at: Utc::now(),
            status: LendingStatus::Active,
            reminders_sent: BTreeSet::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == LendingStatus::Active
    }

    pub fn has_sent(&self, kind: ReminderKind) -> bool {
        self.reminders_sent.contains(&kind)
    }

    /// Returns a copy of this record with `kind` added to the sent set.
    pub fn with_reminder_sent(&self, kind: ReminderKind) -> Self {
        let mut updated = self.clone();
        updated.reminders_sent.insert(kind);
        updated
    }

    /// Returns a copy of this record closed as returned.
    pub fn mark_returned(&self) -> Self {
        Self {
            status: LendingStatus::Returned,
            ..self.clone()
        }
    }
}

//=========================================================================================
// Inventory and Staff
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Available,
    Borrowed,
    Returned,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Available => "available",
            DeviceStatus::Borrowed => "borrowed",
            DeviceStatus::Returned => "returned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(DeviceStatus::Available),
            "borrowed" => Some(DeviceStatus::Borrowed),
            "returned" => Some(DeviceStatus::Returned),
            _ => None,
        }
    }
}

/// A lendable device. Owned by the inventory, referenced by records via `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub category: String,
    pub device_number: String,
    pub status: DeviceStatus,
    #[serde(default)]
    pub lending_count: u32,
    pub asset_id: Option<String>,
    pub phone_number: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub id: String,
    pub name: String,
    pub email: String,
}

//=========================================================================================
// Reminder Dispatch and Audit History
//=========================================================================================

/// What gets handed to the mail collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub kind: ReminderKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Lending,
    Return,
    DateChange,
    ReminderSent,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Lending => "lending",
            HistoryAction::Return => "return",
            HistoryAction::DateChange => "date_change",
            HistoryAction::ReminderSent => "reminder_sent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "lending" => Some(HistoryAction::Lending),
            "return" => Some(HistoryAction::Return),
            "date_change" => Some(HistoryAction::DateChange),
            "reminder_sent" => Some(HistoryAction::ReminderSent),
            _ => None,
        }
    }
}

/// One line of the admin audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub record_id: String,
    pub device_id: String,
    pub user_name: String,
    pub employee_id: String,
    pub action: HistoryAction,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn for_record(record: &LendingRecord, action: HistoryAction, detail: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id: record.id.clone(),
            device_id: record.device_id.clone(),
            user_name: record.user_name.clone(),
            employee_id: record.employee_id.clone(),
            action,
            detail,
            recorded_at: Utc::now(),
        }
    }
}
