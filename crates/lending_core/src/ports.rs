//! crates/lending_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the lending tracker's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the record store, the mail provider, the staff directory
//! and the text-generation backend.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{
    CalendarDate, Device, HistoryEntry, LendingRecord, ReminderKind, ReminderPayload, Staff,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailService: Send + Sync {
    /// Delivers one reminder.
    ///
    /// `Ok(false)` is an ordinary delivery failure (network, provider rejection,
    /// timeout). `Err` is reserved for payloads the provider can never accept.
    async fn send(&self, payload: &ReminderPayload) -> PortResult<bool>;
}

/// Persistence for records, inventory and the audit trail.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LendingRecordStore: Send + Sync {
    // --- Lending Records ---
    async fn list_records(&self) -> PortResult<Vec<LendingRecord>>;

    async fn get_record(&self, record_id: &str) -> PortResult<LendingRecord>;

    async fn insert_record(&self, record: &LendingRecord) -> PortResult<()>;

    /// Upserts every record in the snapshot.
    async fn save_records(&self, records: &[LendingRecord]) -> PortResult<()>;

    /// Adds `kind` to a record's sent reminders, only while the record is still
    /// active and still due on `due_on`. Returns whether the record changed.
    ///
    /// Touches nothing else on the record, so returns and date changes made
    /// while a reminder run is in flight are kept.
    async fn mark_reminder_sent(
        &self,
        record_id: &str,
        kind: ReminderKind,
        due_on: CalendarDate,
    ) -> PortResult<bool>;

    // --- Inventory ---
    async fn list_devices(&self) -> PortResult<Vec<Device>>;

    async fn get_device(&self, device_id: &str) -> PortResult<Device>;

    async fn upsert_device(&self, device: &Device) -> PortResult<()>;

    /// `NotFound` when no device has `device_id`.
    async fn delete_device(&self, device_id: &str) -> PortResult<()>;

    // --- Audit History ---
    async fn append_history(&self, entries: &[HistoryEntry]) -> PortResult<()>;

    async fn list_history(&self, limit: i64) -> PortResult<Vec<HistoryEntry>>;
}

/// Looks staff up by employee id.
#[cfg_attr(test, mockall::automock)]
pub trait StaffDirectory: Send + Sync {
    fn find_by_id(&self, staff_id: &str) -> Option<Staff>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InsightService: Send + Sync {
    /// Generates a one-line status comment for administrators.
    async fn generate_status_insight(&self, borrowed: usize, total: usize) -> PortResult<String>;
}

//=========================================================================================
// In-memory Staff Directory
//=========================================================================================

/// A fixed staff list, typically loaded from a JSON file at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticStaffDirectory {
    by_id: HashMap<String, Staff>,
}

impl StaticStaffDirectory {
    pub fn new(staff: Vec<Staff>) -> Self {
        Self {
            by_id: staff.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl StaffDirectory for StaticStaffDirectory {
    fn find_by_id(&self, staff_id: &str) -> Option<Staff> {
        self.by_id.get(staff_id).cloned()
    }
}
