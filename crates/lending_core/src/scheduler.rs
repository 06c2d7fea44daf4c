//! crates/lending_core/src/scheduler.rs
//!
//! The reminder batch: evaluates every record for one evaluation day, sends
//! the reminders that are due, and returns a new snapshot of the records.
//!
//! Callers must not run two batches over the same record set at once. Two
//! overlapping runs could both see a reminder as unsent and deliver it twice.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::calendar::HolidayCalendar;
use crate::domain::{CalendarDate, HistoryAction, HistoryEntry, LendingRecord, ReminderKind, ReminderPayload};
use crate::ports::{MailService, StaffDirectory};
use crate::reminders::{due_reminder, ReminderTemplate};

/// The outcome of one batch run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Every input record, in input order, with successful sends applied.
    pub updated_records: Vec<LendingRecord>,
    pub sent_count: usize,
    /// Due reminders the mail service did not deliver. Retried on the next run.
    pub failed_count: usize,
    /// Records skipped because their business-day walk overflowed.
    pub skipped_count: usize,
    /// One `ReminderSent` entry per delivered reminder.
    pub history: Vec<HistoryEntry>,
    /// The delivered reminders, for stores that persist them one at a time.
    pub sent: Vec<SentReminder>,
}

/// A reminder delivered during a run, and the return date it was computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReminder {
    pub record_id: String,
    pub kind: ReminderKind,
    pub due_on: CalendarDate,
}

pub struct ReminderScheduler {
    calendar: Arc<HolidayCalendar>,
    mailer: Arc<dyn MailService>,
    template: Arc<dyn ReminderTemplate>,
    directory: Option<Arc<dyn StaffDirectory>>,
}

impl ReminderScheduler {
    pub fn new(
        calendar: Arc<HolidayCalendar>,
        mailer: Arc<dyn MailService>,
        template: Arc<dyn ReminderTemplate>,
    ) -> Self {
        Self {
            calendar,
            mailer,
            template,
            directory: None,
        }
    }

    /// Prefer the directory's address over the one typed into the record.
    pub fn with_staff_directory(mut self, directory: Arc<dyn StaffDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn calendar(&self) -> &HolidayCalendar {
        &self.calendar
    }

    pub fn build_payload(&self, record: &LendingRecord, kind: ReminderKind) -> ReminderPayload {
        let to = self
            .directory
            .as_ref()
            .and_then(|directory| directory.find_by_id(&record.employee_id))
            .map(|staff| staff.email)
            .unwrap_or_else(|| record.user_email.clone());
        let (subject, body) = self.template.render(record, kind);
        ReminderPayload {
            to,
            subject,
            body,
            kind,
        }
    }

    /// Runs one batch over `records` as of `today`.
    ///
    /// Records are processed sequentially in input order. The input slice is
    /// never modified; a successful send produces a new record value in the
    /// report. A failed send leaves the record as it was so the next run
    /// retries it.
    pub async fn run(&self, records: &[LendingRecord], today: CalendarDate) -> RunReport {
        let mut report = RunReport {
            updated_records: Vec::with_capacity(records.len()),
            ..RunReport::default()
        };

        for record in records {
            let kind = match due_reminder(&self.calendar, record, today) {
                Ok(Some(kind)) => kind,
                Ok(None) => {
                    report.updated_records.push(record.clone());
                    continue;
                }
                Err(e) => {
                    error!("Skipping record {}: {}", record.id, e);
                    report.skipped_count += 1;
                    report.updated_records.push(record.clone());
                    continue;
                }
            };

            let payload = self.build_payload(record, kind);
            match self.mailer.send(&payload).await {
                Ok(true) => {
                    info!("Sent {} reminder for record {} to {}", kind, record.id, payload.to);
                    let updated = record.with_reminder_sent(kind);
                    report.history.push(HistoryEntry::for_record(
                        &updated,
                        HistoryAction::ReminderSent,
                        Some(kind.as_str().to_string()),
                    ));
                    report.sent.push(SentReminder {
                        record_id: record.id.clone(),
                        kind,
                        due_on: record.expected_return_date,
                    });
                    report.updated_records.push(updated);
                    report.sent_count += 1;
                }
                Ok(false) => {
                    warn!("Mail service did not deliver {} reminder for record {}", kind, record.id);
                    report.failed_count += 1;
                    report.updated_records.push(record.clone());
                }
                Err(e) => {
                    warn!("Mail service rejected {} reminder for record {}: {}", kind, record.id, e);
                    report.failed_count += 1;
                    report.updated_records.push(record.clone());
                }
            }
        }

        info!(
            "Reminder run for {} finished: {} sent, {} failed, {} skipped",
            today, report.sent_count, report.failed_count, report.skipped_count
        );
        report
    }
}
