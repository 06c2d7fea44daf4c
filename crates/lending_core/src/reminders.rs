//! crates/lending_core/src/reminders.rs
//!
//! Reminder rules: which reminder (if any) a record needs on a given day,
//! how reminders are worded, and what happens to already-sent reminders
//! when the expected return date moves.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::business_days::{
    is_exactly_one_business_day_after, is_exactly_one_business_day_before, offset_by_business_days,
};
use crate::calendar::{CalendarError, HolidayCalendar};
use crate::domain::{CalendarDate, LendingRecord, ReminderKind};

//=========================================================================================
// Due-reminder decision
//=========================================================================================

/// Decides whether `record` needs a new reminder on `today`.
///
/// Returned records never do. `BeforeDue` is checked first, so it wins if a
/// misconfigured calendar ever makes both trigger dates coincide.
pub fn due_reminder(
    calendar: &HolidayCalendar,
    record: &LendingRecord,
    today: CalendarDate,
) -> Result<Option<ReminderKind>, CalendarError> {
    if !record.is_active() {
        return Ok(None);
    }
    let target = record.expected_return_date;

    if !record.has_sent(ReminderKind::BeforeDue)
        && is_exactly_one_business_day_before(calendar, target, today)?
    {
        return Ok(Some(ReminderKind::BeforeDue));
    }
    if !record.has_sent(ReminderKind::AfterDue)
        && is_exactly_one_business_day_after(calendar, target, today)?
    {
        return Ok(Some(ReminderKind::AfterDue));
    }
    Ok(None)
}

/// The day on which `kind` fires for a record due on `expected_return`.
pub fn trigger_date(
    calendar: &HolidayCalendar,
    kind: ReminderKind,
    expected_return: CalendarDate,
) -> Result<CalendarDate, CalendarError> {
    offset_by_business_days(calendar, expected_return, kind.business_day_offset())
}

//=========================================================================================
// Overdue status
//=========================================================================================

/// Calendar days past the expected return date, zero when not overdue.
pub fn days_overdue(record: &LendingRecord, today: CalendarDate) -> i64 {
    if !record.is_active() {
        return 0;
    }
    (today - record.expected_return_date).num_days().max(0)
}

pub fn is_overdue(record: &LendingRecord, today: CalendarDate) -> bool {
    days_overdue(record, today) > 0
}

/// Overdue by a full week or more.
pub fn is_week_overdue(record: &LendingRecord, today: CalendarDate) -> bool {
    days_overdue(record, today) >= 7
}

//=========================================================================================
// Templating
//=========================================================================================

/// Produces the subject and body of a reminder mail.
pub trait ReminderTemplate: Send + Sync {
    fn render(&self, record: &LendingRecord, kind: ReminderKind) -> (String, String);
}

/// The stock Japanese wording sent to borrowers.
#[derive(Debug, Clone)]
pub struct DefaultReminderTemplate {
    pub product_name: String,
    pub team_name: String,
}

impl Default for DefaultReminderTemplate {
    fn default() -> Self {
        Self {
            product_name: "KASANE".to_string(),
            team_name: "ICT".to_string(),
        }
    }
}

impl ReminderTemplate for DefaultReminderTemplate {
    fn render(&self, record: &LendingRecord, kind: ReminderKind) -> (String, String) {
        let due = record.expected_return_date;
        let greeting = format!(
            "{} 様\n\nお疲れ様です。{}です。\n\n",
            record.user_name, self.team_name
        );
        match kind {
            ReminderKind::BeforeDue => (
                format!("【{}】返却予定日の1営業日前リマインド", self.product_name),
                format!(
                    "{greeting}返却予定日（{}月{}日）の1営業日前となりました。\n\
                     返却予定日に返せるよう端末と充電器の確認をしてください。\n\
                     また、ログインした場合は必ずログアウトを行い、ダウンロードしたアプリなどは必ず削除してください。\n\
                     ※なお返却予定日を延長される場合は返却予定日の変更を行ってください。",
                    due.month(),
                    due.day()
                ),
            ),
            ReminderKind::AfterDue => (
                format!(
                    "【{}】至急：返却期限超過のお知らせ（1営業日経過）",
                    self.product_name
                ),
                format!(
                    "{greeting}返却予定日（{}月{}日）を1営業日過ぎております。\n\
                     この後も利用される方が控えておりますので、必ず本日中に返却願います。\n\
                     なお返却が難しい場合は、返却予定日を返却可能な日付に変更してください。",
                    due.month(),
                    due.day()
                ),
            ),
        }
    }
}

//=========================================================================================
// Return-date changes
//=========================================================================================

/// What to do with already-sent reminders when the expected return date changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderResetPolicy {
    /// Forget every sent reminder.
    #[default]
    ClearAll,
    /// Forget only reminders whose trigger date moved.
    ClearChanged,
}

impl ReminderResetPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "clear_all" => Some(ReminderResetPolicy::ClearAll),
            "clear_changed" => Some(ReminderResetPolicy::ClearChanged),
            _ => None,
        }
    }
}

/// Returns a copy of `record` due on `new_date`, with sent reminders reset per `policy`.
///
/// Under `ClearChanged`, a kind whose trigger date cannot be computed is cleared.
pub fn change_return_date(
    calendar: &HolidayCalendar,
    record: &LendingRecord,
    new_date: CalendarDate,
    policy: ReminderResetPolicy,
) -> LendingRecord {
    let mut updated = record.clone();
    updated.expected_return_date = new_date;
    match policy {
        ReminderResetPolicy::ClearAll => updated.reminders_sent.clear(),
        ReminderResetPolicy::ClearChanged => {
            let old_date = record.expected_return_date;
            updated.reminders_sent.retain(|kind| {
                match (
                    trigger_date(calendar, *kind, old_date),
                    trigger_date(calendar, *kind, new_date),
                ) {
                    (Ok(old), Ok(new)) => old == new,
                    _ => false,
                }
            });
        }
    }
    updated
}
