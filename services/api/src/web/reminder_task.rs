//! services/api/src/web/reminder_task.rs
//!
//! This module contains the reminder "worker": a single guarded batch run,
//! and the long-running timer loop that triggers it.

use crate::web::state::AppState;
use chrono::NaiveDate;
use lending_core::{CalendarDate, PortError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use utoipa::ToSchema;

/// What one run did, as reported to the admin trigger.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunSummary {
    pub today: NaiveDate,
    pub sent_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ReminderRunError {
    #[error("A reminder run is already in progress")]
    AlreadyRunning,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Loads the record snapshot, runs the scheduler as of `today`, and records
/// each delivered reminder plus the new history.
///
/// Only the sent-reminder marks are written back, never the snapshot itself,
/// so a return or date change made during the run is not overwritten.
/// Fails fast with `AlreadyRunning` instead of queueing behind another run.
pub async fn run_reminders_once(
    app_state: &AppState,
    today: CalendarDate,
) -> Result<RunSummary, ReminderRunError> {
    let _guard = app_state
        .run_guard
        .try_lock()
        .map_err(|_| ReminderRunError::AlreadyRunning)?;

    let records = app_state.store.list_records().await?;
    let report = app_state.scheduler.run(&records, today).await;

    for sent in &report.sent {
        let marked = app_state
            .store
            .mark_reminder_sent(&sent.record_id, sent.kind, sent.due_on)
            .await?;
        if !marked {
            info!(
                "Record {} changed during the run; {} reminder not marked",
                sent.record_id, sent.kind
            );
        }
    }
    app_state.store.append_history(&report.history).await?;

    Ok(RunSummary {
        today,
        sent_count: report.sent_count,
        failed_count: report.failed_count,
        skipped_count: report.skipped_count,
    })
}

/// The timer loop. Runs once per `interval` until `cancellation_token` fires.
pub async fn reminder_process(
    app_state: Arc<AppState>,
    interval: Duration,
    cancellation_token: CancellationToken,
) {
    info!("Reminder timer started (every {:?}).", interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Reminder timer cancelled.");
                return;
            }
            _ = ticker.tick() => {
                let today = app_state.today();
                match run_reminders_once(&app_state, today).await {
                    Ok(summary) => info!(
                        "Scheduled reminder run for {}: {} sent, {} failed",
                        summary.today, summary.sent_count, summary.failed_count
                    ),
                    Err(ReminderRunError::AlreadyRunning) => {
                        info!("Skipping scheduled reminder run; another run is in progress.")
                    }
                    Err(e) => error!("Scheduled reminder run failed: {}", e),
                }
            }
        }
    }
}
