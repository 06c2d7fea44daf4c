//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `LendingRecordStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use lending_core::domain::{
    Device, DeviceStatus, HistoryAction, HistoryEntry, LendingRecord, LendingStatus, ReminderKind,
};
use lending_core::ports::{LendingRecordStore, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `LendingRecordStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: &str, id: &str) -> impl FnOnce(sqlx::Error) -> PortError {
    let message = format!("{} {} not found", what, id);
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(message),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const RECORD_COLUMNS: &str = "id, device_id, user_name, employee_id, user_email, start_date, \
     expected_return_date, reason, created_at, status, reminders_sent";

#[derive(FromRow)]
struct LendingRow {
    id: String,
    device_id: String,
    user_name: String,
    employee_id: String,
    user_email: String,
    start_date: NaiveDate,
    expected_return_date: NaiveDate,
    reason: String,
    created_at: DateTime<Utc>,
    status: String,
    reminders_sent: Vec<String>,
}
impl LendingRow {
    fn to_domain(self) -> PortResult<LendingRecord> {
        let status = LendingStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("Record {} has unknown status '{}'", self.id, self.status))
        })?;
        // Unknown reminder names are dropped rather than failing the whole snapshot.
        let reminders_sent = self
            .reminders_sent
            .iter()
            .filter_map(|name| ReminderKind::parse(name))
            .collect();
        Ok(LendingRecord {
            id: self.id,
            device_id: self.device_id,
            user_name: self.user_name,
            employee_id: self.employee_id,
            user_email: self.user_email,
            start_date: self.start_date,
            expected_return_date: self.expected_return_date,
            reason: self.reason,
            created_at: self.created_at,
            status,
            reminders_sent,
        })
    }
}

#[derive(FromRow)]
struct DeviceRow {
    id: String,
    category: String,
    device_number: String,
    status: String,
    lending_count: i32,
    asset_id: Option<String>,
    phone_number: Option<String>,
    location: Option<String>,
}
impl DeviceRow {
    fn to_domain(self) -> PortResult<Device> {
        let status = DeviceStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("Device {} has unknown status '{}'", self.id, self.status))
        })?;
        Ok(Device {
            id: self.id,
            category: self.category,
            device_number: self.device_number,
            status,
            lending_count: self.lending_count.max(0) as u32,
            asset_id: self.asset_id,
            phone_number: self.phone_number,
            location: self.location,
        })
    }
}

#[derive(FromRow)]
struct HistoryRow {
    id: Uuid,
    record_id: String,
    device_id: String,
    user_name: String,
    employee_id: String,
    action: String,
    detail: Option<String>,
    recorded_at: DateTime<Utc>,
}
impl HistoryRow {
    fn to_domain(self) -> PortResult<HistoryEntry> {
        let action = HistoryAction::parse(&self.action).ok_or_else(|| {
            PortError::Unexpected(format!("History {} has unknown action '{}'", self.id, self.action))
        })?;
        Ok(HistoryEntry {
            id: self.id,
            record_id: self.record_id,
            device_id: self.device_id,
            user_name: self.user_name,
            employee_id: self.employee_id,
            action,
            detail: self.detail,
            recorded_at: self.recorded_at,
        })
    }
}

fn reminder_names(record: &LendingRecord) -> Vec<String> {
    record
        .reminders_sent
        .iter()
        .map(|kind| kind.as_str().to_string())
        .collect()
}

//=========================================================================================
// `LendingRecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl LendingRecordStore for DbAdapter {
    async fn list_records(&self) -> PortResult<Vec<LendingRecord>> {
        let rows = sqlx::query_as::<_, LendingRow>(&format!(
            "SELECT {} FROM lending_records ORDER BY created_at ASC, id ASC",
            RECORD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        rows.into_iter().map(LendingRow::to_domain).collect()
    }

    async fn get_record(&self, record_id: &str) -> PortResult<LendingRecord> {
        let row = sqlx::query_as::<_, LendingRow>(&format!(
            "SELECT {} FROM lending_records WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(record_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Lending record", record_id))?;
        row.to_domain()
    }

    async fn insert_record(&self, record: &LendingRecord) -> PortResult<()> {
        sqlx::query(&format!(
            "INSERT INTO lending_records ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            RECORD_COLUMNS
        ))
        .bind(&record.id)
        .bind(&record.device_id)
        .bind(&record.user_name)
        .bind(&record.employee_id)
        .bind(&record.user_email)
        .bind(record.start_date)
        .bind(record.expected_return_date)
        .bind(&record.reason)
        .bind(record.created_at)
        .bind(record.status.as_str())
        .bind(reminder_names(record))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn save_records(&self, records: &[LendingRecord]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for record in records {
            sqlx::query(&format!(
                "INSERT INTO lending_records ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
                 ON CONFLICT (id) DO UPDATE SET \
                 expected_return_date = EXCLUDED.expected_return_date, \
                 status = EXCLUDED.status, \
                 reminders_sent = EXCLUDED.reminders_sent",
                RECORD_COLUMNS
            ))
            .bind(&record.id)
            .bind(&record.device_id)
            .bind(&record.user_name)
            .bind(&record.employee_id)
            .bind(&record.user_email)
            .bind(record.start_date)
            .bind(record.expected_return_date)
            .bind(&record.reason)
            .bind(record.created_at)
            .bind(record.status.as_str())
            .bind(reminder_names(record))
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn mark_reminder_sent(
        &self,
        record_id: &str,
        kind: ReminderKind,
        due_on: NaiveDate,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE lending_records SET reminders_sent = array_append(reminders_sent, $2) \
             WHERE id = $1 AND status = $3 AND expected_return_date = $4 \
             AND NOT ($2 = ANY(reminders_sent))",
        )
        .bind(record_id)
        .bind(kind.as_str())
        .bind(LendingStatus::Active.as_str())
        .bind(due_on)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_devices(&self) -> PortResult<Vec<Device>> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            "SELECT id, category, device_number, status, lending_count, asset_id, phone_number, location \
             FROM devices ORDER BY category ASC, device_number ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        rows.into_iter().map(DeviceRow::to_domain).collect()
    }

    async fn get_device(&self, device_id: &str) -> PortResult<Device> {
        let row = sqlx::query_as::<_, DeviceRow>(
            "SELECT id, category, device_number, status, lending_count, asset_id, phone_number, location \
             FROM devices WHERE id = $1",
        )
        .bind(device_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Device", device_id))?;
        row.to_domain()
    }

    async fn upsert_device(&self, device: &Device) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO devices (id, category, device_number, status, lending_count, asset_id, phone_number, location) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
             category = EXCLUDED.category, device_number = EXCLUDED.device_number, \
             status = EXCLUDED.status, lending_count = EXCLUDED.lending_count, \
             asset_id = EXCLUDED.asset_id, phone_number = EXCLUDED.phone_number, \
             location = EXCLUDED.location",
        )
        .bind(&device.id)
        .bind(&device.category)
        .bind(&device.device_number)
        .bind(device.status.as_str())
        .bind(i32::try_from(device.lending_count).unwrap_or(i32::MAX))
        .bind(&device.asset_id)
        .bind(&device.phone_number)
        .bind(&device.location)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_device(&self, device_id: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM devices WHERE id = $1")
            .bind(device_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Device {} not found", device_id)));
        }
        Ok(())
    }

    async fn append_history(&self, entries: &[HistoryEntry]) -> PortResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for entry in entries {
            sqlx::query(
                "INSERT INTO history (id, record_id, device_id, user_name, employee_id, action, detail, recorded_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(entry.id)
            .bind(&entry.record_id)
            .bind(&entry.device_id)
            .bind(&entry.user_name)
            .bind(&entry.employee_id)
            .bind(entry.action.as_str())
            .bind(&entry.detail)
            .bind(entry.recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn list_history(&self, limit: i64) -> PortResult<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT id, record_id, device_id, user_name, employee_id, action, detail, recorded_at \
             FROM history ORDER BY recorded_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        rows.into_iter().map(HistoryRow::to_domain).collect()
    }
}
