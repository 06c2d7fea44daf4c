//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the lending REST API and the master
//! definition for the OpenAPI specification.

use crate::adapters::insight_llm::FALLBACK_INSIGHT;
use crate::web::{
    auth::{AdminLoginRequest, StaffLoginRequest, StaffResponse},
    calendar::{BusinessDayResponse, HolidayResponse, OffsetResponse},
    reminder_task::{run_reminders_once, ReminderRunError, RunSummary},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, NaiveDate, Utc};
use lending_core::{
    business_days_between, change_return_date, days_overdue, is_overdue, is_week_overdue, Device,
    DeviceStatus, HistoryAction, HistoryEntry, HolidayCalendar, LendingRecord, NewLending,
    PortError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_records_handler,
        create_record_handler,
        return_record_handler,
        change_return_date_handler,
        list_devices_handler,
        upsert_device_handler,
        delete_device_handler,
        list_history_handler,
        insight_handler,
        run_reminders_handler,
        crate::web::auth::staff_login_handler,
        crate::web::auth::admin_login_handler,
        crate::web::calendar::holidays_handler,
        crate::web::calendar::business_day_handler,
        crate::web::calendar::offset_handler,
    ),
    components(
        schemas(
            RecordResponse, CreateRecordRequest, ChangeReturnDateRequest, DeviceResponse,
            DeviceRequest, HistoryResponse, InsightResponse, RunSummary, StaffLoginRequest,
            StaffResponse, AdminLoginRequest, HolidayResponse, BusinessDayResponse, OffsetResponse
        )
    ),
    tags(
        (name = "Device Lending API", description = "Device lending records, inventory and business-day reminders.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

pub(crate) fn port_error_response(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        PortError::InvalidPayload(why) => (StatusCode::BAD_REQUEST, why),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(_) => {
            error!("{}: {:?}", context, e);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct RecordResponse {
    pub id: String,
    pub device_id: String,
    pub user_name: String,
    pub employee_id: String,
    pub user_email: String,
    pub start_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    /// `active` or `returned`.
    pub status: String,
    /// Wire names of the reminders already sent.
    pub reminders_sent: Vec<String>,
    /// Calendar days past the expected return date as of today.
    pub days_overdue: i64,
    /// Business days past the expected return date as of today.
    pub business_days_overdue: i64,
    pub overdue: bool,
    /// Overdue by a week or more.
    pub week_overdue: bool,
}

impl RecordResponse {
    fn from_record(record: LendingRecord, today: NaiveDate, calendar: &HolidayCalendar) -> Self {
        let days_overdue = days_overdue(&record, today);
        let overdue = is_overdue(&record, today);
        let business_days_overdue = if overdue {
            business_days_between(calendar, record.expected_return_date, today)
        } else {
            0
        };
        let week_overdue = is_week_overdue(&record, today);
        Self {
            status: record.status.as_str().to_string(),
            reminders_sent: record
                .reminders_sent
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect(),
            id: record.id,
            device_id: record.device_id,
            user_name: record.user_name,
            employee_id: record.employee_id,
            user_email: record.user_email,
            start_date: record.start_date,
            expected_return_date: record.expected_return_date,
            reason: record.reason,
            created_at: record.created_at,
            days_overdue,
            business_days_overdue,
            overdue,
            week_overdue,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateRecordRequest {
    pub device_id: String,
    pub employee_id: String,
    /// Defaults to the staff directory entry for `employee_id`.
    pub user_name: Option<String>,
    /// Defaults to the staff directory entry for `employee_id`.
    pub user_email: Option<String>,
    /// Defaults to today.
    pub start_date: Option<NaiveDate>,
    pub expected_return_date: NaiveDate,
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangeReturnDateRequest {
    pub expected_return_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct DeviceResponse {
    pub id: String,
    pub category: String,
    pub device_number: String,
    pub status: String,
    pub lending_count: u32,
    pub asset_id: Option<String>,
    pub phone_number: Option<String>,
    pub location: Option<String>,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> Self {
        Self {
            id: device.id,
            category: device.category,
            device_number: device.device_number,
            status: device.status.as_str().to_string(),
            lending_count: device.lending_count,
            asset_id: device.asset_id,
            phone_number: device.phone_number,
            location: device.location,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct DeviceRequest {
    /// Omit to register a new device.
    pub id: Option<String>,
    pub category: String,
    pub device_number: String,
    /// `available`, `borrowed` or `returned`; defaults to `available`.
    pub status: Option<String>,
    pub asset_id: Option<String>,
    pub phone_number: Option<String>,
    pub location: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub id: Uuid,
    pub record_id: String,
    pub device_id: String,
    pub user_name: String,
    pub employee_id: String,
    pub action: String,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<HistoryEntry> for HistoryResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: entry.id,
            record_id: entry.record_id,
            device_id: entry.device_id,
            user_name: entry.user_name,
            employee_id: entry.employee_id,
            action: entry.action.as_str().to_string(),
            detail: entry.detail,
            recorded_at: entry.recorded_at,
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Most recent entries to return (default 100).
    pub limit: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct InsightResponse {
    pub borrowed: usize,
    pub total: usize,
    pub insight: String,
}

#[derive(Deserialize, IntoParams)]
pub struct RunQuery {
    /// Evaluate as of this date instead of today (backfill / simulation).
    pub today: Option<NaiveDate>,
}

//=========================================================================================
// Lending Record Handlers
//=========================================================================================

/// List all lending records, oldest first.
#[utoipa::path(
    get,
    path = "/records",
    responses((status = 200, description = "All records", body = [RecordResponse]))
)]
pub async fn list_records_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = state.today();
    let records = state
        .store
        .list_records()
        .await
        .map_err(|e| port_error_response("Failed to list records", e))?;
    let body: Vec<_> = records
        .into_iter()
        .map(|record| RecordResponse::from_record(record, today, &state.calendar))
        .collect();
    Ok(Json(body))
}

/// Start a new borrowing.
#[utoipa::path(
    post,
    path = "/records",
    request_body = CreateRecordRequest,
    responses(
        (status = 201, description = "Record created", body = RecordResponse),
        (status = 400, description = "Missing borrower details or dates out of order"),
        (status = 404, description = "Unknown device"),
        (status = 409, description = "Device is borrowed or awaiting inspection")
    )
)]
pub async fn create_record_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRecordRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = state.today();
    let staff = state.staff.find_by_id(&req.employee_id);
    let user_name = req
        .user_name
        .or_else(|| staff.as_ref().map(|s| s.name.clone()))
        .ok_or((StatusCode::BAD_REQUEST, "user_name is required".to_string()))?;
    let user_email = req
        .user_email
        .or_else(|| staff.as_ref().map(|s| s.email.clone()))
        .ok_or((StatusCode::BAD_REQUEST, "user_email is required".to_string()))?;
    let start_date = req.start_date.unwrap_or(today);
    if req.expected_return_date < start_date {
        return Err((
            StatusCode::BAD_REQUEST,
            "expected_return_date is before start_date".to_string(),
        ));
    }

    let device = state
        .store
        .get_device(&req.device_id)
        .await
        .map_err(|e| port_error_response("Failed to load device", e))?;
    if device.status != DeviceStatus::Available {
        return Err((
            StatusCode::CONFLICT,
            format!("Device {} is {} and cannot be lent", device.id, device.status.as_str()),
        ));
    }

    let record = LendingRecord::new(NewLending {
        device_id: device.id.clone(),
        user_name,
        employee_id: req.employee_id,
        user_email,
        start_date,
        expected_return_date: req.expected_return_date,
        reason: req.reason,
    });
    let borrowed = Device {
        status: DeviceStatus::Borrowed,
        lending_count: device.lending_count + 1,
        ..device
    };

    let store = &state.store;
    let result = async {
        store.insert_record(&record).await?;
        store.upsert_device(&borrowed).await?;
        store
            .append_history(&[HistoryEntry::for_record(&record, HistoryAction::Lending, None)])
            .await
    }
    .await;
    result.map_err(|e| port_error_response("Failed to create record", e))?;

    info!("Device {} lent to {} until {}", record.device_id, record.employee_id, record.expected_return_date);
    Ok((StatusCode::CREATED, Json(RecordResponse::from_record(record, today, &state.calendar))))
}

/// Close a borrowing as returned.
#[utoipa::path(
    post,
    path = "/records/{id}/return",
    params(("id" = String, Path, description = "Record id")),
    responses(
        (status = 200, description = "Record returned", body = RecordResponse),
        (status = 404, description = "Unknown record"),
        (status = 409, description = "Record already returned")
    )
)]
pub async fn return_record_handler(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let record = state
        .store
        .get_record(&record_id)
        .await
        .map_err(|e| port_error_response("Failed to load record", e))?;
    if !record.is_active() {
        return Err((StatusCode::CONFLICT, format!("Record {} is already returned", record.id)));
    }
    let returned = record.mark_returned();

    let store = &state.store;
    let result = async {
        store.save_records(std::slice::from_ref(&returned)).await?;
        match store.get_device(&returned.device_id).await {
            Ok(device) => {
                store
                    .upsert_device(&Device {
                        status: DeviceStatus::Returned,
                        ..device
                    })
                    .await?
            }
            Err(PortError::NotFound(_)) => {
                warn!("Returned record {} references missing device {}", returned.id, returned.device_id)
            }
            Err(e) => return Err(e),
        }
        store
            .append_history(&[HistoryEntry::for_record(&returned, HistoryAction::Return, None)])
            .await
    }
    .await;
    result.map_err(|e| port_error_response("Failed to return record", e))?;

    Ok(Json(RecordResponse::from_record(returned, state.today(), &state.calendar)))
}

/// Move the expected return date of an active borrowing.
#[utoipa::path(
    put,
    path = "/records/{id}/return-date",
    params(("id" = String, Path, description = "Record id")),
    request_body = ChangeReturnDateRequest,
    responses(
        (status = 200, description = "Return date changed", body = RecordResponse),
        (status = 404, description = "Unknown record"),
        (status = 409, description = "Record already returned")
    )
)]
pub async fn change_return_date_handler(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
    Json(req): Json<ChangeReturnDateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let record = state
        .store
        .get_record(&record_id)
        .await
        .map_err(|e| port_error_response("Failed to load record", e))?;
    if !record.is_active() {
        return Err((StatusCode::CONFLICT, format!("Record {} is already returned", record.id)));
    }
    if req.expected_return_date < record.start_date {
        return Err((
            StatusCode::BAD_REQUEST,
            "expected_return_date is before start_date".to_string(),
        ));
    }

    let updated = change_return_date(
        &state.calendar,
        &record,
        req.expected_return_date,
        state.config.reminder_reset_policy,
    );
    let detail = format!("{} -> {}", record.expected_return_date, updated.expected_return_date);

    let store = &state.store;
    let result = async {
        store.save_records(std::slice::from_ref(&updated)).await?;
        store
            .append_history(&[HistoryEntry::for_record(&updated, HistoryAction::DateChange, Some(detail))])
            .await
    }
    .await;
    result.map_err(|e| port_error_response("Failed to change return date", e))?;

    Ok(Json(RecordResponse::from_record(updated, state.today(), &state.calendar)))
}

//=========================================================================================
// Inventory Handlers
//=========================================================================================

/// List the device inventory.
#[utoipa::path(
    get,
    path = "/devices",
    responses((status = 200, description = "All devices", body = [DeviceResponse]))
)]
pub async fn list_devices_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let devices = state
        .store
        .list_devices()
        .await
        .map_err(|e| port_error_response("Failed to list devices", e))?;
    let body: Vec<DeviceResponse> = devices.into_iter().map(DeviceResponse::from).collect();
    Ok(Json(body))
}

/// Register a new device or update an existing one (admin).
#[utoipa::path(
    post,
    path = "/devices",
    request_body = DeviceRequest,
    responses(
        (status = 200, description = "Device stored", body = DeviceResponse),
        (status = 400, description = "Unknown status"),
        (status = 401, description = "Admin credentials missing or wrong")
    )
)]
pub async fn upsert_device_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeviceRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = match req.status.as_deref() {
        None => DeviceStatus::Available,
        Some(value) => DeviceStatus::parse(value)
            .ok_or((StatusCode::BAD_REQUEST, format!("Unknown device status '{}'", value)))?,
    };

    let existing = match &req.id {
        Some(id) => match state.store.get_device(id).await {
            Ok(device) => Some(device),
            Err(PortError::NotFound(_)) => None,
            Err(e) => return Err(port_error_response("Failed to load device", e)),
        },
        None => None,
    };
    let device = Device {
        id: req.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        category: req.category,
        device_number: req.device_number,
        status,
        lending_count: existing.map(|d| d.lending_count).unwrap_or(0),
        asset_id: req.asset_id,
        phone_number: req.phone_number,
        location: req.location,
    };

    state
        .store
        .upsert_device(&device)
        .await
        .map_err(|e| port_error_response("Failed to store device", e))?;
    Ok(Json(DeviceResponse::from(device)))
}

/// Remove a device from the inventory (admin). A borrowed device cannot be removed.
#[utoipa::path(
    delete,
    path = "/devices/{id}",
    params(("id" = String, Path, description = "Device id")),
    responses(
        (status = 204, description = "Device removed"),
        (status = 401, description = "Admin credentials missing or wrong"),
        (status = 404, description = "Unknown device"),
        (status = 409, description = "Device is currently borrowed")
    )
)]
pub async fn delete_device_handler(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let device = state
        .store
        .get_device(&device_id)
        .await
        .map_err(|e| port_error_response("Failed to load device", e))?;
    if device.status == DeviceStatus::Borrowed {
        return Err((
            StatusCode::CONFLICT,
            format!("Device {} is borrowed; return it before removing it", device.id),
        ));
    }

    state
        .store
        .delete_device(&device.id)
        .await
        .map_err(|e| port_error_response("Failed to delete device", e))?;
    info!("Device {} ({} {}) removed", device.id, device.category, device.device_number);
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Admin Handlers
//=========================================================================================

/// Most recent audit-trail entries (admin).
#[utoipa::path(
    get,
    path = "/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "History, newest first", body = [HistoryResponse]),
        (status = 401, description = "Admin credentials missing or wrong")
    )
)]
pub async fn list_history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let history = state
        .store
        .list_history(limit)
        .await
        .map_err(|e| port_error_response("Failed to list history", e))?;
    let body: Vec<HistoryResponse> = history.into_iter().map(HistoryResponse::from).collect();
    Ok(Json(body))
}

/// Run the reminder batch now (admin).
#[utoipa::path(
    post,
    path = "/reminders/run",
    params(RunQuery),
    responses(
        (status = 200, description = "Run finished", body = RunSummary),
        (status = 401, description = "Admin credentials missing or wrong"),
        (status = 409, description = "Another run is in progress")
    )
)]
pub async fn run_reminders_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = query.today.unwrap_or_else(|| state.today());
    info!("Manual reminder run requested for {}", today);
    match run_reminders_once(&state, today).await {
        Ok(summary) => Ok(Json(summary)),
        Err(ReminderRunError::AlreadyRunning) => Err((
            StatusCode::CONFLICT,
            "A reminder run is already in progress".to_string(),
        )),
        Err(ReminderRunError::Port(e)) => Err(port_error_response("Reminder run failed", e)),
    }
}

/// A one-line status comment for the dashboard.
#[utoipa::path(
    get,
    path = "/insight",
    responses((status = 200, description = "Status insight", body = InsightResponse))
)]
pub async fn insight_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let devices = state
        .store
        .list_devices()
        .await
        .map_err(|e| port_error_response("Failed to list devices", e))?;
    let total = devices.len();
    let borrowed = devices
        .iter()
        .filter(|d| d.status == DeviceStatus::Borrowed)
        .count();

    let insight = match state.insight_adapter.generate_status_insight(borrowed, total).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Insight generation failed: {}", e);
            FALLBACK_INSIGHT.to_string()
        }
    };
    Ok(Json(InsightResponse {
        borrowed,
        total,
        insight,
    }))
}
