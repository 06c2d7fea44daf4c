//! services/api/src/web/calendar.rs
//!
//! Read-only business-day calendar endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use lending_core::{offset_by_business_days, CalendarError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use crate::web::state::AppState;

/// Largest `|days|` accepted by the offset endpoint, roughly ten years of days.
pub const MAX_OFFSET_DAYS: i64 = 3660;

#[derive(Serialize, ToSchema)]
pub struct HolidayResponse {
    pub date: NaiveDate,
    pub name: String,
}

#[derive(Deserialize, IntoParams)]
pub struct DateQuery {
    /// ISO date, e.g. 2024-01-09.
    pub date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct BusinessDayResponse {
    pub date: NaiveDate,
    pub business_day: bool,
    pub holiday_name: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct OffsetQuery {
    pub date: NaiveDate,
    /// Signed number of business days to move, at most 3660 either way.
    pub days: i64,
}

#[derive(Serialize, ToSchema)]
pub struct OffsetResponse {
    pub date: NaiveDate,
    pub days: i64,
    pub result: NaiveDate,
}

/// List the holidays observed in a year.
#[utoipa::path(
    get,
    path = "/calendar/holidays/{year}",
    params(("year" = i32, Path, description = "Calendar year")),
    responses((status = 200, description = "Holidays in date order", body = [HolidayResponse]))
)]
pub async fn holidays_handler(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i32>,
) -> Json<Vec<HolidayResponse>> {
    let holidays = state
        .calendar
        .holidays_in_year(year)
        .into_iter()
        .map(|(date, name)| HolidayResponse { date, name })
        .collect();
    Json(holidays)
}

/// Classify a single date.
#[utoipa::path(
    get,
    path = "/calendar/business-day",
    params(DateQuery),
    responses((status = 200, description = "Classification", body = BusinessDayResponse))
)]
pub async fn business_day_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DateQuery>,
) -> Json<BusinessDayResponse> {
    Json(BusinessDayResponse {
        date: query.date,
        business_day: state.calendar.is_business_day(query.date),
        holiday_name: state.calendar.holiday_name(query.date).map(str::to_string),
    })
}

/// Move a date by a signed number of business days.
#[utoipa::path(
    get,
    path = "/calendar/offset",
    params(OffsetQuery),
    responses(
        (status = 200, description = "Shifted date", body = OffsetResponse),
        (status = 400, description = "`days` is out of range"),
        (status = 422, description = "The calendar walk overflowed")
    )
)]
pub async fn offset_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OffsetQuery>,
) -> Result<Json<OffsetResponse>, (StatusCode, String)> {
    if !(-MAX_OFFSET_DAYS..=MAX_OFFSET_DAYS).contains(&query.days) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("days must be within ±{}", MAX_OFFSET_DAYS),
        ));
    }
    match offset_by_business_days(&state.calendar, query.date, query.days) {
        Ok(result) => Ok(Json(OffsetResponse {
            date: query.date,
            days: query.days,
            result,
        })),
        Err(e @ CalendarError::WalkOverflow { .. }) => {
            warn!("Business-day offset failed: {}", e);
            Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
