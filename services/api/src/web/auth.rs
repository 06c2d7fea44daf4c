//! services/api/src/web/auth.rs
//!
//! Login endpoints: staff sign in with their employee id, admins with an
//! id/password pair.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::web::{middleware::is_admin, state::AppState};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct StaffLoginRequest {
    pub staff_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct StaffResponse {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AdminLoginRequest {
    pub admin_id: String,
    pub password: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /staff/login - Look a staff member up by employee id
#[utoipa::path(
    post,
    path = "/staff/login",
    request_body = StaffLoginRequest,
    responses(
        (status = 200, description = "Staff member found", body = StaffResponse),
        (status = 401, description = "Unknown employee id")
    )
)]
pub async fn staff_login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StaffLoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let staff = state
        .staff
        .find_by_id(req.staff_id.trim())
        .ok_or((StatusCode::UNAUTHORIZED, "Unknown employee id".to_string()))?;

    info!("Staff {} signed in", staff.id);
    Ok(Json(StaffResponse {
        id: staff.id,
        name: staff.name,
        email: staff.email,
    }))
}

/// POST /admin/login - Check admin credentials
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = AdminLoginRequest,
    responses(
        (status = 204, description = "Credentials accepted"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn admin_login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    if is_admin(&state.config, &req.admin_id, &req.password) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::UNAUTHORIZED, "Invalid id or password".to_string()))
    }
}
