//! services/api/src/web/middleware.rs
//!
//! Admin middleware for protecting inventory, history and reminder-run routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::web::state::AppState;

pub const ADMIN_ID_HEADER: &str = "x-admin-id";
pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

/// Plain id/password comparison against the configured admin credentials.
pub fn is_admin(config: &Config, admin_id: &str, password: &str) -> bool {
    admin_id == config.admin_id && password == config.admin_password
}

/// Middleware that checks the admin headers.
///
/// If they match the configured credentials the request continues;
/// otherwise returns 401 Unauthorized.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Scoped so the borrow of `req` ends before the await (keeps the future `Send`).
    let (admin_id, password) = {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let admin_id = header(ADMIN_ID_HEADER).ok_or(StatusCode::UNAUTHORIZED)?;
        let password = header(ADMIN_PASSWORD_HEADER).ok_or(StatusCode::UNAUTHORIZED)?;
        (admin_id, password)
    };

    if !is_admin(&state.config, &admin_id, &password) {
        warn!("Rejected admin request for id '{}'", admin_id);
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}
