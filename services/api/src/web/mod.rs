pub mod auth;
pub mod calendar;
pub mod middleware;
pub mod reminder_task;
pub mod rest;
pub mod state;

// Re-export what the binary needs to build the router and start the timer.
pub use middleware::require_admin;
pub use reminder_task::{reminder_process, run_reminders_once};
pub use rest::ApiDoc;
pub use state::AppState;
