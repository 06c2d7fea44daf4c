//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use lending_core::ReminderResetPolicy;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub insight_model: String,
    pub mail_api_url: Option<String>,
    pub mail_api_token: Option<String>,
    pub mail_from: String,
    pub mail_timeout: Duration,
    pub holiday_calendar_path: Option<PathBuf>,
    pub staff_directory_path: Option<PathBuf>,
    /// `None` disables the background reminder timer.
    pub reminder_interval: Option<Duration>,
    /// The offset whose local date counts as "today" for reminders.
    pub business_utc_offset: FixedOffset,
    pub reminder_reset_policy: ReminderResetPolicy,
    pub admin_id: String,
    pub admin_password: String,
    pub product_name: String,
    pub team_name: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Text Generation ---
        let openai_api_key = lookup("OPENAI_API_KEY");
        let insight_model = or_default("INSIGHT_MODEL", "gpt-4o-mini");

        // --- Mail Delivery ---
        let mail_api_url = lookup("MAIL_API_URL");
        let mail_api_token = lookup("MAIL_API_TOKEN");
        let mail_from = or_default("MAIL_FROM", "noreply@example.com");
        let mail_timeout = Duration::from_secs(parse_number("MAIL_TIMEOUT_SECS", &or_default("MAIL_TIMEOUT_SECS", "10"))?);

        // --- Calendar and Staff Files ---
        let holiday_calendar_path = lookup("HOLIDAY_CALENDAR_PATH").map(PathBuf::from);
        let staff_directory_path = lookup("STAFF_DIRECTORY_PATH").map(PathBuf::from);

        // --- Reminder Scheduling ---
        let interval_secs = parse_number(
            "REMINDER_INTERVAL_SECS",
            &or_default("REMINDER_INTERVAL_SECS", "3600"),
        )?;
        let reminder_interval = (interval_secs > 0).then(|| Duration::from_secs(interval_secs));

        let offset_str = or_default("BUSINESS_UTC_OFFSET_HOURS", "9");
        let business_utc_offset = offset_str
            .parse::<i32>()
            .ok()
            .and_then(|hours| FixedOffset::east_opt(hours * 3600))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "BUSINESS_UTC_OFFSET_HOURS".to_string(),
                    format!("'{}' is not a valid UTC offset in hours", offset_str),
                )
            })?;

        let policy_str = or_default("REMINDER_RESET_POLICY", "clear_all");
        let reminder_reset_policy = ReminderResetPolicy::parse(&policy_str).ok_or_else(|| {
            ConfigError::InvalidValue(
                "REMINDER_RESET_POLICY".to_string(),
                format!("'{}' is not one of clear_all, clear_changed", policy_str),
            )
        })?;

        // --- Admin and Branding ---
        let admin_id = or_default("ADMIN_ID", "admin");
        let admin_password =
            lookup("ADMIN_PASSWORD").ok_or_else(|| ConfigError::MissingVar("ADMIN_PASSWORD".to_string()))?;
        let product_name = or_default("PRODUCT_NAME", "KASANE");
        let team_name = or_default("TEAM_NAME", "ICT");

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            insight_model,
            mail_api_url,
            mail_api_token,
            mail_from,
            mail_timeout,
            holiday_calendar_path,
            staff_directory_path,
            reminder_interval,
            business_utc_offset,
            reminder_reset_policy,
            admin_id,
            admin_password,
            product_name,
            team_name,
        })
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|e| {
        ConfigError::InvalidValue(key.to_string(), format!("'{}': {}", value, e))
    })
}
