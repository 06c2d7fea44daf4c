//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        load_calendar, load_staff_directory, DbAdapter, HttpMailAdapter, LogMailAdapter,
        OpenAiInsightAdapter, StaticInsightAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        auth::{admin_login_handler, staff_login_handler},
        calendar::{business_day_handler, holidays_handler, offset_handler},
        middleware::{ADMIN_ID_HEADER, ADMIN_PASSWORD_HEADER},
        reminder_process, require_admin,
        rest::{
            change_return_date_handler, create_record_handler, delete_device_handler,
            insight_handler, list_devices_handler, list_history_handler, list_records_handler,
            return_record_handler, run_reminders_handler, upsert_device_handler,
        },
        ApiDoc, AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use lending_core::{
    DefaultReminderTemplate, InsightService, LendingRecordStore, MailService, ReminderScheduler,
    StaffDirectory,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Load Calendar & Staff Directory ---
    let calendar = Arc::new(load_calendar(config.holiday_calendar_path.as_deref())?);
    let staff: Arc<dyn StaffDirectory> = Arc::new(load_staff_directory(
        config.staff_directory_path.as_deref(),
    )?);

    // --- 4. Initialize Service Adapters ---
    let mailer: Arc<dyn MailService> = match &config.mail_api_url {
        Some(url) => {
            info!("Sending reminders through {}", url);
            Arc::new(HttpMailAdapter::new(
                url.clone(),
                config.mail_api_token.clone(),
                config.mail_from.clone(),
                config.mail_timeout,
            )?)
        }
        None => {
            info!("MAIL_API_URL not set; reminders will only be logged.");
            Arc::new(LogMailAdapter)
        }
    };

    let insight_adapter: Arc<dyn InsightService> = match &config.openai_api_key {
        Some(key) => {
            let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(key));
            Arc::new(OpenAiInsightAdapter::new(
                openai_client,
                config.insight_model.clone(),
            ))
        }
        None => Arc::new(StaticInsightAdapter),
    };

    let template = Arc::new(DefaultReminderTemplate {
        product_name: config.product_name.clone(),
        team_name: config.team_name.clone(),
    });
    let scheduler = Arc::new(
        ReminderScheduler::new(calendar.clone(), mailer, template)
            .with_staff_directory(staff.clone()),
    );

    // --- 5. Build the Shared AppState ---
    let store: Arc<dyn LendingRecordStore> = db_adapter;
    let app_state = Arc::new(AppState {
        store,
        config: config.clone(),
        calendar,
        scheduler,
        staff,
        insight_adapter,
        run_guard: Arc::new(Mutex::new(())),
    });

    let cors = CorsLayer::new()
        .allow_origin(
            "http://localhost:3000"
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS origin: {}", e)))?,
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static(ADMIN_ID_HEADER),
            HeaderName::from_static(ADMIN_PASSWORD_HEADER),
        ]);

    // --- 6. Create the Web Router ---
    let admin_layer = axum_middleware::from_fn_with_state(app_state.clone(), require_admin);

    // Public routes (no credentials required, apart from POST /devices)
    let public_routes = Router::new()
        .route("/calendar/holidays/{year}", get(holidays_handler))
        .route("/calendar/business-day", get(business_day_handler))
        .route("/calendar/offset", get(offset_handler))
        .route("/staff/login", post(staff_login_handler))
        .route("/admin/login", post(admin_login_handler))
        .route("/records", get(list_records_handler).post(create_record_handler))
        .route("/records/{id}/return", post(return_record_handler))
        .route("/records/{id}/return-date", put(change_return_date_handler))
        .route(
            "/devices",
            get(list_devices_handler)
                .merge(post(upsert_device_handler).route_layer(admin_layer.clone())),
        )
        .route("/insight", get(insight_handler));

    // Admin routes (x-admin-id / x-admin-password required)
    let admin_routes = Router::new()
        .route("/reminders/run", post(run_reminders_handler))
        .route("/history", get(list_history_handler))
        .route("/devices/{id}", delete(delete_device_handler))
        .layer(admin_layer);

    let api_router = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(cors)
        .with_state(app_state.clone());

    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Reminder Timer ---
    let cancellation_token = CancellationToken::new();
    let timer_handle = match config.reminder_interval {
        Some(interval) => Some(tokio::spawn(reminder_process(
            app_state,
            interval,
            cancellation_token.clone(),
        ))),
        None => {
            info!("REMINDER_INTERVAL_SECS is 0; reminders run only on demand.");
            None
        }
    };

    // --- 8. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let shutdown_token = cancellation_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received.");
            }
            shutdown_token.cancel();
        })
        .await?;

    cancellation_token.cancel();
    if let Some(handle) = timer_handle {
        if let Err(e) = handle.await {
            tracing::error!("Reminder timer task ended abnormally: {}", e);
        }
    }

    Ok(())
}
