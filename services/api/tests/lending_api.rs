//! Handler-level tests for the lending endpoints, run against an in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use api_lib::adapters::{LogMailAdapter, StaticInsightAdapter};
use api_lib::config::Config;
use api_lib::web::{
    calendar::{offset_handler, OffsetQuery, MAX_OFFSET_DAYS},
    rest::{
        change_return_date_handler, create_record_handler, delete_device_handler,
        list_records_handler, return_record_handler, run_reminders_handler,
        ChangeReturnDateRequest, CreateRecordRequest, RunQuery,
    },
    run_reminders_once, AppState,
};
use async_trait::async_trait;
use axum::{
    body::to_bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use lending_core::{
    DefaultReminderTemplate, Device, DeviceStatus, HistoryAction, HistoryEntry, HolidayCalendar,
    LendingRecord, LendingRecordStore, LendingStatus, MailService, PortError, PortResult,
    ReminderKind, ReminderPayload, ReminderScheduler, Staff, StaticStaffDirectory,
};
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryStore {
    records: Mutex<Vec<LendingRecord>>,
    devices: Mutex<HashMap<String, Device>>,
    history: Mutex<Vec<HistoryEntry>>,
}

#[async_trait]
impl LendingRecordStore for MemoryStore {
    async fn list_records(&self) -> PortResult<Vec<LendingRecord>> {
        Ok(self.records.lock().await.clone())
    }

    async fn get_record(&self, record_id: &str) -> PortResult<LendingRecord> {
        self.records
            .lock()
            .await
            .iter()
            .find(|r| r.id == record_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Record {} not found", record_id)))
    }

    async fn insert_record(&self, record: &LendingRecord) -> PortResult<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn save_records(&self, records: &[LendingRecord]) -> PortResult<()> {
        let mut stored = self.records.lock().await;
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(slot) => *slot = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn mark_reminder_sent(
        &self,
        record_id: &str,
        kind: ReminderKind,
        due_on: NaiveDate,
    ) -> PortResult<bool> {
        let mut stored = self.records.lock().await;
        match stored.iter_mut().find(|r| r.id == record_id) {
            Some(record) if record.is_active() && record.expected_return_date == due_on => {
                Ok(record.reminders_sent.insert(kind))
            }
            _ => Ok(false),
        }
    }

    async fn list_devices(&self) -> PortResult<Vec<Device>> {
        Ok(self.devices.lock().await.values().cloned().collect())
    }

    async fn get_device(&self, device_id: &str) -> PortResult<Device> {
        self.devices
            .lock()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Device {} not found", device_id)))
    }

    async fn upsert_device(&self, device: &Device) -> PortResult<()> {
        self.devices
            .lock()
            .await
            .insert(device.id.clone(), device.clone());
        Ok(())
    }

    async fn delete_device(&self, device_id: &str) -> PortResult<()> {
        self.devices
            .lock()
            .await
            .remove(device_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Device {} not found", device_id)))
    }

    async fn append_history(&self, entries: &[HistoryEntry]) -> PortResult<()> {
        self.history.lock().await.extend_from_slice(entries);
        Ok(())
    }

    async fn list_history(&self, limit: i64) -> PortResult<Vec<HistoryEntry>> {
        let history = self.history.lock().await;
        Ok(history.iter().rev().take(limit as usize).cloned().collect())
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

/// Returns the record while its reminder is being delivered, as a user
/// pressing "return" during a reminder run would.
struct ReturningMailer {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl MailService for ReturningMailer {
    async fn send(&self, _payload: &ReminderPayload) -> PortResult<bool> {
        let returned: Vec<_> = self
            .store
            .list_records()
            .await?
            .iter()
            .map(LendingRecord::mark_returned)
            .collect();
        self.store.save_records(&returned).await?;
        Ok(true)
    }
}

fn test_state(store: Arc<MemoryStore>) -> Arc<AppState> {
    test_state_with_mailer(store, Arc::new(LogMailAdapter))
}

fn test_state_with_mailer(store: Arc<MemoryStore>, mailer: Arc<dyn MailService>) -> Arc<AppState> {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused".to_string()),
        "ADMIN_PASSWORD" => Some("secret".to_string()),
        _ => None,
    })
    .expect("test config should load");
    let calendar = Arc::new(HolidayCalendar::weekends_only());
    let staff = Arc::new(StaticStaffDirectory::new(vec![Staff {
        id: "E001".to_string(),
        name: "山田 太郎".to_string(),
        email: "yamada@example.com".to_string(),
    }]));
    let scheduler = Arc::new(ReminderScheduler::new(
        calendar.clone(),
        mailer,
        Arc::new(DefaultReminderTemplate::default()),
    ));
    Arc::new(AppState {
        store,
        config: Arc::new(config),
        calendar,
        scheduler,
        staff,
        insight_adapter: Arc::new(StaticInsightAdapter),
        run_guard: Arc::new(Mutex::new(())),
    })
}

async fn seed_device(store: &MemoryStore, id: &str) {
    seed_device_with_status(store, id, DeviceStatus::Available).await;
}

async fn seed_device_with_status(store: &MemoryStore, id: &str, status: DeviceStatus) {
    store
        .upsert_device(&Device {
            id: id.to_string(),
            category: "iPhone".to_string(),
            device_number: "No.1".to_string(),
            status,
            lending_count: 0,
            asset_id: None,
            phone_number: None,
            location: None,
        })
        .await
        .expect("seed device");
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn create_request(expected_return_date: NaiveDate) -> CreateRecordRequest {
    CreateRecordRequest {
        device_id: "dev-1".to_string(),
        employee_id: "E001".to_string(),
        user_name: None,
        user_email: None,
        start_date: Some(date(2024, 1, 1)),
        expected_return_date,
        reason: "出張".to_string(),
    }
}

#[tokio::test]
async fn creating_a_record_borrows_the_device_and_fills_staff_details() {
    let store = Arc::new(MemoryStore::default());
    seed_device(&store, "dev-1").await;
    let state = test_state(store.clone());

    let response = create_record_handler(State(state.clone()), Json(create_request(date(2024, 1, 10))))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["user_name"], "山田 太郎");
    assert_eq!(body["user_email"], "yamada@example.com");
    assert_eq!(body["status"], "active");

    let device = store.get_device("dev-1").await.expect("device exists");
    assert_eq!(device.status, DeviceStatus::Borrowed);
    assert_eq!(device.lending_count, 1);
    let history = store.history.lock().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, HistoryAction::Lending);
}

#[tokio::test]
async fn borrowed_device_cannot_be_lent_twice() {
    let store = Arc::new(MemoryStore::default());
    seed_device(&store, "dev-1").await;
    let state = test_state(store.clone());

    let first = create_record_handler(State(state.clone()), Json(create_request(date(2024, 1, 10))))
        .await
        .into_response();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = create_record_handler(State(state), Json(create_request(date(2024, 1, 12))))
        .await
        .into_response();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(store.records.lock().await.len(), 1);
}

#[tokio::test]
async fn device_awaiting_inspection_cannot_be_lent() {
    let store = Arc::new(MemoryStore::default());
    seed_device_with_status(&store, "dev-1", DeviceStatus::Returned).await;
    let state = test_state(store.clone());

    let response = create_record_handler(State(state), Json(create_request(date(2024, 1, 10))))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(store.records.lock().await.is_empty());
    let device = store.get_device("dev-1").await.expect("device exists");
    assert_eq!(device.status, DeviceStatus::Returned);
    assert_eq!(device.lending_count, 0);
}

#[tokio::test]
async fn unknown_device_is_not_found() {
    let store = Arc::new(MemoryStore::default());
    let state = test_state(store);

    let response = create_record_handler(State(state), Json(create_request(date(2024, 1, 10))))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn returning_a_record_frees_the_device_once() {
    let store = Arc::new(MemoryStore::default());
    seed_device(&store, "dev-1").await;
    let state = test_state(store.clone());
    let created = body_json(
        create_record_handler(State(state.clone()), Json(create_request(date(2024, 1, 10))))
            .await
            .into_response(),
    )
    .await;
    let id = created["id"].as_str().expect("record id").to_string();

    let response = return_record_handler(State(state.clone()), Path(id.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "returned");
    assert_eq!(body["overdue"], false);
    assert_eq!(body["business_days_overdue"], 0);
    let device = store.get_device("dev-1").await.expect("device exists");
    assert_eq!(device.status, DeviceStatus::Returned);

    let again = return_record_handler(State(state), Path(id)).await.into_response();
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn changing_the_return_date_clears_sent_reminders() {
    let store = Arc::new(MemoryStore::default());
    seed_device(&store, "dev-1").await;
    let state = test_state(store.clone());
    create_record_handler(State(state.clone()), Json(create_request(date(2024, 1, 10))))
        .await
        .into_response();

    // 2024-01-09 is one business day before the 10th.
    let run = run_reminders_handler(
        State(state.clone()),
        Query(RunQuery {
            today: Some(date(2024, 1, 9)),
        }),
    )
    .await
    .into_response();
    assert_eq!(run.status(), StatusCode::OK);
    assert_eq!(body_json(run).await["sent_count"], 1);

    let id = store.records.lock().await[0].id.clone();
    let response = change_return_date_handler(
        State(state),
        Path(id),
        Json(ChangeReturnDateRequest {
            expected_return_date: date(2024, 1, 17),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["expected_return_date"], "2024-01-17");
    assert_eq!(body["reminders_sent"], serde_json::json!([]));

    let history = store.history.lock().await;
    let actions: Vec<_> = history.iter().map(|h| h.action).collect();
    assert_eq!(
        actions,
        vec![
            HistoryAction::Lending,
            HistoryAction::ReminderSent,
            HistoryAction::DateChange
        ]
    );
}

#[tokio::test]
async fn concurrent_run_is_rejected() {
    let store = Arc::new(MemoryStore::default());
    let state = test_state(store);
    let _held = state.run_guard.lock().await;

    let response = run_reminders_handler(State(state.clone()), Query(RunQuery { today: None }))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn listed_records_report_days_overdue() {
    let store = Arc::new(MemoryStore::default());
    seed_device(&store, "dev-1").await;
    let state = test_state(store);
    let mut request = create_request(date(2000, 1, 10));
    request.start_date = Some(date(2000, 1, 4));
    create_record_handler(State(state.clone()), Json(request))
        .await
        .into_response();

    let response = list_records_handler(State(state)).await.into_response();
    let body = body_json(response).await;
    let records = body.as_array().expect("array body");
    assert_eq!(records.len(), 1);
    let days = records[0]["days_overdue"].as_i64().expect("number");
    let business_days = records[0]["business_days_overdue"].as_i64().expect("number");
    assert!(days > 7);
    assert!(business_days > 0 && business_days < days);
    assert_eq!(records[0]["overdue"], true);
    assert_eq!(records[0]["week_overdue"], true);
}

#[tokio::test]
async fn return_during_a_run_is_not_undone() {
    let store = Arc::new(MemoryStore::default());
    seed_device(&store, "dev-1").await;
    let state = test_state_with_mailer(store.clone(), Arc::new(ReturningMailer { store: store.clone() }));
    create_record_handler(State(state.clone()), Json(create_request(date(2024, 1, 10))))
        .await
        .into_response();

    let summary = run_reminders_once(&state, date(2024, 1, 9))
        .await
        .expect("run should succeed");
    assert_eq!(summary.sent_count, 1);

    let stored = store.records.lock().await[0].clone();
    assert_eq!(stored.status, LendingStatus::Returned);
    assert!(stored.reminders_sent.is_empty());
}

#[tokio::test]
async fn sent_reminder_is_kept_when_nothing_changed_mid_run() {
    let store = Arc::new(MemoryStore::default());
    seed_device(&store, "dev-1").await;
    let state = test_state(store.clone());
    create_record_handler(State(state.clone()), Json(create_request(date(2024, 1, 10))))
        .await
        .into_response();

    run_reminders_once(&state, date(2024, 1, 9))
        .await
        .expect("run should succeed");
    let again = run_reminders_once(&state, date(2024, 1, 9))
        .await
        .expect("run should succeed");
    assert_eq!(again.sent_count, 0);

    let stored = store.records.lock().await[0].clone();
    assert!(stored.has_sent(ReminderKind::BeforeDue));
}

#[tokio::test]
async fn offset_rejects_out_of_range_days() {
    let state = test_state(Arc::new(MemoryStore::default()));

    for days in [MAX_OFFSET_DAYS + 1, -(MAX_OFFSET_DAYS + 1), i64::MAX, i64::MIN] {
        let response = offset_handler(
            State(state.clone()),
            Query(OffsetQuery {
                date: date(2024, 1, 1),
                days,
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "days = {}", days);
    }

    let response = offset_handler(
        State(state),
        Query(OffsetQuery {
            date: date(2024, 1, 1),
            days: MAX_OFFSET_DAYS,
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn available_device_can_be_deleted() {
    let store = Arc::new(MemoryStore::default());
    seed_device(&store, "dev-1").await;
    let state = test_state(store.clone());

    let response = delete_device_handler(State(state.clone()), Path("dev-1".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(store.devices.lock().await.is_empty());

    let again = delete_device_handler(State(state), Path("dev-1".to_string()))
        .await
        .into_response();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn borrowed_device_cannot_be_deleted() {
    let store = Arc::new(MemoryStore::default());
    seed_device(&store, "dev-1").await;
    let state = test_state(store.clone());
    create_record_handler(State(state.clone()), Json(create_request(date(2024, 1, 10))))
        .await
        .into_response();

    let response = delete_device_handler(State(state), Path("dev-1".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(store.devices.lock().await.contains_key("dev-1"));
}
