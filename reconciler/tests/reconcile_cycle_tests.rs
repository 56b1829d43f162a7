//! Full cycles against a SQLite store and an in-process fake of the service
//! desk and SMS gateway.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use core_types::{IncidentRecord, IncidentStatus, TelemetrySnapshot};
use reconciler::{
    Reconciler, ServiceError, SmsClient, SmsConfig, TicketingClient, TicketingConfig,
};
use serde_json::{Value, json};
use storage::{Db, DbConfig, IncidentStore, PersistenceError};
use tempfile::TempDir;

#[derive(Default)]
struct FakeDesk {
    auth_calls: AtomicUsize,
    ticket_calls: AtomicUsize,
    sms_calls: AtomicUsize,
    reject_auth: Mutex<bool>,
    /// Replaces the 200 authentication body when set.
    auth_body: Mutex<Option<Value>>,
    /// Tickets whose subject contains this host get a 500.
    failing_host: Mutex<Option<String>>,
    subjects: Mutex<Vec<String>>,
    sms_bodies: Mutex<Vec<Value>>,
}

async fn authenticate(
    State(desk): State<Arc<FakeDesk>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    desk.auth_calls.fetch_add(1, Ordering::SeqCst);
    if *desk.reject_auth.lock().unwrap() || body["password"] != "s3cret" {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad credentials"})));
    }
    let body = desk
        .auth_body
        .lock()
        .unwrap()
        .clone()
        .unwrap_or_else(|| json!({"token": "tok-1", "renewToken": "renew-1"}));
    (StatusCode::OK, Json(body))
}

async fn create_item(
    State(desk): State<Arc<FakeDesk>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let n = desk.ticket_calls.fetch_add(1, Ordering::SeqCst);
    if headers.get("X-Authorization").and_then(|v| v.to_str().ok()) != Some("Bearer tok-1") {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    let subject = body["subject"].as_str().unwrap_or_default().to_string();
    desk.subjects.lock().unwrap().push(subject.clone());
    if let Some(host) = desk.failing_host.lock().unwrap().as_deref() {
        if subject.contains(host) {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"})));
        }
    }
    (StatusCode::CREATED, Json(json!({"id": 1000 + n as i64})))
}

async fn send_sms(
    State(desk): State<Arc<FakeDesk>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    desk.sms_calls.fetch_add(1, Ordering::SeqCst);
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some("sms-key") {
        return StatusCode::FORBIDDEN;
    }
    desk.sms_bodies.lock().unwrap().push(body);
    StatusCode::OK
}

async fn spawn_fake() -> (Arc<FakeDesk>, String) {
    let desk = Arc::new(FakeDesk::default());
    let app = Router::new()
        .route("/api/v9/authentication/", post(authenticate))
        .route("/api/v9/item/", post(create_item))
        .route("/sms/send", post(send_sms))
        .with_state(desk.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (desk, format!("http://{addr}"))
}

/// Delegates to the SQLite store, with switchable failures.
struct FlakyStore {
    inner: Db,
    fail_poll: AtomicBool,
    fail_resolve: AtomicBool,
}

impl FlakyStore {
    fn new(inner: Db) -> Self {
        Self {
            inner,
            fail_poll: AtomicBool::new(false),
            fail_resolve: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl IncidentStore for FlakyStore {
    async fn insert_incident(&self, record: &IncidentRecord) -> Result<(), PersistenceError> {
        self.inner.insert_incident(record).await
    }

    async fn insert_notification(&self, record: &IncidentRecord) -> Result<(), PersistenceError> {
        self.inner.insert_notification(record).await
    }

    async fn open_incidents(&self) -> Result<Vec<IncidentRecord>, PersistenceError> {
        if self.fail_poll.load(Ordering::SeqCst) {
            return Err(PersistenceError::Timeout("open incident query"));
        }
        self.inner.open_incidents().await
    }

    async fn mark_resolved(&self, id: i64) -> Result<(), PersistenceError> {
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(PersistenceError::Timeout("status update"));
        }
        self.inner.mark_resolved(id).await
    }
}

struct Harness {
    _dir: TempDir,
    db: Db,
    desk: Arc<FakeDesk>,
    base: String,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = Db::connect(&DbConfig::sqlite(&dir.path().join("incidents.db")))
            .await
            .unwrap();
        let (desk, base) = spawn_fake().await;
        Self {
            _dir: dir,
            db,
            desk,
            base,
        }
    }

    fn ticketing_config(&self) -> TicketingConfig {
        TicketingConfig {
            base_url: format!("{}/api/v9", self.base),
            user_name: "bot@example.com".into(),
            password: Some("s3cret".into()),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    fn sms_config(&self) -> SmsConfig {
        SmsConfig {
            base_url: self.base.clone(),
            api_key: Some("sms-key".into()),
            numbers: "5550001111".into(),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    fn reconciler(&self) -> Reconciler {
        self.reconciler_with(self.ticketing_config())
    }

    fn reconciler_with(&self, ticketing: TicketingConfig) -> Reconciler {
        self.assemble(Arc::new(self.db.clone()), ticketing, self.sms_config())
    }

    fn assemble(
        &self,
        store: Arc<dyn IncidentStore>,
        ticketing: TicketingConfig,
        sms: SmsConfig,
    ) -> Reconciler {
        Reconciler::new(
            store,
            TicketingClient::new(ticketing).unwrap(),
            SmsClient::new(sms).unwrap(),
        )
    }

    async fn open_incident(&self, host: &str) {
        let snapshot = TelemetrySnapshot {
            hostname: host.to_string(),
            serial_number: "5CG1234XYZ".into(),
            cpu_percent: 95.0,
            memory_percent: 40.0,
            disk_percent: 50.0,
            cpu_temperature: Some(60.0),
            user: "mlopez".into(),
            domain: "CORP".into(),
            ..Default::default()
        };
        let at = NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(17, 20, 0)
            .unwrap();
        self.db
            .insert_incident(&IncidentRecord::from_snapshot(&snapshot, at))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn open_incident_is_ticketed_resolved_and_texted_once() {
    let h = Harness::new().await;
    h.open_incident("PC01").await;
    let reconciler = h.reconciler();

    let report = reconciler.run_cycle().await;
    assert_eq!(report.polled, 1);
    assert_eq!(report.ticketed, 1);
    assert_eq!(report.resolved, 1);
    assert_eq!(report.sms_sent, 1);
    assert_eq!(report.failed, 0);

    assert_eq!(h.desk.auth_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.desk.ticket_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.desk.sms_calls.load(Ordering::SeqCst), 1);

    let subjects = h.desk.subjects.lock().unwrap().clone();
    assert!(subjects[0].contains("[incident:1] PC01"), "{subjects:?}");

    let sms = h.desk.sms_bodies.lock().unwrap().clone();
    assert_eq!(sms[0]["numbers"], "5550001111");
    assert_eq!(sms[0]["country_code"], "52");
    assert!(sms[0]["message"].as_str().unwrap().contains("PC01"));

    let rows = h.db.all_incidents().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, IncidentStatus::Resolved);

    // Nothing left to do on the next run.
    let again = reconciler.run_cycle().await;
    assert_eq!(again.polled, 0);
    assert_eq!(h.desk.ticket_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.desk.sms_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_authentication_leaves_incident_open() {
    let h = Harness::new().await;
    h.open_incident("PC01").await;
    *h.desk.reject_auth.lock().unwrap() = true;

    let report = h.reconciler().run_cycle().await;
    assert_eq!(report.polled, 1);
    assert_eq!(report.ticketed, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(h.desk.ticket_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.desk.sms_calls.load(Ordering::SeqCst), 0);

    let open = h.db.open_incidents().await.unwrap();
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn failing_ticket_does_not_block_the_next_incident() {
    let h = Harness::new().await;
    h.open_incident("PC01").await;
    h.open_incident("PC02").await;
    *h.desk.failing_host.lock().unwrap() = Some("PC01".into());

    let report = h.reconciler().run_cycle().await;
    assert_eq!(report.polled, 2);
    assert_eq!(report.ticketed, 1);
    assert_eq!(report.resolved, 1);
    assert_eq!(report.sms_sent, 1);
    assert_eq!(report.failed, 1);

    let open = h.db.open_incidents().await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].host_name, "PC01");

    // Once the desk recovers, the leftover incident goes through.
    *h.desk.failing_host.lock().unwrap() = None;
    let retry = h.reconciler().run_cycle().await;
    assert_eq!(retry.polled, 1);
    assert_eq!(retry.resolved, 1);
    assert!(h.db.open_incidents().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_password_fails_before_any_request() {
    let h = Harness::new().await;
    h.open_incident("PC01").await;

    let client = TicketingClient::new(TicketingConfig {
        password: None,
        ..h.ticketing_config()
    })
    .unwrap();
    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, ServiceError::NotConfigured(_)), "{err}");

    let report = h
        .reconciler_with(TicketingConfig {
            password: None,
            ..h.ticketing_config()
        })
        .run_cycle()
        .await;
    assert_eq!(report.failed, 1);
    assert_eq!(h.desk.auth_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.db.open_incidents().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unreachable_desk_is_a_transport_error() {
    let client = TicketingClient::new(TicketingConfig {
        base_url: "http://127.0.0.1:1/api/v9".into(),
        password: Some("s3cret".into()),
        timeout_secs: 2,
        ..Default::default()
    })
    .unwrap();
    let err = client.authenticate().await.unwrap_err();
    assert!(
        matches!(err, ServiceError::Transport { .. } | ServiceError::Timeout(_)),
        "{err}"
    );
}

#[tokio::test]
async fn empty_store_is_a_quiet_cycle() {
    let h = Harness::new().await;
    let report = h.reconciler().run_cycle().await;
    assert_eq!(report.polled, 0);
    assert!(!report.poll_failed);
    assert_eq!(h.desk.auth_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_status_update_still_sends_the_sms() {
    let h = Harness::new().await;
    h.open_incident("PC01").await;
    let store = Arc::new(FlakyStore::new(h.db.clone()));
    store.fail_resolve.store(true, Ordering::SeqCst);

    let reconciler = h.assemble(store.clone(), h.ticketing_config(), h.sms_config());
    let report = reconciler.run_cycle().await;
    assert_eq!(report.polled, 1);
    assert_eq!(report.ticketed, 1);
    assert_eq!(report.resolved, 0);
    assert_eq!(report.sms_sent, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(h.desk.sms_calls.load(Ordering::SeqCst), 1);

    // Still open, so the next cycle tickets it again under the same key.
    assert_eq!(h.db.open_incidents().await.unwrap().len(), 1);
    store.fail_resolve.store(false, Ordering::SeqCst);
    let retry = reconciler.run_cycle().await;
    assert_eq!(retry.resolved, 1);

    let subjects = h.desk.subjects.lock().unwrap().clone();
    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[0], subjects[1]);
    assert!(subjects[0].contains("[incident:1]"));
}

#[tokio::test]
async fn failed_sms_does_not_undo_the_resolution() {
    let h = Harness::new().await;
    h.open_incident("PC01").await;

    let sms = SmsConfig {
        api_key: Some("wrong-key".into()),
        ..h.sms_config()
    };
    let report = h
        .assemble(Arc::new(h.db.clone()), h.ticketing_config(), sms)
        .run_cycle()
        .await;

    assert_eq!(report.ticketed, 1);
    assert_eq!(report.resolved, 1);
    assert_eq!(report.sms_sent, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(h.desk.sms_calls.load(Ordering::SeqCst), 1);

    let rows = h.db.all_incidents().await.unwrap();
    assert_eq!(rows[0].status, IncidentStatus::Resolved);
}

#[tokio::test]
async fn authentication_without_a_token_is_malformed() {
    let h = Harness::new().await;
    h.open_incident("PC01").await;
    let client = TicketingClient::new(h.ticketing_config()).unwrap();

    for body in [json!({"renewToken": "renew-1"}), json!({"token": ""})] {
        *h.desk.auth_body.lock().unwrap() = Some(body.clone());
        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, ServiceError::Malformed { .. }), "{body}: {err}");
    }

    let report = h.reconciler().run_cycle().await;
    assert_eq!(report.ticketed, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(h.desk.ticket_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.desk.sms_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.db.open_incidents().await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_poll_is_reported_and_touches_nothing() {
    let h = Harness::new().await;
    h.open_incident("PC01").await;
    let store = Arc::new(FlakyStore::new(h.db.clone()));
    store.fail_poll.store(true, Ordering::SeqCst);

    let report = h
        .assemble(store, h.ticketing_config(), h.sms_config())
        .run_cycle()
        .await;
    assert!(report.poll_failed);
    assert_eq!(report.polled, 0);
    assert_eq!(h.desk.auth_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.db.open_incidents().await.unwrap().len(), 1);
}
