//! End-to-end tests of the HTTP client against an in-process fake backend.
//!
//! The fake backend is a small axum app bound to an ephemeral port on
//! localhost, so these tests run without any external service:
//! `cargo test --package aquasense-core --test backend`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use aquasense_core::{
    ApiClient, AquaApi, AuthSession, ClientConfig, ConsoleEvent, ControlDispatcher, CycleOutcome,
    DeviceAction, DeviceId, Error, EventDispatcher, MemorySessionStore, MetricKind, PollerConfig,
    SessionStore, TelemetryPoller, account,
};

const TOKEN: &str = "tok-e2e-1";

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

#[derive(Debug)]
struct FakeBackend {
    ph: RwLock<f64>,
    temperature: RwLock<f64>,
    fail_non_ph: AtomicBool,
    fail_control: AtomicBool,
    token_expired: AtomicBool,
    unauthorized_replies: AtomicU32,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            ph: RwLock::new(7.0),
            temperature: RwLock::new(25.0),
            fail_non_ph: AtomicBool::new(false),
            fail_control: AtomicBool::new(false),
            token_expired: AtomicBool::new(false),
            unauthorized_replies: AtomicU32::new(0),
        })
    }

    fn check_auth(&self, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if bearer == Some(TOKEN) && !self.token_expired.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.unauthorized_replies.fetch_add(1, Ordering::SeqCst);
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Could not validate credentials"})),
        ))
    }
}

fn server_error(detail: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": detail })),
    )
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn login(Form(form): Form<LoginForm>) -> Reply {
    if form.username == "admin" && form.password == "password123" {
        Ok(Json(json!({"access_token": TOKEN, "token_type": "bearer"})))
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Incorrect username or password"})),
        ))
    }
}

async fn me(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap) -> Reply {
    backend.check_auth(&headers)?;
    Ok(Json(json!({
        "_id": "665f1c",
        "username": "admin",
        "name": "Plant Admin",
        "email": "admin@example.com",
        "role": "admin",
        "is_active": true
    })))
}

async fn logout(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap) -> Reply {
    backend.check_auth(&headers)?;
    Ok(Json(json!({"message": "Logged out"})))
}

async fn latest(
    State(backend): State<Arc<FakeBackend>>,
    headers: HeaderMap,
    Path(segment): Path<String>,
) -> Reply {
    backend.check_auth(&headers)?;
    let timestamp = "2024-05-01T10:15:00.123";
    match segment.as_str() {
        "ph" => Ok(Json(json!({"ph": *backend.ph.read().await, "timestamp": timestamp}))),
        _ if backend.fail_non_ph.load(Ordering::SeqCst) => Err(server_error("sensor offline")),
        "temperature" => Ok(Json(
            json!({"temperature": *backend.temperature.read().await, "timestamp": timestamp}),
        )),
        "turbidity" => Ok(Json(json!({"NTU": 3.5, "timestamp": timestamp}))),
        "nh3" => Ok(Json(json!({"NH3": 0.01, "timestamp": timestamp}))),
        "tds" => Ok(Json(json!({"tds": 280, "timestamp": timestamp}))),
        _ => Err((StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"})))),
    }
}

async fn history(
    State(backend): State<Arc<FakeBackend>>,
    headers: HeaderMap,
    Path(segment): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Reply {
    backend.check_auth(&headers)?;
    let limit = query.limit.unwrap_or(20);
    let records: Vec<Value> = (0..limit.min(30))
        .map(|i| json!({ "ph": 7.0 + i as f64 / 10.0, "timestamp": format!("2024-05-01T10:{:02}:00", 59 - i) }))
        .collect();
    match segment.as_str() {
        "ph" => Ok(Json(Value::Array(records))),
        _ => Ok(Json(json!([]))),
    }
}

async fn analysis(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap) -> Reply {
    backend.check_auth(&headers)?;
    if backend.fail_non_ph.load(Ordering::SeqCst) {
        return Err(server_error("analysis unavailable"));
    }
    Ok(Json(json!({"status": "normal", "message": "All parameters in range"})))
}

async fn control(
    State(backend): State<Arc<FakeBackend>>,
    headers: HeaderMap,
    Path((device, action)): Path<(String, String)>,
) -> Reply {
    backend.check_auth(&headers)?;
    if backend.fail_control.load(Ordering::SeqCst) {
        return Err(server_error("Actuator bus unavailable"));
    }
    Ok(Json(json!({
        "status": "success",
        "message": format!("{device} turned {action}"),
        "device": device,
        "action": action
    })))
}

async fn spawn_backend(backend: Arc<FakeBackend>) -> String {
    let app = Router::new()
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/logout", post(logout))
        .route("/v1/users/me", get(me))
        .route("/sensors/latest/{metric}", get(latest))
        .route("/sensors/history/{metric}", get(history))
        .route("/sensors/status/analysis", get(analysis))
        .route("/control/{device}/{action}", post(control))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

struct Harness {
    backend: Arc<FakeBackend>,
    store: Arc<MemorySessionStore>,
    session: Arc<AuthSession>,
    client: Arc<ApiClient>,
}

async fn harness() -> Harness {
    let backend = FakeBackend::new();
    let url = spawn_backend(Arc::clone(&backend)).await;
    let store = Arc::new(MemorySessionStore::new());
    let session = Arc::new(AuthSession::new(
        Arc::clone(&store) as Arc<dyn SessionStore>,
        EventDispatcher::default(),
    ));
    let client = Arc::new(
        ApiClient::new(
            ClientConfig::new(url).account_prefix("/v1"),
            Arc::clone(&session),
        )
        .unwrap(),
    );
    Harness {
        backend,
        store,
        session,
        client,
    }
}

fn drain_login_required(rx: &mut aquasense_core::EventReceiver) -> usize {
    let mut count = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, ConsoleEvent::LoginRequired { .. }) {
            count += 1;
        }
    }
    count
}

#[tokio::test]
async fn login_then_me_populates_user_data() {
    let h = harness().await;

    let user = account::login(h.client.as_ref(), &h.session, "admin", "password123")
        .await
        .unwrap();

    assert_eq!(user.username, "admin");
    assert_eq!(user.id.as_deref(), Some("665f1c"));
    assert_eq!(h.session.token().await.as_deref(), Some(TOKEN));
    let stored = h.store.stored();
    assert_eq!(stored.access_token.as_deref(), Some(TOKEN));
    assert_eq!(stored.user_data.map(|u| u.username).as_deref(), Some("admin"));
}

#[tokio::test]
async fn wrong_password_is_rejected_without_invalidation() {
    let h = harness().await;
    let mut events = h.session.events().subscribe();

    let err = account::login(h.client.as_ref(), &h.session, "admin", "nope")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Invalid username or password");
    assert!(!h.session.is_authenticated().await);
    assert_eq!(drain_login_required(&mut events), 0);
}

#[tokio::test]
async fn one_metric_succeeds_rest_fail() {
    let h = harness().await;
    account::login(h.client.as_ref(), &h.session, "admin", "password123")
        .await
        .unwrap();
    let poller = Arc::new(TelemetryPoller::new(
        Arc::clone(&h.client) as Arc<dyn AquaApi>,
        PollerConfig::default(),
    ));

    let first = poller.poll_now().await;
    assert!(matches!(first, CycleOutcome::Published { connected: true, .. }));
    assert_eq!(poller.snapshot().value(MetricKind::Temperature), 25.0);

    *h.backend.ph.write().await = 7.2;
    *h.backend.temperature.write().await = 31.0;
    h.backend.fail_non_ph.store(true, Ordering::SeqCst);

    let second = poller.poll_now().await;
    assert!(matches!(second, CycleOutcome::Published { connected: false, .. }));
    let snapshot = poller.snapshot();
    assert_eq!(snapshot.value(MetricKind::Ph), 7.2);
    assert_eq!(snapshot.value(MetricKind::Temperature), 25.0);
    assert_eq!(snapshot.value(MetricKind::Turbidity), 3.5);
    assert_eq!(snapshot.value(MetricKind::DissolvedSolids), 280.0);
    assert!(!snapshot.connected);
}

#[tokio::test]
async fn failed_command_keeps_confirmed_state() {
    let h = harness().await;
    account::login(h.client.as_ref(), &h.session, "admin", "password123")
        .await
        .unwrap();
    let control = ControlDispatcher::new(
        Arc::clone(&h.client) as Arc<dyn AquaApi>,
        EventDispatcher::default(),
    );
    let pump1 = DeviceId::new("pump1").unwrap();

    let ack = control.send(&pump1, DeviceAction::On).await.unwrap();
    assert!(ack.is_success());
    assert!(control.state().is_on(&pump1));

    h.backend.fail_control.store(true, Ordering::SeqCst);
    let err = control.send(&pump1, DeviceAction::Off).await.unwrap_err();
    assert!(matches!(err, Error::ServerRejection { status: 500, .. }));
    assert_eq!(err.to_string(), "Actuator bus unavailable");
    assert!(control.state().is_on(&pump1));
}

#[tokio::test]
async fn concurrent_unauthorized_responses_require_login_once() {
    let h = harness().await;
    account::login(h.client.as_ref(), &h.session, "admin", "password123")
        .await
        .unwrap();
    let mut events = h.session.events().subscribe();
    let poller = Arc::new(TelemetryPoller::new(
        Arc::clone(&h.client) as Arc<dyn AquaApi>,
        PollerConfig::default(),
    ));

    h.backend.token_expired.store(true, Ordering::SeqCst);
    let outcome = poller.poll_now().await;

    assert!(matches!(outcome, CycleOutcome::Published { connected: false, .. }));
    assert_eq!(h.backend.unauthorized_replies.load(Ordering::SeqCst), 6);
    assert!(!h.session.is_authenticated().await);
    assert!(h.session.user().await.is_none());
    assert_eq!(h.store.stored(), Default::default());
    assert_eq!(drain_login_required(&mut events), 1);

    // Without a token, later failures do not signal again.
    let _ = h.client.latest(MetricKind::Ph).await;
    assert_eq!(drain_login_required(&mut events), 0);
}

#[tokio::test]
async fn logout_clears_session_and_signals_once() {
    let h = harness().await;
    account::login(h.client.as_ref(), &h.session, "admin", "password123")
        .await
        .unwrap();
    let mut events = h.session.events().subscribe();

    assert!(account::logout(h.client.as_ref(), &h.session).await);
    assert!(!h.session.is_authenticated().await);
    assert_eq!(drain_login_required(&mut events), 1);
}

#[tokio::test]
async fn history_arrives_oldest_first() {
    let h = harness().await;
    account::login(h.client.as_ref(), &h.session, "admin", "password123")
        .await
        .unwrap();

    let records = h.client.history(MetricKind::Ph, 5).await.unwrap();
    assert_eq!(records.len(), 5);

    let formatter = aquasense_core::SeriesFormatter::new(time::UtcOffset::UTC);
    let points = formatter.format(MetricKind::Ph, &records, 5);
    let labels: Vec<_> = points.iter().map(|p| p.display_time.as_str()).collect();
    assert_eq!(labels, vec!["10:55", "10:56", "10:57", "10:58", "10:59"]);
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let session = Arc::new(AuthSession::in_memory());
    let client = ApiClient::new(ClientConfig::new("http://127.0.0.1:9"), session).unwrap();
    let err = client.latest(MetricKind::Ph).await.unwrap_err();
    assert!(matches!(err, Error::Network { .. }));
    assert!(err.is_cycle_fatal());
}
