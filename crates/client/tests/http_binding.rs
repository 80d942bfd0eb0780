use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use cargolane_auth::{
    Action, PermissionExplanation, Principal, Role, explain_permission, load_restrictions,
};
use cargolane_client::{ApiClient, ClientConfig};
use cargolane_core::{BookingId, TransportError, UserId};
use cargolane_onboarding::{AccessGate, AccessRequirement, Scope, StatusSource, steps};
use cargolane_session::{LocalSessionCache, MemoryStore};
use cargolane_settlement::{
    PaymentStatus, PaymentTransport, RedirectSignal, ReconcilerConfig, SettlementOutcome,
    SettlementReconciler,
};

const TOKEN: &str = "test-token";

/// In-process stand-in for the backend.
#[derive(Default)]
struct Backend {
    requests: Mutex<Vec<Recorded>>,
    booking_fetches: AtomicUsize,
    /// The booking reads as paid from this fetch on (1-based); 0 = never.
    paid_from_fetch: usize,
    /// Answer booking fetches with a body that is not a booking.
    malformed_booking: bool,
    /// Delay before answering status fetches.
    status_delay: Option<Duration>,
    principal: Option<Value>,
}

#[derive(Debug, Clone)]
struct Recorded {
    route: String,
    bearer: Option<String>,
    body: Option<Value>,
}

impl Backend {
    fn record(&self, route: impl Into<String>, headers: &HeaderMap, body: Option<Value>) {
        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        self.requests.lock().unwrap().push(Recorded {
            route: route.into(),
            bearer,
            body,
        });
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

struct TestServer {
    base_url: String,
    backend: Arc<Backend>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(backend: Backend) -> Self {
        let backend = Arc::new(backend);
        let app = Router::new()
            .route("/onboarding/status/:scope", get(step_tree))
            .route("/payments/bookings/:id/sync", post(sync_payment))
            .route("/payments/bookings/:id/checkout", post(checkout))
            .route("/bookings/:id", get(booking))
            .route("/staff/me/restrictions", get(restrictions))
            .route("/auth/me", get(me))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            backend,
            handle,
        }
    }

    fn client(&self) -> ApiClient {
        let config = ClientConfig::new(&self.base_url).unwrap().with_token(TOKEN);
        ApiClient::new(config).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn step_tree(
    State(backend): State<Arc<Backend>>,
    Path(scope): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    backend.record(format!("GET status/{scope}"), &headers, None);
    if let Some(delay) = backend.status_delay {
        tokio::time::sleep(delay).await;
    }
    match scope.as_str() {
        "user" => Ok(Json(json!({
            "scope": "user",
            "steps": {
                "email_verification": { "completed": true, "completedAt": "2025-03-01T09:30:00Z" },
                "profile_completion": { "completed": true },
                "first_booking": { "completed": false },
            },
            "completed": false,
            "progress": 66,
        }))),
        "organization" => Ok(Json(json!({
            "scope": "organization",
            "steps": {
                "organization_profile": { "completed": true },
                "payment_setup": { "completed": false },
                "first_shipment": { "completed": false },
            },
            "completed": false,
            "progress": 33,
        }))),
        _ => Err((StatusCode::NOT_FOUND, format!("unknown scope {scope}"))),
    }
}

async fn sync_payment(
    State(backend): State<Arc<Backend>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    backend.record(format!("POST sync/{id}"), &headers, Some(body));
    Json(json!({ "paymentStatus": "PENDING" }))
}

async fn checkout(
    State(backend): State<Arc<Backend>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Json<Value> {
    backend.record(format!("POST checkout/{id}"), &headers, None);
    Json(json!({ "sessionId": "cs_retry", "url": format!("https://pay.example/{id}") }))
}

async fn booking(
    State(backend): State<Arc<Backend>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, &'static str)> {
    backend.record(format!("GET booking/{id}"), &headers, None);
    if backend.malformed_booking {
        return Ok(Json(json!({ "unexpected": true })));
    }
    if id.parse::<BookingId>().is_err() {
        return Err((StatusCode::NOT_FOUND, "booking not found"));
    }

    let n = backend.booking_fetches.fetch_add(1, Ordering::SeqCst) + 1;
    let paid = backend.paid_from_fetch != 0 && n >= backend.paid_from_fetch;
    Ok(Json(json!({
        "id": id,
        "paymentStatus": if paid { "PAID" } else { "PENDING" },
        "payment": { "id": BookingId::new(), "status": "processing", "amount": 99.0 },
    })))
}

async fn restrictions(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Json<Value> {
    backend.record("GET restrictions", &headers, None);
    Json(json!({ "acceptBooking": false, "viewAnalytics": true }))
}

async fn me(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    backend.record("GET me", &headers, None);
    backend.principal.clone().map(Json).ok_or(StatusCode::UNAUTHORIZED)
}

#[tokio::test]
async fn step_trees_are_fetched_per_scope_with_bearer_token() {
    let srv = TestServer::spawn(Backend::default()).await;
    let client = srv.client();

    let user = client.fetch_step_tree(Scope::User).await.unwrap();
    assert_eq!(user.scope, Scope::User);
    assert_eq!(user.step_completed(steps::FIRST_BOOKING), Some(false));
    let keys: Vec<&str> = user.steps.iter().map(|(k, _)| k).collect();
    assert_eq!(
        keys,
        [steps::EMAIL_VERIFICATION, steps::PROFILE_COMPLETION, steps::FIRST_BOOKING]
    );

    let org = client.fetch_step_tree(Scope::Organization).await.unwrap();
    assert_eq!(org.step_completed(steps::PAYMENT_SETUP), Some(false));

    let requests = srv.backend.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.bearer.as_deref() == Some(TOKEN)));
}

#[tokio::test]
async fn sync_sends_session_id_only_when_present() {
    let srv = TestServer::spawn(Backend::default()).await;
    let client = srv.client();
    let booking = BookingId::new();

    let response = client.sync_payment(booking, Some("cs_123")).await.unwrap();
    assert_eq!(response.payment_status, PaymentStatus::Pending);
    client.sync_payment(booking, None).await.unwrap();

    let bodies: Vec<Value> = srv
        .backend
        .requests()
        .into_iter()
        .filter_map(|r| r.body)
        .collect();
    assert_eq!(bodies, vec![json!({ "sessionId": "cs_123" }), json!({})]);
}

#[tokio::test]
async fn non_success_status_maps_to_api_error() {
    let srv = TestServer::spawn(Backend::default()).await;

    // No principal configured: /auth/me answers 401.
    let err = srv.client().fetch_me().await.unwrap_err();
    assert!(matches!(err, TransportError::Api(401, _)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn unexpected_body_maps_to_parse_error() {
    let srv = TestServer::spawn(Backend {
        malformed_booking: true,
        ..Backend::default()
    })
    .await;

    let err = srv.client().fetch_booking(BookingId::new()).await.unwrap_err();
    assert!(matches!(err, TransportError::Parse(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn unreachable_backend_maps_to_network_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::new(&format!("http://{addr}")).unwrap();
    let client = ApiClient::new(config).unwrap();

    let err = client.fetch_step_tree(Scope::User).await.unwrap_err();
    assert!(matches!(err, TransportError::Network(_)));
}

#[tokio::test]
async fn slow_backend_maps_to_timeout() {
    let srv = TestServer::spawn(Backend {
        status_delay: Some(Duration::from_secs(5)),
        ..Backend::default()
    })
    .await;
    let config = ClientConfig::new(&srv.base_url)
        .unwrap()
        .with_timeout(Duration::from_millis(100));
    let client = ApiClient::new(config).unwrap();

    let err = client.fetch_step_tree(Scope::User).await.unwrap_err();
    assert_eq!(err, TransportError::Timeout);
    assert!(err.is_transient());
}

#[tokio::test]
async fn staff_restrictions_drive_the_permission_resolver() {
    let staff_id = UserId::new();
    let srv = TestServer::spawn(Backend {
        principal: Some(json!({
            "id": staff_id,
            "role": "ORG_STAFF",
            "isEmailVerified": true,
            "onboardingCompleted": true,
        })),
        ..Backend::default()
    })
    .await;
    let client = srv.client();

    let principal = client.fetch_me().await.unwrap();
    assert_eq!(principal.id, staff_id);
    assert_eq!(principal.role, Role::OrgStaff);

    let restrictions = load_restrictions(&principal, &client).await;
    let denied: PermissionExplanation =
        explain_permission(&principal, &Action::ACCEPT_BOOKING, restrictions.as_ref());
    let allowed = explain_permission(&principal, &Action::VIEW_ANALYTICS, restrictions.as_ref());

    assert!(!denied.granted);
    assert!(allowed.granted);
}

#[tokio::test]
async fn gate_over_http_sends_admin_to_payment_setup() {
    let srv = TestServer::spawn(Backend::default()).await;
    let cache = LocalSessionCache::new(Arc::new(MemoryStore::new()));
    let gate = AccessGate::new(Arc::new(srv.client()), cache);
    let admin = Principal::new(UserId::new(), Role::OrgAdmin).with_email_verified(true);

    let decision = gate
        .check(
            Some(&admin),
            &AccessRequirement::for_roles([Role::OrgAdmin]),
            "/company/dashboard",
        )
        .await;

    assert_eq!(decision.redirect_target(), Some("/onboarding/payment"));
}

#[tokio::test]
async fn reconciler_over_http_confirms_after_verifying() {
    let srv = TestServer::spawn(Backend {
        paid_from_fetch: 2,
        ..Backend::default()
    })
    .await;
    let booking = BookingId::new();
    let reconciler = SettlementReconciler::new(Arc::new(srv.client()))
        .with_config(ReconcilerConfig::default().with_retry_delay(Duration::from_millis(10)));

    let outcome = reconciler
        .run(
            booking,
            RedirectSignal::Success {
                session_ref: Some("cs_abc".to_string()),
            },
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, SettlementOutcome::ConfirmedAfterVerifying { attempts: 2 });

    let routes: Vec<String> = srv.backend.requests().into_iter().map(|r| r.route).collect();
    assert_eq!(
        routes,
        vec![
            format!("POST sync/{booking}"),
            format!("POST sync/{booking}"),
            format!("GET booking/{booking}"),
            format!("POST sync/{booking}"),
            format!("GET booking/{booking}"),
        ]
    );

    let session = reconciler.retry_checkout(booking).await.unwrap();
    assert_eq!(session.session_ref, "cs_retry");
}
