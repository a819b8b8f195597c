//! Axum route handlers for the HRMS chat gateway.
//!
//! The chat endpoint is the only one with orchestration logic: credential
//! check, message validation, fallback resolution, then audit scheduling
//! off the response path. Every other endpoint is an authenticated
//! parameterized query against storage.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::audit::{AuditLogger, ChatTurn};
use crate::auth::{AuthedUser, TokenVerifier};
use crate::error::AppError;
use crate::nlu::resolver::FallbackResolver;
use crate::notify::send_notification;
use crate::store::{
    AttendanceTodayRow, ChatAnalytics, ChatLogRow, LeaveApplication, PayslipRow, PolicyRow, Store,
};

/// Shared application state: constructed once at startup, cloned per
/// request.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<TokenVerifier>,
    pub resolver: Arc<FallbackResolver>,
    pub audit: Arc<AuditLogger>,
    pub store: Arc<Store>,
}

impl AppState {
    pub fn new(
        verifier: TokenVerifier,
        resolver: FallbackResolver,
        audit: AuditLogger,
        store: Store,
    ) -> Self {
        Self {
            verifier: Arc::new(verifier),
            resolver: Arc::new(resolver),
            audit: Arc::new(audit),
            store: Arc::new(store),
        }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/api/healthz", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/history", get(chat_history_handler))
        .route("/api/analytics", get(chat_analytics_handler))
        .route("/api/leave/apply", post(leave_apply_handler))
        .route("/api/leave/status", get(leave_status_handler))
        .route("/api/leave/balance", get(leave_balance_handler))
        .route("/api/attendance/today", get(attendance_today_handler))
        .route("/api/attendance/history", get(attendance_history_handler))
        .route("/api/payslip/latest", get(payslip_latest_handler))
        .route("/api/payslip/history", get(payslip_history_handler))
        .route("/api/tax/summary", get(tax_summary_handler))
        .route("/api/onboarding/status", get(onboarding_status_handler))
        .route("/api/onboarding/documents", get(onboarding_documents_handler))
        .route("/api/policy/:policy_name", get(policy_handler))
        .route("/api/faq", get(faq_handler))
        .route("/api/reimbursement/process", get(reimbursement_handler))
        .route("/api/holiday/calendar", get(holiday_calendar_handler))
        .route("/api/hrms/webhook", post(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request/response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "web".to_string()
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub intent: String,
}

/// Inbound HRMS event. Fields are lenient on purpose: the webhook contract
/// is to acknowledge whatever the HRMS sends.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AttendanceHistoryParams {
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PayslipHistoryParams {
    months: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HolidayParams {
    year: Option<i32>,
}

/// Today's attendance, or the sentinel payload when no record exists.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AttendanceToday {
    Present(AttendanceTodayRow),
    Missing { status: String },
}

/// Latest payslip, or the sentinel payload when none exists.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum LatestPayslip {
    Found(PayslipRow),
    Missing { payslip_url: Option<String> },
}

/// Policy content, or the sentinel payload when no policy matches. A miss
/// is an explicit non-error: the lookup answers 200 either way.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PolicyLookup {
    Found(PolicyRow),
    Missing { content: String },
}

/// Validate an optional query parameter against its allowed range.
fn bounded(name: &str, value: Option<i64>, default: i64, min: i64, max: i64) -> Result<i64, AppError> {
    let value = value.unwrap_or(default);
    if value < min || value > max {
        return Err(AppError::InvalidArgument(format!(
            "{name} must be within {min}..={max}"
        )));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// POST /api/chat — resolve a message through the NLU pipeline.
///
/// Validation runs before any engine call; the audit insert is scheduled
/// only once the reply payload is finalized, and never awaited here.
async fn chat_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::InvalidArgument(
            "message must not be empty".to_string(),
        ));
    }

    let reply = state.resolver.resolve(&claims.sub, &message).await?;

    let turn = ChatTurn {
        user_id: claims.sub,
        message,
        response: reply.text.clone(),
        channel: request.channel,
        created_at: Utc::now(),
    };
    let payload = ChatResponse {
        response: reply.text,
        intent: reply.intent,
    };

    state.audit.record(turn);

    Ok(Json(payload))
}

/// GET /api/history — caller's chat turns, newest first.
async fn chat_history_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ChatLogRow>>, AppError> {
    let limit = bounded("limit", params.limit, 100, 1, 500)?;
    let rows = state.store.chat_history(&claims.sub, limit).await?;
    Ok(Json(rows))
}

/// GET /api/analytics — usage counters over the whole chat log.
async fn chat_analytics_handler(
    State(state): State<AppState>,
    _user: AuthedUser,
) -> Result<Json<ChatAnalytics>, AppError> {
    Ok(Json(state.store.chat_analytics().await?))
}

// ---------------------------------------------------------------------------
// Leave
// ---------------------------------------------------------------------------

/// POST /api/leave/apply — file a leave request and notify the caller.
async fn leave_apply_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
    Json(application): Json<LeaveApplication>,
) -> Result<Json<Value>, AppError> {
    state
        .store
        .insert_leave_request(&claims.sub, &application)
        .await?;
    send_notification(
        &claims.sub,
        "LeaveApplied",
        &format!(
            "{} from {} to {}",
            application.leave_type, application.start_date, application.end_date
        ),
    );
    Ok(Json(serde_json::json!({ "status": "Leave request submitted" })))
}

async fn leave_status_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
) -> Result<Json<Vec<crate::store::LeaveRequestRow>>, AppError> {
    Ok(Json(state.store.leave_requests(&claims.sub).await?))
}

async fn leave_balance_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
) -> Result<Json<Vec<crate::store::LeaveBalanceRow>>, AppError> {
    Ok(Json(state.store.leave_balances(&claims.sub).await?))
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

async fn attendance_today_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
) -> Result<Json<AttendanceToday>, AppError> {
    let response = match state.store.attendance_today(&claims.sub).await? {
        Some(row) => AttendanceToday::Present(row),
        None => AttendanceToday::Missing {
            status: "No attendance record found.".to_string(),
        },
    };
    Ok(Json(response))
}

async fn attendance_history_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
    Query(params): Query<AttendanceHistoryParams>,
) -> Result<Json<Vec<crate::store::AttendanceDayRow>>, AppError> {
    let days = bounded("days", params.days, 7, 1, 31)?;
    Ok(Json(state.store.attendance_history(&claims.sub, days).await?))
}

// ---------------------------------------------------------------------------
// Payslips and tax
// ---------------------------------------------------------------------------

async fn payslip_latest_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
) -> Result<Json<LatestPayslip>, AppError> {
    let response = match state.store.latest_payslip(&claims.sub).await? {
        Some(row) => LatestPayslip::Found(row),
        None => LatestPayslip::Missing { payslip_url: None },
    };
    Ok(Json(response))
}

async fn payslip_history_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
    Query(params): Query<PayslipHistoryParams>,
) -> Result<Json<Vec<PayslipRow>>, AppError> {
    let months = bounded("months", params.months, 6, 1, 24)?;
    Ok(Json(state.store.payslip_history(&claims.sub, months).await?))
}

async fn tax_summary_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
) -> Result<Json<Vec<crate::store::TaxSummaryRow>>, AppError> {
    Ok(Json(state.store.tax_summaries(&claims.sub).await?))
}

// ---------------------------------------------------------------------------
// Onboarding
// ---------------------------------------------------------------------------

async fn onboarding_status_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
) -> Result<Json<Vec<crate::store::OnboardingStepRow>>, AppError> {
    Ok(Json(state.store.onboarding_steps(&claims.sub).await?))
}

async fn onboarding_documents_handler(
    State(state): State<AppState>,
    AuthedUser(claims): AuthedUser,
) -> Result<Json<Vec<crate::store::OnboardingDocumentRow>>, AppError> {
    Ok(Json(state.store.onboarding_documents(&claims.sub).await?))
}

// ---------------------------------------------------------------------------
// Company-wide lookups
// ---------------------------------------------------------------------------

async fn policy_handler(
    State(state): State<AppState>,
    _user: AuthedUser,
    Path(policy_name): Path<String>,
) -> Result<Json<PolicyLookup>, AppError> {
    let response = match state.store.policy(&policy_name).await? {
        Some(row) => PolicyLookup::Found(row),
        None => PolicyLookup::Missing {
            content: "Policy not found.".to_string(),
        },
    };
    Ok(Json(response))
}

async fn faq_handler(
    State(state): State<AppState>,
    _user: AuthedUser,
) -> Result<Json<Vec<crate::store::FaqRow>>, AppError> {
    Ok(Json(state.store.faqs().await?))
}

async fn reimbursement_handler(
    State(state): State<AppState>,
    _user: AuthedUser,
) -> Result<Json<Vec<crate::store::ReimbursementStepRow>>, AppError> {
    Ok(Json(state.store.reimbursement_process().await?))
}

async fn holiday_calendar_handler(
    State(state): State<AppState>,
    _user: AuthedUser,
    Query(params): Query<HolidayParams>,
) -> Result<Json<Vec<crate::store::HolidayRow>>, AppError> {
    Ok(Json(state.store.holiday_calendar(params.year).await?))
}

// ---------------------------------------------------------------------------
// Health and webhook
// ---------------------------------------------------------------------------

/// GET /api/healthz — liveness probe.
async fn health_handler() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

/// POST /api/hrms/webhook — acknowledge an inbound HRMS event.
///
/// Fire-and-forget: the notification carries no delivery guarantee and the
/// acknowledgement is unconditional.
async fn webhook_handler(Json(event): Json<WebhookEvent>) -> Json<Value> {
    send_notification(&event.user_id, &event.event_type, &event.details.to_string());
    Json(serde_json::json!({ "status": "notified" }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use tower::ServiceExt;

    use crate::audit::{ChatLogSink, SinkError};
    use crate::auth::Claims;
    use crate::nlu::engine::{EngineError, IntentEngine, IntentResult, ReplyEngine};

    const SECRET: &str = "test-secret";

    #[derive(Debug)]
    struct ScriptedPrimary {
        result: Option<IntentResult>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl IntentEngine for ScriptedPrimary {
        async fn detect_intent(
            &self,
            _session: &str,
            _message: &str,
        ) -> Result<IntentResult, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Some(result) => Ok(result.clone()),
                None => Err(EngineError::Status {
                    service: "dialogflow",
                    status: 503,
                    body: "unavailable".into(),
                }),
            }
        }
    }

    #[derive(Debug)]
    struct ScriptedSecondary {
        text: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReplyEngine for ScriptedSecondary {
        async fn reply(&self, _message: &str, _sender: &str) -> Result<String, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.clone())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        turns: Mutex<Vec<ChatTurn>>,
    }

    #[async_trait]
    impl ChatLogSink for MemorySink {
        async fn insert_chat_turn(&self, turn: &ChatTurn) -> Result<(), SinkError> {
            self.turns.lock().unwrap().push(turn.clone());
            Ok(())
        }
    }

    struct Fixture {
        app: Router,
        primary_calls: Arc<AtomicUsize>,
        secondary_calls: Arc<AtomicUsize>,
        sink: Arc<MemorySink>,
    }

    fn fixture(primary: Option<IntentResult>, secondary_text: &str) -> Fixture {
        let primary_calls = Arc::new(AtomicUsize::new(0));
        let secondary_calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(MemorySink::default());

        let resolver = FallbackResolver::new(
            Arc::new(ScriptedPrimary {
                result: primary,
                calls: primary_calls.clone(),
            }),
            Arc::new(ScriptedSecondary {
                text: secondary_text.to_string(),
                calls: secondary_calls.clone(),
            }),
            0.4,
        );

        // Lazy pool: none of these tests reach PostgreSQL.
        let pool = sqlx::PgPool::connect_lazy("postgresql://postgres@localhost:5432/hrms_test")
            .unwrap();

        let state = AppState::new(
            TokenVerifier::new(SECRET),
            resolver,
            AuditLogger::new(sink.clone()),
            Store::new(pool),
        );

        Fixture {
            app: app_router(state),
            primary_calls,
            secondary_calls,
            sink,
        }
    }

    fn token(sub: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn chat_request(token: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_for_turns(sink: &MemorySink, expected: usize) {
        for _ in 0..100 {
            if sink.turns.lock().unwrap().len() >= expected {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("audit log never reached {expected} turns");
    }

    #[tokio::test]
    async fn test_health_endpoint_is_unauthenticated() {
        let fixture = fixture(None, "");
        let request = Request::builder()
            .uri("/api/healthz")
            .body(Body::empty())
            .unwrap();

        let response = fixture.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::VERSION);
    }

    #[tokio::test]
    async fn test_chat_without_token_is_unauthorized() {
        let fixture = fixture(None, "");
        let request = chat_request(None, &serde_json::json!({"message": "hi"}));

        let response = fixture.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(fixture.primary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chat_with_tampered_token_is_unauthorized() {
        let fixture = fixture(None, "");
        let claims = Claims {
            sub: "u1".into(),
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"wrong-secret"),
        )
        .unwrap();
        let request = chat_request(Some(&forged), &serde_json::json!({"message": "hi"}));

        let response = fixture.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_whitespace_message_rejected_before_any_engine_call() {
        let fixture = fixture(
            Some(IntentResult {
                text: "unused".into(),
                intent: "unused".into(),
                confidence: 1.0,
                is_fallback: false,
            }),
            "unused",
        );
        let request = chat_request(
            Some(&token("u1")),
            &serde_json::json!({"message": "   \n\t "}),
        );

        let response = fixture.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(fixture.primary_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_turn_uses_secondary_text_and_audits_once() {
        let fixture = fixture(
            Some(IntentResult {
                text: "".into(),
                intent: "leave_apply".into(),
                confidence: 0.2,
                is_fallback: true,
            }),
            "Sure, when would you like to start?",
        );
        let request = chat_request(
            Some(&token("u1")),
            &serde_json::json!({
                "message": "I want to apply for leave",
                "channel": "teams",
            }),
        );

        let response = fixture.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["response"], "Sure, when would you like to start?");
        assert_eq!(json["intent"], "leave_apply");
        assert_eq!(fixture.secondary_calls.load(Ordering::SeqCst), 1);

        wait_for_turns(&fixture.sink, 1).await;
        let turns = fixture.sink.turns.lock().unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].user_id, "u1");
        assert_eq!(turns[0].channel, "teams");
        assert_eq!(turns[0].message, "I want to apply for leave");
        assert_eq!(turns[0].response, "Sure, when would you like to start?");
    }

    #[tokio::test]
    async fn test_confident_turn_never_contacts_secondary() {
        let fixture = fixture(
            Some(IntentResult {
                text: "Hello! How can I help?".into(),
                intent: "greeting".into(),
                confidence: 0.95,
                is_fallback: false,
            }),
            "unused",
        );
        let request = chat_request(Some(&token("u1")), &serde_json::json!({"message": "hi"}));

        let response = fixture.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["response"], "Hello! How can I help?");
        assert_eq!(json["intent"], "greeting");
        assert_eq!(fixture.secondary_calls.load(Ordering::SeqCst), 0);

        wait_for_turns(&fixture.sink, 1).await;
        assert_eq!(fixture.sink.turns.lock().unwrap()[0].channel, "web");
    }

    #[tokio::test]
    async fn test_primary_outage_maps_to_bad_gateway() {
        let fixture = fixture(None, "unused");
        let request = chat_request(Some(&token("u1")), &serde_json::json!({"message": "hi"}));

        let response = fixture.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(fixture.secondary_calls.load(Ordering::SeqCst), 0);
        // No successful response, so nothing to audit.
        assert!(fixture.sink.turns.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_limit_out_of_range_is_rejected() {
        let fixture = fixture(None, "");
        for limit in ["0", "501"] {
            let request = Request::builder()
                .uri(format!("/api/history?limit={limit}"))
                .header("authorization", format!("Bearer {}", token("u1")))
                .body(Body::empty())
                .unwrap();

            let response = fixture.app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_without_auth() {
        let fixture = fixture(None, "");
        let request = Request::builder()
            .method("POST")
            .uri("/api/hrms/webhook")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({
                    "user_id": "u7",
                    "event_type": "PayslipReady",
                    "details": {"month": "2026-07"},
                })
                .to_string(),
            ))
            .unwrap();

        let response = fixture.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "notified");
    }

    #[test]
    fn test_bounded_validation() {
        assert_eq!(bounded("limit", None, 100, 1, 500).unwrap(), 100);
        assert_eq!(bounded("limit", Some(250), 100, 1, 500).unwrap(), 250);
        assert!(bounded("limit", Some(0), 100, 1, 500).is_err());
        assert!(bounded("limit", Some(501), 100, 1, 500).is_err());
    }
}
