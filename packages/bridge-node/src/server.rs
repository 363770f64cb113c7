//! HTTP server for the bridge API, health and metrics endpoints
//!
//! - `POST /v1/lock`, `/v1/unlock`, `/v1/admin` - state-changing calls
//! - `GET /v1/accounts/{account}`, `/v1/intents/{hash}`, `/v1/signers`,
//!   `/v1/events?since=N` - queries
//! - `GET /health`, `/healthz`, `/readyz`, `/metrics` - operations

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bridge_core::{
    AccountId, AccountView, AdminIntent, AdminReceipt, Amount, BridgeController, BridgeError,
    IntentHash, ReplayRecord, SequencedEvent, SignatureSet, SignerSetView, TransferIntent,
    TransferReceipt, TransferStats,
};
use eyre::eyre;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Prometheus metrics
pub struct Metrics {
    pub transfers_committed_total: IntCounterVec,
    pub transfers_rejected_total: IntCounterVec,
    pub admin_actions_total: IntCounterVec,
    pub signer_set_version: IntGauge,
    pub replay_ledger_size: IntGauge,
    pub last_event_sequence: IntGauge,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let transfers_committed_total = IntCounterVec::new(
            Opts::new(
                "bridge_transfers_committed_total",
                "Total number of committed transfers",
            ),
            &["direction"],
        )?;

        let transfers_rejected_total = IntCounterVec::new(
            Opts::new(
                "bridge_transfers_rejected_total",
                "Total number of rejected transfers and admin intents by error code",
            ),
            &["code"],
        )?;

        let admin_actions_total = IntCounterVec::new(
            Opts::new(
                "bridge_admin_actions_total",
                "Total number of applied admin intents",
            ),
            &["action"],
        )?;

        let signer_set_version = IntGauge::new(
            "bridge_signer_set_version",
            "Version of the live signer set",
        )?;

        let replay_ledger_size = IntGauge::new(
            "bridge_replay_ledger_size",
            "Number of executed intent hashes",
        )?;

        let last_event_sequence = IntGauge::new(
            "bridge_last_event_sequence",
            "Sequence of the last finalized event seen by the event feed",
        )?;

        registry.register(Box::new(transfers_committed_total.clone()))?;
        registry.register(Box::new(transfers_rejected_total.clone()))?;
        registry.register(Box::new(admin_actions_total.clone()))?;
        registry.register(Box::new(signer_set_version.clone()))?;
        registry.register(Box::new(replay_ledger_size.clone()))?;
        registry.register(Box::new(last_event_sequence.clone()))?;

        Ok(Self {
            transfers_committed_total,
            transfers_rejected_total,
            admin_actions_total,
            signer_set_version,
            replay_ledger_size,
            last_event_sequence,
            registry,
        })
    }

    fn record_transfer(&self, result: &Result<TransferReceipt, BridgeError>) {
        match result {
            Ok(receipt) => self
                .transfers_committed_total
                .with_label_values(&[receipt.direction.as_str()])
                .inc(),
            Err(err) => self.record_rejection(err),
        }
    }

    fn record_rejection(&self, err: &BridgeError) {
        self.transfers_rejected_total
            .with_label_values(&[err.code()])
            .inc();
    }
}

pub type SharedMetrics = Arc<Metrics>;

/// Combined app state
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<BridgeController>,
    pub metrics: SharedMetrics,
    pub node_id: String,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// A [`BridgeError`] rendered as an HTTP response.
pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(err: &BridgeError) -> StatusCode {
    match err {
        BridgeError::AlreadyExecuted => StatusCode::CONFLICT,
        BridgeError::TimeLocked { .. } => StatusCode::TOO_MANY_REQUESTS,
        BridgeError::IntentExpired { .. } => StatusCode::GONE,
        BridgeError::BridgePaused => StatusCode::SERVICE_UNAVAILABLE,
        e if e.is_quorum_failure() => StatusCode::UNAUTHORIZED,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = ErrorBody {
            error: self.0.code().to_string(),
            message: self.0.to_string(),
            retryable: self.0.is_retryable(),
            retry_after: self.0.retry_after(),
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = self.0.retry_after() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Body deserialization failures carry the same error body as core
/// rejections, so malformed amounts, keys and intents surface as
/// `invalid_input`.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(BridgeError::InvalidInput(rejection.body_text()))
    }
}

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "not_found".to_string(),
            message: format!("{} not found", what),
            retryable: false,
            retry_after: None,
        }),
    )
        .into_response()
}

// ============================================================================
// Bridge API
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LockRequest {
    pub account: AccountId,
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub intent: TransferIntent,
    pub signatures: SignatureSet,
}

#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    pub intent: AdminIntent,
    pub signatures: SignatureSet,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}

fn request_body<T>(
    state: &AppState,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    match payload {
        Ok(Json(req)) => Ok(req),
        Err(rejection) => {
            let err = ApiError::from(rejection);
            state.metrics.record_rejection(&err.0);
            Err(err)
        }
    }
}

async fn lock(
    State(state): State<AppState>,
    payload: Result<Json<LockRequest>, JsonRejection>,
) -> Result<Json<TransferReceipt>, ApiError> {
    let req = request_body(&state, payload)?;
    let result = state.controller.lock(req.account, req.amount);
    state.metrics.record_transfer(&result);
    Ok(Json(result?))
}

async fn unlock(
    State(state): State<AppState>,
    payload: Result<Json<UnlockRequest>, JsonRejection>,
) -> Result<Json<TransferReceipt>, ApiError> {
    let req = request_body(&state, payload)?;
    let result = state.controller.unlock(&req.intent, &req.signatures);
    state.metrics.record_transfer(&result);
    Ok(Json(result?))
}

async fn administer(
    State(state): State<AppState>,
    payload: Result<Json<AdminRequest>, JsonRejection>,
) -> Result<Json<AdminReceipt>, ApiError> {
    let req = request_body(&state, payload)?;
    match state.controller.administer(&req.intent, &req.signatures) {
        Ok(receipt) => {
            state
                .metrics
                .admin_actions_total
                .with_label_values(&[receipt.action.name()])
                .inc();
            state.metrics.signer_set_version.set(receipt.new_version as i64);
            Ok(Json(receipt))
        }
        Err(err) => {
            state.metrics.record_rejection(&err);
            Err(err.into())
        }
    }
}

async fn account(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<AccountView>, ApiError> {
    let account: AccountId = account.parse()?;
    Ok(Json(state.controller.account(&account)))
}

async fn intent(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    let hash: IntentHash = match hash.parse() {
        Ok(hash) => hash,
        Err(err) => return ApiError(err).into_response(),
    };
    match state.controller.replay_record(&hash) {
        Some(record) => Json::<ReplayRecord>(record).into_response(),
        None => not_found("intent"),
    }
}

async fn signers(State(state): State<AppState>) -> Json<SignerSetView> {
    Json(state.controller.signer_set().view())
}

async fn events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<SequencedEvent>> {
    Json(state.controller.events_since(query.since))
}

// ============================================================================
// Operations
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub this_chain: u32,
    pub counterpart_chain: u32,
    pub signer_set_version: u64,
    pub threshold: u32,
    pub paused: bool,
    pub executed_intents: usize,
    pub stats: TransferStats,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.controller.signer_set();
    let settings = state.controller.settings();
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        this_chain: settings.this_chain.to_u32(),
        counterpart_chain: settings.counterpart_chain.to_u32(),
        signer_set_version: snapshot.version(),
        threshold: snapshot.threshold(),
        paused: snapshot.paused(),
        executed_intents: state.controller.executed_count(),
        stats: state.controller.stats(),
    })
}

/// Liveness probe (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Readiness probe: a paused bridge accepts no transfers
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.controller.signer_set().paused() {
        (StatusCode::SERVICE_UNAVAILABLE, "PAUSED")
    } else {
        (StatusCode::OK, "OK")
    }
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    state
        .metrics
        .signer_set_version
        .set(state.controller.signer_set().version() as i64);
    state
        .metrics
        .replay_ledger_size
        .set(state.controller.executed_count() as i64);

    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/lock", post(lock))
        .route("/v1/unlock", post(unlock))
        .route("/v1/admin", post(administer))
        .route("/v1/accounts/{account}", get(account))
        .route("/v1/intents/{hash}", get(intent))
        .route("/v1/signers", get(signers))
        .route("/v1/events", get(events))
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> eyre::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind and start the HTTP server
pub async fn start_server(
    bind_address: &str,
    port: u16,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> eyre::Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);
    info!("  /v1/*    - Bridge API (JSON)");
    info!("  /health  - Full health status (JSON)");
    info!("  /metrics - Prometheus metrics");

    serve(listener, state, shutdown).await
}
