use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use splitpot::config::CONFIG;
use splitpot::error::SplitpotError;
use splitpot::ledger::http::HttpLedgerClient;
use splitpot::logger::AuditEntry;
use splitpot::models::{Credential, TransactionKind, TransactionStatus};
use splitpot::service::ConfirmOutcome;
use splitpot::settlement::SettlementReport;
use splitpot::{Coordinator, InMemoryAudit, InMemoryDirectory, TransactionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

type AppCoordinator = Coordinator<HttpLedgerClient, InMemoryDirectory, InMemoryAudit>;

struct AppState {
    coordinator: AppCoordinator,
    directory: Arc<InMemoryDirectory>,
}

// Request structs for JSON payloads
#[derive(Deserialize)]
struct RegisterIdentityRequest {
    chat_identity: String,
    username: String,
    token: String,
}

#[derive(Deserialize)]
struct StartRequest {
    group_key: i64,
    issuer: String,
    participants: Vec<String>,
    kind: TransactionKind,
}

#[derive(Deserialize)]
struct SetAmountRequest {
    requester: String,
    amount: String,
}

#[derive(Deserialize)]
struct SetCurrencyRequest {
    requester: String,
    currency: String,
}

#[derive(Deserialize)]
struct SetCategoryRequest {
    requester: String,
    category: String,
}

#[derive(Deserialize)]
struct ConfirmRequest {
    participant: String,
}

#[derive(Deserialize)]
struct SettleRequest {
    requester: String,
}

#[derive(Deserialize)]
struct CancelRequest {
    requester: String,
}

// Newtype wrapper for SplitpotError to implement IntoResponse
struct ApiError(SplitpotError);

impl From<SplitpotError> for ApiError {
    fn from(err: SplitpotError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            SplitpotError::AlreadyActive(_) | SplitpotError::SettlementInProgress => {
                StatusCode::CONFLICT
            }
            SplitpotError::NotFound(_) => StatusCode::NOT_FOUND,
            SplitpotError::NotIssuer(_) | SplitpotError::NotAParticipant(_) => {
                StatusCode::FORBIDDEN
            }
            SplitpotError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            SplitpotError::NoParticipants
            | SplitpotError::InvalidAmount(_)
            | SplitpotError::InvalidCurrency(_)
            | SplitpotError::ConfirmationNotOpen
            | SplitpotError::IncompleteConfirmation => StatusCode::BAD_REQUEST,
            SplitpotError::NoAccounts
            | SplitpotError::NoMatchingCurrency(_)
            | SplitpotError::InsufficientFunds(_)
            | SplitpotError::CategoryProvisionFailed(_)
            | SplitpotError::SettlementPartialFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SplitpotError::LedgerRejected { .. } | SplitpotError::TransportError(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

async fn register_identity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterIdentityRequest>,
) -> StatusCode {
    state
        .directory
        .register(
            &req.chat_identity,
            Credential {
                username: req.username,
                token: req.token,
            },
        )
        .await;
    StatusCode::CREATED
}

async fn start_transaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<TransactionStatus>, ApiError> {
    let status = state
        .coordinator
        .start(req.group_key, &req.issuer, req.participants, req.kind)
        .await?;
    Ok(Json(status))
}

async fn set_amount(
    State(state): State<Arc<AppState>>,
    Path(group_key): Path<i64>,
    Json(req): Json<SetAmountRequest>,
) -> Result<Json<TransactionStatus>, ApiError> {
    let status = state
        .coordinator
        .set_amount(group_key, &req.requester, &req.amount)
        .await?;
    Ok(Json(status))
}

async fn set_currency(
    State(state): State<Arc<AppState>>,
    Path(group_key): Path<i64>,
    Json(req): Json<SetCurrencyRequest>,
) -> Result<Json<TransactionStatus>, ApiError> {
    let status = state
        .coordinator
        .set_currency(group_key, &req.requester, &req.currency)
        .await?;
    Ok(Json(status))
}

async fn set_category(
    State(state): State<Arc<AppState>>,
    Path(group_key): Path<i64>,
    Json(req): Json<SetCategoryRequest>,
) -> Result<Json<TransactionStatus>, ApiError> {
    let status = state
        .coordinator
        .set_category(group_key, &req.requester, &req.category)
        .await?;
    Ok(Json(status))
}

async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(group_key): Path<i64>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmOutcome>, ApiError> {
    let outcome = state
        .coordinator
        .confirm(group_key, &req.participant)
        .await?;
    Ok(Json(outcome))
}

async fn settle(
    State(state): State<Arc<AppState>>,
    Path(group_key): Path<i64>,
    Json(req): Json<SettleRequest>,
) -> Result<Json<SettlementReport>, ApiError> {
    let report = state.coordinator.settle(group_key, &req.requester).await?;
    Ok(Json(report))
}

async fn transaction_status(
    State(state): State<Arc<AppState>>,
    Path(group_key): Path<i64>,
) -> Result<Json<TransactionStatus>, ApiError> {
    let status = state.coordinator.status(group_key).await?;
    Ok(Json(status))
}

async fn cancel_transaction(
    State(state): State<Arc<AppState>>,
    Path(group_key): Path<i64>,
    Json(req): Json<CancelRequest>,
) -> Result<StatusCode, ApiError> {
    state.coordinator.cancel(group_key, &req.requester).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn audit_log(State(state): State<Arc<AppState>>) -> Json<Vec<AuditEntry>> {
    Json(state.coordinator.audit_entries().await)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(CONFIG.log_level.as_str())
        .init();

    let ledger = Arc::new(HttpLedgerClient::new(
        CONFIG.ledger_base_url.clone(),
        Duration::from_secs(CONFIG.ledger_timeout_secs),
    )?);
    let directory = Arc::new(InMemoryDirectory::new());
    let store = TransactionStore::new(Duration::from_secs(CONFIG.transaction_timeout_secs));
    let coordinator = Coordinator::new(store, ledger, Arc::clone(&directory), InMemoryAudit::new());
    let state = Arc::new(AppState {
        coordinator,
        directory,
    });

    // Define API routes
    let app = Router::new()
        // add / route with a simple health check
        .route("/", get(|| async { "OK" }))
        .route("/directory", post(register_identity))
        .route("/transactions", post(start_transaction))
        .route("/transactions/{group_key}", get(transaction_status))
        .route("/transactions/{group_key}", delete(cancel_transaction))
        .route("/transactions/{group_key}/amount", post(set_amount))
        .route("/transactions/{group_key}/currency", post(set_currency))
        .route("/transactions/{group_key}/category", post(set_category))
        .route("/transactions/{group_key}/confirm", post(confirm))
        .route("/transactions/{group_key}/settle", post(settle))
        .route("/audit", get(audit_log))
        .layer(CompressionLayer::new()) // Gzip compression
        .layer(TimeoutLayer::new(Duration::from_secs(30))) // 30-second timeout
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([http::Method::GET, http::Method::POST, http::Method::DELETE])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http()) // Request tracing
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([127, 0, 0, 1], CONFIG.port));
    info!("Coordinator listening at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
