use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::chain::{CommandExecutor, TransactionSource};
use crate::commands::Command;
use crate::engine::{RewardEngine, TransactionKind};
use crate::error::EngineError;
use crate::stake::PendingReleases;
use crate::threshold::{AutoBuyOutcome, ThresholdMonitor};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RewardEngine>,
    pub source: Arc<dyn TransactionSource>,
    pub executor: Arc<dyn CommandExecutor>,
    pub balance_check_delay: Duration,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/process-transaction", post(process_transaction))
        .route("/check-balance", post(check_balance))
        .route("/stakes/pending", get(pending_stakes))
        .route("/lottery/window", get(lottery_window))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Look up a transaction, apply it, and execute immediate commands.
/// Scheduled liquidity returns are left to the release worker.
async fn process_transaction(
    State(state): State<AppState>,
    Json(req): Json<ProcessTransactionRequest>,
) -> Result<Json<ProcessTransactionResponse>, ApiError> {
    let hash = req
        .tx_hash
        .filter(|h| !h.is_empty())
        .ok_or_else(|| EngineError::invalid_input("tx_hash is required"))?;

    let tx = state.source.get_transaction(&hash).await?;
    let outcome = state.engine.process(&tx)?;

    let mut executed = false;
    if let Some(command) = outcome.command.as_ref().filter(|c| c.timing.is_immediate()) {
        state.executor.execute(command).await?;
        executed = true;
    }

    Ok(Json(ProcessTransactionResponse {
        success: true,
        kind: outcome.kind,
        command: outcome.command,
        lottery_rank: outcome.lottery_rank,
        executed,
    }))
}

/// Wait for the contract balance to settle, then evaluate auto-buy.
async fn check_balance(State(state): State<AppState>) -> Result<Json<CheckBalanceResponse>, ApiError> {
    if !state.balance_check_delay.is_zero() {
        tokio::time::sleep(state.balance_check_delay).await;
    }

    let contract = &state.engine.config().contract_address;
    let balance = state.source.get_balance(contract).await?;
    let command = state.engine.evaluate_balance(balance);

    if let Some(command) = command.as_ref() {
        info!(balance, command = %command, "🛒 auto-buy triggered");
        state.executor.execute(command).await?;
    }

    Ok(Json(CheckBalanceResponse {
        success: true,
        outcome: ThresholdMonitor::outcome(command.as_ref()),
    }))
}

async fn pending_stakes(State(state): State<AppState>) -> Json<PendingReleases> {
    let snapshot = state.engine.ledger().lock().pending_releases();
    Json(snapshot)
}

async fn lottery_window(State(state): State<AppState>) -> Json<LotteryWindowResponse> {
    let window = state.engine.window();
    let guard = window.lock();
    Json(LotteryWindowResponse {
        entries: guard.len(),
        window_ms: guard.window_ms(),
    })
}

// ===== Request/Response Types =====

#[derive(Debug, Deserialize)]
struct ProcessTransactionRequest {
    tx_hash: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct ProcessTransactionResponse {
    success: bool,
    kind: TransactionKind,
    command: Option<Command>,
    lottery_rank: Option<u64>,
    executed: bool,
}

#[derive(Debug, Serialize)]
struct CheckBalanceResponse {
    success: bool,
    #[serde(flatten)]
    outcome: AutoBuyOutcome,
}

#[derive(Debug, Serialize)]
struct LotteryWindowResponse {
    entries: usize,
    window_ms: i64,
}

// ===== Error Handling =====

#[derive(Debug)]
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::Network(_) => StatusCode::BAD_GATEWAY,
            EngineError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(status = status.as_u16(), error = %self.0, "request failed");

        let body = Json(json!({
            "success": false,
            "error": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}
