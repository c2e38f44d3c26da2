//! HTTP API for the wizard UI, submissions, catalog and the wallet bridge

use crate::catalog::{TokenCatalog, TokenSummary};
use crate::cell::{base64_to_boc, Address};
use crate::config::ApiConfig;
use crate::coordination::{
    BridgeSigner, PendingDispatch, SessionSnapshot, SubmissionCoordinator, SubmissionReceipt,
    SwapRequest, WalletResult,
};
use crate::error::{ErrorReport, LaunchError, LaunchResult};
use crate::state::{CreatedToken, TokenRepository};
use crate::tx::encoder::{decode_swap, decode_token_creation, DecodedCreation, DecodedSwap};
use crate::wizard::DraftPatch;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: SubmissionCoordinator,
    pub repository: Arc<dyn TokenRepository>,
    pub catalog: Arc<dyn TokenCatalog>,
    pub bridge: Arc<BridgeSigner>,
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> LaunchResult<()> {
    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.cors_origins)),
    );

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LaunchError::Internal(format!("API bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| LaunchError::Internal(format!("API server: {}", e)))?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .route("/wizard", get(get_wizard))
        .route("/wizard/next", post(wizard_next))
        .route("/wizard/back", post(wizard_back))
        .route("/wizard/reset", post(wizard_reset))
        .route("/wizard/submit", post(wizard_submit))
        .route("/wizard/cancel", post(wizard_cancel))
        .route("/swap", post(submit_swap))
        .route("/tokens", get(list_tokens))
        .route("/tokens/:id", get(get_token))
        .route("/tokens/:id/address", post(attach_token_address))
        .route("/catalog", get(list_catalog))
        .route("/catalog/:id", get(get_catalog_token))
        .route("/wallet/pending", get(wallet_pending))
        .route("/wallet/result", post(wallet_result))
        .route("/payload/decode", post(decode_payload))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Error surfaced to HTTP clients
pub enum ApiError {
    Launch(LaunchError),
    NotFound(String),
}

impl From<LaunchError> for ApiError {
    fn from(err: LaunchError) -> Self {
        ApiError::Launch(err)
    }
}

fn status_for(err: &LaunchError) -> StatusCode {
    match err {
        LaunchError::Validation(_) | LaunchError::AddressFormat { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LaunchError::CapacityExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        LaunchError::SubmissionInProgress | LaunchError::InvalidStateTransition { .. } => {
            StatusCode::CONFLICT
        }
        LaunchError::CatalogLookup { .. } => StatusCode::NOT_FOUND,
        LaunchError::UserRejected(_) | LaunchError::Decode(_) => StatusCode::BAD_REQUEST,
        LaunchError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        LaunchError::SealedCellMutation | LaunchError::Config(_) | LaunchError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Launch(err) => {
                (status_for(&err), Json(ErrorReport::from(&err))).into_response()
            }
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(NotFoundResponse {
                    kind: "not_found",
                    message: format!("{} not found", what),
                }),
            )
                .into_response(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_wizard(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.coordinator.snapshot().await)
}

async fn wizard_next(
    State(state): State<AppState>,
    Json(patch): Json<DraftPatch>,
) -> ApiResult<SessionSnapshot> {
    state.coordinator.next(patch).await?;
    Ok(Json(state.coordinator.snapshot().await))
}

async fn wizard_back(
    State(state): State<AppState>,
    patch: Option<Json<DraftPatch>>,
) -> Json<SessionSnapshot> {
    state.coordinator.back(patch.map(|Json(p)| p)).await;
    Json(state.coordinator.snapshot().await)
}

async fn wizard_reset(State(state): State<AppState>) -> Json<SessionSnapshot> {
    state.coordinator.reset().await;
    Json(state.coordinator.snapshot().await)
}

async fn wizard_submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<SubmissionReceipt> {
    let receipt = if request.exclusive {
        state.coordinator.try_submit(&request.owner).await?
    } else {
        state.coordinator.submit(&request.owner).await?
    };
    Ok(Json(receipt))
}

async fn wizard_cancel(State(state): State<AppState>) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.coordinator.cancel().await,
    })
}

async fn submit_swap(
    State(state): State<AppState>,
    Json(request): Json<SwapRequest>,
) -> ApiResult<SubmissionReceipt> {
    let receipt = state.coordinator.submit_swap(request).await?;
    Ok(Json(receipt))
}

async fn list_tokens(State(state): State<AppState>) -> ApiResult<Vec<CreatedToken>> {
    Ok(Json(state.repository.list().await?))
}

async fn get_token(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CreatedToken> {
    state
        .repository
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("token {}", id)))
}

/// Attach the deployed jetton address once it is known
async fn attach_token_address(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AttachAddressRequest>,
) -> ApiResult<CreatedToken> {
    let address = Address::parse(&request.address)?;
    if state.repository.find_by_id(id).await?.is_none() {
        return Err(ApiError::NotFound(format!("token {}", id)));
    }
    Ok(Json(state.repository.attach_address(id, address).await?))
}

async fn list_catalog(State(state): State<AppState>) -> ApiResult<Vec<TokenSummary>> {
    Ok(Json(state.catalog.list_tokens().await?))
}

async fn get_catalog_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TokenSummary> {
    Ok(Json(state.catalog.lookup_token(&id).await?))
}

/// The request the wallet UI should present, or 204 when there is none
async fn wallet_pending(State(state): State<AppState>) -> Response {
    match state.bridge.pending() {
        Some(pending) => Json::<PendingDispatch>(pending).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn wallet_result(
    State(state): State<AppState>,
    Json(request): Json<WalletResultRequest>,
) -> Result<Json<WalletResultResponse>, ApiError> {
    if state.bridge.resolve(request.request_id, request.result) {
        Ok(Json(WalletResultResponse { accepted: true }))
    } else {
        Err(ApiError::NotFound(format!(
            "pending wallet request {}",
            request.request_id
        )))
    }
}

/// Read a base64 BOC payload back into its message fields
async fn decode_payload(Json(request): Json<DecodeRequest>) -> ApiResult<DecodedPayload> {
    let payload = base64_to_boc(&request.payload)?;
    let decoded = match request.kind {
        PayloadKind::Mint => DecodedPayload::Mint(decode_token_creation(&payload)?),
        PayloadKind::Swap => DecodedPayload::Swap(decode_swap(&payload)?),
    };
    Ok(Json(decoded))
}

// Request and response types

#[derive(Deserialize)]
struct SubmitRequest {
    /// Connected wallet address, raw or user-friendly
    owner: String,
    /// Fail with 409 instead of joining a submission already in flight
    #[serde(default)]
    exclusive: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum PayloadKind {
    Mint,
    Swap,
}

#[derive(Deserialize)]
struct DecodeRequest {
    kind: PayloadKind,
    payload: String,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum DecodedPayload {
    Mint(DecodedCreation),
    Swap(DecodedSwap),
}

#[derive(Deserialize)]
struct AttachAddressRequest {
    address: String,
}

#[derive(Deserialize)]
struct WalletResultRequest {
    request_id: Uuid,
    result: WalletResult,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct CancelResponse {
    cancelled: bool,
}

#[derive(Serialize)]
struct WalletResultResponse {
    accepted: bool,
}

#[derive(Serialize)]
struct NotFoundResponse {
    kind: &'static str,
    message: String,
}
