//! HTTP API handlers for the petcare gateway.
//!
//! The gateway owns one [`CareController`] and exposes it to a presentation
//! layer. Handlers never leak remote error details: failures are reported
//! with the same short messages a user would see, while the detail goes to
//! the logs and the telemetry journal.
//!
//! # Status codes
//!
//! - `409 Conflict`: no pet selected, or the same action is already running
//! - `422 Unprocessable Entity`: validation failure (with field messages)
//! - `502 Bad Gateway`: the backend call failed
//! - `503 Service Unavailable`: an optional service is not configured

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::controller::{
    ActionOutcome, CareController, ControllerView, Reconciliation, RefreshMode,
};
use crate::error::{CareError, FieldError, REFRESH_FAILED_MESSAGE};
use crate::model::{Accessory, CareAction, CareActionKind, PetAccessory};
use crate::remote::{AccessoryClient, ChatClient, ChatCommand, Closet};
use crate::storage::{ActionRecord, Outcome, Storage};

/// Capacity of the realtime accessory push channel.
const REALTIME_CHANNEL_CAPACITY: usize = 32;

/// Largest telemetry page served at once.
const MAX_TELEMETRY_LIMIT: u32 = 500;

/// Closet of the selected pet plus the sending half of its realtime feed.
///
/// Replacing the slot drops the sender, which ends the old fan-in task.
struct ClosetSlot {
    closet: Closet,
    pushes: mpsc::Sender<Vec<PetAccessory>>,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: CareController,
    pub chat: Option<ChatClient>,
    pub accessories: AccessoryClient,
    pub storage: Option<Storage>,
    closet: Arc<Mutex<Option<ClosetSlot>>>,
}

impl AppState {
    pub fn new(
        controller: CareController,
        chat: Option<ChatClient>,
        accessories: AccessoryClient,
        storage: Option<Storage>,
    ) -> Self {
        Self {
            controller,
            chat,
            accessories,
            storage,
            closet: Arc::new(Mutex::new(None)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ClosetSlot>> {
        self.closet.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a fresh closet for `pet_id`, wiring up its realtime feed.
    pub fn open_closet(&self, pet_id: &str) -> Closet {
        let closet = Closet::new(self.accessories.clone(), pet_id);
        let (pushes, feed) = mpsc::channel(REALTIME_CHANNEL_CAPACITY);
        closet.attach_realtime(feed);

        *self.slot() = Some(ClosetSlot {
            closet: closet.clone(),
            pushes,
        });
        closet
    }

    /// Closet of the selected pet, if any.
    pub fn closet(&self) -> Option<Closet> {
        self.slot().as_ref().map(|slot| slot.closet.clone())
    }

    fn realtime_sender(&self) -> Option<mpsc::Sender<Vec<PetAccessory>>> {
        self.slot().as_ref().map(|slot| slot.pushes.clone())
    }
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/pet", get(get_pet))
        .route("/pet/select", post(select_pet))
        .route("/pet/refresh", post(refresh_pet))
        .route("/pet/rename", post(rename_pet))
        .route("/pet/actions/:action", post(perform_action))
        .route("/banners/:id", delete(dismiss_banner))
        .route("/banners/:id/retry", post(retry_banner))
        .route("/chat", post(send_chat))
        .route("/accessories", get(get_accessories))
        .route("/accessories/equip", post(equip_accessory))
        .route("/accessories/realtime", post(push_accessories))
        .route("/telemetry/recent", get(get_telemetry))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
}

/// Handler error, rendered as a status code plus a user-safe message.
#[derive(Debug)]
pub enum ApiError {
    Care(CareError),
    Refresh(CareError),
    NotFound(&'static str),
    Unavailable(&'static str),
}

impl From<CareError> for ApiError {
    fn from(e: CareError) -> Self {
        ApiError::Care(e)
    }
}

fn care_status(e: &CareError) -> StatusCode {
    match e {
        CareError::NoPetSelected | CareError::AlreadyInFlight(_) => StatusCode::CONFLICT,
        CareError::ValidationFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CareError::NetworkOrServerFailure { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, fields) = match self {
            ApiError::Care(e) => {
                let fields = match &e {
                    CareError::ValidationFailure(fields) => fields.clone(),
                    _ => Vec::new(),
                };
                (care_status(&e), e.user_message(), fields)
            }
            ApiError::Refresh(e) => {
                let message = match &e {
                    CareError::NetworkOrServerFailure { .. } => {
                        REFRESH_FAILED_MESSAGE.to_string()
                    }
                    other => other.user_message(),
                };
                (care_status(&e), message, Vec::new())
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, message.to_string(), Vec::new())
            }
            ApiError::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, message.to_string(), Vec::new())
            }
        };

        (status, Json(ErrorBody { error, fields })).into_response()
    }
}

// ============================================================================
// Pet
// ============================================================================

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// GET /pet - Everything the view renders: clamped stats, stage, diary,
/// reaction, live transient feedback and banners.
pub async fn get_pet(State(state): State<AppState>) -> Json<ControllerView> {
    Json(state.controller.snapshot(Utc::now()))
}

#[derive(Debug, Deserialize)]
pub struct SelectPetRequest {
    pub pet_id: String,
}

/// POST /pet/select - Make a pet active and load it.
///
/// # Request Body
///
/// ```json
/// { "pet_id": "pet-1" }
/// ```
#[instrument(skip(state))]
pub async fn select_pet(
    State(state): State<AppState>,
    Json(request): Json<SelectPetRequest>,
) -> Result<Json<ControllerView>, ApiError> {
    let pet_id = request.pet_id.trim();
    if pet_id.is_empty() {
        return Err(CareError::invalid("pet_id", "Choose a pet.").into());
    }

    state.controller.select_pet(pet_id);

    let closet = state.open_closet(pet_id);
    if let Err(e) = closet.load().await {
        warn!(error = %e, "Failed to load accessories");
    }

    state
        .controller
        .refresh_from_server(RefreshMode::Explicit)
        .await
        .map_err(ApiError::Refresh)?;
    state.controller.refresh_balance().await;

    info!(pet_id, "Pet loaded");
    Ok(Json(state.controller.snapshot(Utc::now())))
}

/// POST /pet/refresh - Reload stats and diary now.
#[instrument(skip(state))]
pub async fn refresh_pet(State(state): State<AppState>) -> Result<Json<ControllerView>, ApiError> {
    state
        .controller
        .refresh_from_server(RefreshMode::Explicit)
        .await
        .map_err(ApiError::Refresh)?;

    Ok(Json(state.controller.snapshot(Utc::now())))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// POST /pet/rename - Rename the active pet.
#[instrument(skip(state, request))]
pub async fn rename_pet(
    State(state): State<AppState>,
    Json(request): Json<RenameRequest>,
) -> Result<StatusCode, ApiError> {
    state.controller.rename_pet(&request.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionRequest {
    /// Food id, game id, or rest hours (string or number).
    #[serde(default)]
    pub param: Option<serde_json::Value>,
}

/// POST /pet/actions/:action - Feed, play, bathe or rest.
///
/// # Request Body
///
/// ```json
/// { "param": "standard" }
/// ```
///
/// The body is optional; each action has a default parameter.
#[instrument(skip(state, body))]
pub async fn perform_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
    body: Option<Json<ActionRequest>>,
) -> Result<Json<ActionOutcome>, ApiError> {
    let kind: CareActionKind = action
        .parse()
        .map_err(|_| ApiError::NotFound("Unknown care action."))?;

    let param = body.and_then(|Json(b)| b.param).map(|value| match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    });

    let action = CareAction::from_request(kind, param.as_deref())?;
    let outcome = state.controller.perform_care_action(action).await?;

    Ok(Json(outcome))
}

// ============================================================================
// Banners
// ============================================================================

/// DELETE /banners/:id - Dismiss an error banner.
pub async fn dismiss_banner(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    if state.controller.dismiss_banner(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("No such banner."))
    }
}

/// POST /banners/:id/retry - Re-run the fetch behind a retryable banner.
#[instrument(skip(state))]
pub async fn retry_banner(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ControllerView>, ApiError> {
    let retried = state
        .controller
        .retry_banner(id)
        .await
        .map_err(ApiError::Refresh)?;

    if !retried {
        return Err(ApiError::NotFound("No retryable banner with that id."));
    }
    Ok(Json(state.controller.snapshot(Utc::now())))
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub action: ChatCommand,
    pub message: String,
    /// Present when the reply carried an updated pet state.
    pub reconciliation: Option<Reconciliation>,
}

/// POST /chat - Talk to the assistant or run a slash-command.
///
/// # Request Body
///
/// ```json
/// { "message": "/feed", "session_id": "optional-existing-session" }
/// ```
///
/// A new session id is issued when none is given.
#[instrument(skip(state, request))]
pub async fn send_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let chat = state
        .chat
        .as_ref()
        .ok_or(ApiError::Unavailable("Chat is not configured."))?;

    let session_id = request
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    // Reserve the pet and sequence number now; the reply may be slow.
    let ticket = state.controller.begin_snapshot().ok();
    let pet_id = ticket.as_ref().map(|t| t.pet_id().to_string());

    let reply = match chat
        .send(pet_id.as_deref(), &session_id, &request.message)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            if let (Some(pet_id), CareError::NetworkOrServerFailure { .. }) = (&pet_id, &e) {
                state
                    .controller
                    .journal("chat", pet_id, Outcome::Failure, Some(e.to_string()))
                    .await;
            }
            return Err(e.into());
        }
    };

    let reconciliation = match (reply.pet_state, ticket) {
        (Some(stats), Some(ticket)) => {
            let pet_id = ticket.pet_id().to_string();
            let reconciliation = state.controller.apply_snapshot(ticket, stats);
            let outcome = if reconciliation.applied {
                Outcome::Success
            } else {
                Outcome::Stale
            };
            state.controller.journal("chat", &pet_id, outcome, None).await;
            Some(reconciliation)
        }
        _ => None,
    };

    Ok(Json(ChatResponse {
        session_id,
        action: ChatCommand::parse(&request.message),
        message: reply.message,
        reconciliation,
    }))
}

// ============================================================================
// Accessories
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AccessoriesResponse {
    pub catalog: Vec<Accessory>,
    pub equipped: Vec<String>,
}

/// GET /accessories - Catalog plus what the active pet is wearing.
#[instrument(skip(state))]
pub async fn get_accessories(
    State(state): State<AppState>,
) -> Result<Json<AccessoriesResponse>, ApiError> {
    let closet = state.closet().ok_or(CareError::NoPetSelected)?;
    let catalog = closet.catalog().await?;

    Ok(Json(AccessoriesResponse {
        catalog,
        equipped: closet.equipped_ids(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct EquipRequest {
    pub accessory_id: String,
    pub equipped: bool,
}

#[derive(Debug, Serialize)]
pub struct EquipResponse {
    pub accessory: PetAccessory,
    pub equipped: Vec<String>,
}

/// POST /accessories/equip - Equip or unequip an accessory on the active pet.
#[instrument(skip(state))]
pub async fn equip_accessory(
    State(state): State<AppState>,
    Json(request): Json<EquipRequest>,
) -> Result<Json<EquipResponse>, ApiError> {
    let closet = state.closet().ok_or(CareError::NoPetSelected)?;
    let accessory = closet
        .set_equipped(&request.accessory_id, request.equipped)
        .await?;

    Ok(Json(EquipResponse {
        accessory,
        equipped: closet.equipped_ids(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RealtimePushRequest {
    pub records: Vec<PetAccessory>,
}

/// POST /accessories/realtime - Inbound realtime equip-state push.
///
/// Records for pets other than the active one are ignored by the closet.
#[instrument(skip(state, request), fields(records))]
pub async fn push_accessories(
    State(state): State<AppState>,
    Json(request): Json<RealtimePushRequest>,
) -> Result<StatusCode, ApiError> {
    tracing::Span::current().record("records", request.records.len());
    let sender = state.realtime_sender().ok_or(CareError::NoPetSelected)?;

    sender.send(request.records).await.map_err(|_| {
        warn!("Realtime accessory feed is closed");
        ApiError::Unavailable("Realtime feed is not running.")
    })?;

    Ok(StatusCode::ACCEPTED)
}

// ============================================================================
// Telemetry
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TelemetryQuery {
    /// Number of records (default: 50).
    #[serde(default = "default_telemetry_limit")]
    pub limit: u32,
}

fn default_telemetry_limit() -> u32 {
    50
}

/// GET /telemetry/recent - Latest journal entries, newest first.
#[instrument(skip(state))]
pub async fn get_telemetry(
    State(state): State<AppState>,
    Query(query): Query<TelemetryQuery>,
) -> Result<Json<Vec<ActionRecord>>, ApiError> {
    let storage = state
        .storage
        .as_ref()
        .ok_or(ApiError::Unavailable("Telemetry is not configured."))?;

    match storage.recent(query.limit.min(MAX_TELEMETRY_LIMIT)).await {
        Ok(records) => Ok(Json(records)),
        Err(e) => {
            warn!(error = %e, "Failed to read telemetry");
            Err(ApiError::Unavailable("Telemetry is unavailable."))
        }
    }
}
