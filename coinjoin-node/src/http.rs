//! The HTTP registration surface spec.md \S1 treats as an external
//! collaborator — this is where it actually lives. Grounded on
//! `rusty-node/src/main.rs`'s `axum::Router` health-check endpoint,
//! generalized from one static route to the five registry operations
//! of spec.md \S4.2 plus `advance_phase`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use coinjoin_core::{CoreError, RoundState};
use coinjoin_scheduler::PhaseScheduler;
use coinjoin_types::{Amount, ClaimedInput, OutPoint, ParticipantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub round: Arc<RoundState>,
    pub scheduler: Arc<PhaseScheduler>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rounds/current", get(round_status))
        .route("/rounds/current/advance", post(advance_phase))
        .route("/rounds/current/inputs", post(register_a))
        .route("/rounds/current/inputs/:id", get(find_a))
        .route("/rounds/current/inputs/:id/confirm", post(confirm_connection))
        .route("/rounds/current/inputs/:id/signatures", post(submit_signature))
        .route("/rounds/current/outputs", post(register_b))
        .with_state(state)
}

/// Wraps `CoreError` so request handlers can `?`-propagate it straight
/// into an HTTP response.
struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::WrongPhase(_) => StatusCode::CONFLICT,
            CoreError::UnknownId => StatusCode::NOT_FOUND,
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::ExternalUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::SchedulerFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

#[derive(Serialize)]
struct RoundStatus {
    round_id: u64,
    phase: &'static str,
    accepting: bool,
    fallback: bool,
    a_entries: usize,
    b_entries: usize,
}

async fn round_status(State(state): State<AppState>) -> Json<RoundStatus> {
    Json(RoundStatus {
        round_id: state.round.round_id(),
        phase: state.round.phase().as_str(),
        accepting: state.round.accepting(),
        fallback: state.round.fallback(),
        a_entries: state.round.a_len(),
        b_entries: state.round.b_len(),
    })
}

async fn advance_phase(State(state): State<AppState>) -> StatusCode {
    state.scheduler.advance_phase();
    StatusCode::ACCEPTED
}

#[derive(Deserialize)]
struct ClaimedInputDto {
    txid_hex: String,
    vout: u32,
    amount_sat: u64,
}

#[derive(Deserialize)]
struct RegisterARequest {
    inputs: Vec<ClaimedInputDto>,
    change_output_hex: String,
}

#[derive(Serialize)]
struct RegisterAResponse {
    id: Uuid,
}

async fn register_a(
    State(state): State<AppState>,
    Json(request): Json<RegisterARequest>,
) -> Result<Json<RegisterAResponse>, ApiError> {
    let inputs = request
        .inputs
        .into_iter()
        .map(|dto| decode_claimed_input(&dto))
        .collect::<Result<Vec<_>, _>>()?;
    let change_output = decode_hex(&request.change_output_hex)?;

    let id = state.round.register_a(inputs, change_output)?;
    Ok(Json(RegisterAResponse { id: id.0 }))
}

async fn find_a(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<coinjoin_core::AEntry>, ApiError> {
    let entry = state.round.find_a(ParticipantId(id))?;
    Ok(Json(entry))
}

async fn confirm_connection(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    state.round.confirm_connection(ParticipantId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct RegisterBRequest {
    output_hex: String,
}

async fn register_b(State(state): State<AppState>, Json(request): Json<RegisterBRequest>) -> Result<StatusCode, ApiError> {
    let output = decode_hex(&request.output_hex)?;
    state.round.register_b(output)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SubmitSignatureRequest {
    input_index: usize,
    witness_hex: String,
}

async fn submit_signature(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitSignatureRequest>,
) -> Result<StatusCode, ApiError> {
    let witness = decode_hex(&request.witness_hex)?;
    state.round.submit_signature(ParticipantId(id), request.input_index, witness)?;
    Ok(StatusCode::NO_CONTENT)
}

fn decode_hex(s: &str) -> Result<Vec<u8>, ApiError> {
    hex::decode(s).map_err(|e| ApiError(CoreError::Validation(format!("invalid hex: {e}"))))
}

fn decode_claimed_input(dto: &ClaimedInputDto) -> Result<ClaimedInput, ApiError> {
    let bytes = hex::decode(&dto.txid_hex).map_err(|e| ApiError(CoreError::Validation(format!("invalid txid hex: {e}"))))?;
    let txid: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ApiError(CoreError::Validation("txid must be exactly 32 bytes".into())))?;
    Ok(ClaimedInput { outpoint: OutPoint { txid, vout: dto.vout }, amount: Amount::from_sat(dto.amount_sat) })
}
