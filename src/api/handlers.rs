use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::queue::{Command, CommandPayload};
use crate::registry::{RegisterInfo, TargetView};
use crate::screen::ScreenFrame;

use super::error::ApiError;
use super::AppState;

#[derive(Serialize)]
pub(super) struct HealthResponse {
    status: &'static str,
}

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
pub(super) struct RegisterResponse {
    success: bool,
    target_id: String,
}

pub(super) async fn register(
    State(state): State<AppState>,
    Json(info): Json<RegisterInfo>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let target_id = state.registry.register(info).await?;
    Ok(Json(RegisterResponse {
        success: true,
        target_id,
    }))
}

pub(super) async fn targets(
    State(state): State<AppState>,
) -> Result<Json<Vec<TargetView>>, ApiError> {
    Ok(Json(state.registry.list().await?))
}

#[derive(Serialize)]
pub(super) struct HeartbeatResponse {
    success: bool,
    /// Whether a record for the id existed. A heartbeat for an unknown id
    /// still succeeds (the agent's loop must not break), but the agent can
    /// use this to decide to re-register.
    known: bool,
}

pub(super) async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let known = state.registry.heartbeat(&id).await?;
    Ok(Json(HeartbeatResponse {
        success: true,
        known,
    }))
}

#[derive(Serialize)]
pub(super) struct OkResponse {
    success: bool,
}

#[derive(Deserialize)]
pub(super) struct ScreenPushRequest {
    screen: String,
    quality: Option<u32>,
}

pub(super) async fn screen_push(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ScreenPushRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state.relay.push(&id, req.screen, req.quality).await?;
    // Streaming counts as liveness: a pushing agent stays present without
    // separate heartbeats.
    state.registry.heartbeat(&id).await?;
    Ok(Json(OkResponse { success: true }))
}

pub(super) async fn screen_pull(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScreenFrame>, ApiError> {
    Ok(Json(state.relay.pull(&id).await?))
}

#[derive(Deserialize)]
pub(super) struct EnqueueRequest {
    #[serde(default)]
    target_id: String,
    command: CommandPayload,
}

#[derive(Serialize)]
pub(super) struct EnqueueResponse {
    success: bool,
    command_id: String,
}

pub(super) async fn command_enqueue(
    State(state): State<AppState>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    let command_id = state.queue.enqueue(&req.target_id, req.command).await?;
    Ok(Json(EnqueueResponse {
        success: true,
        command_id,
    }))
}

pub(super) async fn command_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Command>>, ApiError> {
    Ok(Json(state.queue.list(&id).await?))
}

#[derive(Deserialize)]
pub(super) struct AckRequest {
    target_id: String,
    command_id: String,
}

pub(super) async fn command_done(
    State(state): State<AppState>,
    Json(req): Json<AckRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state.queue.ack(&req.target_id, &req.command_id).await?;
    Ok(Json(OkResponse { success: true }))
}

pub(super) async fn fallback() -> ApiError {
    ApiError::NotFound
}
