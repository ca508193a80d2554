//! Gate validation endpoints (operators only).

use super::{AuthUser, JsonBody, ReservationRef};
use crate::policy::Endpoint;
use crate::server::state::AppState;
use crate::types::ParkingSession;
use axum::{Json, extract::State};
use parking_web::WebResult;
use serde::Serialize;

/// Gate validation response.
#[derive(Debug, Serialize)]
pub struct GateResponse {
    /// Always `true`
    pub ok: bool,
    /// The opened or closed session
    pub session: ParkingSession,
}

/// `POST /api/qr/validate-entry`
///
/// # Errors
///
/// 404 for an unknown reservation, 400 (`STATE_ERROR`) unless it is confirmed.
pub async fn validate_entry(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(body): JsonBody<ReservationRef>,
) -> WebResult<Json<GateResponse>> {
    user.require(Endpoint::ValidateEntry)?;
    let session = state.sessions.validate_entry(body.required()?).await?;
    Ok(Json(GateResponse { ok: true, session }))
}

/// `POST /api/qr/validate-exit`
///
/// # Errors
///
/// 404 ("No session") if the vehicle never entered.
pub async fn validate_exit(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(body): JsonBody<ReservationRef>,
) -> WebResult<Json<GateResponse>> {
    user.require(Endpoint::ValidateExit)?;
    let session = state.sessions.validate_exit(body.required()?).await?;
    Ok(Json(GateResponse { ok: true, session }))
}
