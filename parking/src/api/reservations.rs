//! Reservation endpoints.

use super::{AuthUser, JsonBody};
use crate::policy::Endpoint;
use crate::reservation::{CreatedReservation, ReservationRequest};
use crate::server::state::AppState;
use crate::types::Reservation;
use axum::{Json, extract::State};
use parking_web::WebResult;

/// `POST /api/reservations`: book a space.
///
/// # Errors
///
/// 400 (`SPACE_UNAVAILABLE`) if the space is missing or taken.
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<ReservationRequest>,
) -> WebResult<Json<CreatedReservation>> {
    user.require(Endpoint::CreateReservation)?;
    Ok(Json(
        state.reservations.create(user.user_id(), request).await?,
    ))
}

/// `GET /api/reservations`: the caller's reservations, newest first.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn list_mine(
    State(state): State<AppState>,
    user: AuthUser,
) -> WebResult<Json<Vec<Reservation>>> {
    user.require(Endpoint::ListReservations)?;
    Ok(Json(state.reservations.list_for_user(user.user_id()).await?))
}
