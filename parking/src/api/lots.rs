//! Lot and space inventory endpoints.
//!
//! Reads are public; writes are for operators (owners and admins).

use super::{AuthUser, JsonBody, PathParam, QueryParams, Success};
use crate::error::ParkingError;
use crate::policy::Endpoint;
use crate::server::state::AppState;
use crate::types::{LotDraft, LotId, ParkingLot, ParkingSpace, SpaceDraft, SpaceId};
use axum::{Json, extract::State};
use parking_web::WebResult;
use serde::{Deserialize, Serialize};
use tracing::info;

/// `GET /api/lots` filter.
#[derive(Debug, Default, Deserialize)]
pub struct LotFilter {
    /// Exact city match
    pub city: Option<String>,
}

/// `POST /api/lots` response.
#[derive(Debug, Serialize)]
pub struct LotCreated {
    /// New lot id
    pub lot_id: LotId,
}

/// `POST /api/lots/:id/spaces` body.
#[derive(Debug, Deserialize)]
pub struct AddSpaces {
    /// Spaces to add
    #[serde(default)]
    pub spaces: Option<Vec<SpaceDraft>>,
}

/// `POST /api/lots/:id/spaces` response.
#[derive(Debug, Serialize)]
pub struct SpacesAdded {
    /// Always `true`
    pub success: bool,
    /// Ids of the created spaces, in request order
    pub space_ids: Vec<SpaceId>,
}

/// List lots, optionally in one city.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn list_lots(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<LotFilter>,
) -> WebResult<Json<Vec<ParkingLot>>> {
    let city = filter.city.as_deref().filter(|c| !c.is_empty());
    Ok(Json(state.store.list_lots(city).await?))
}

/// One lot.
///
/// # Errors
///
/// 404 if the lot does not exist.
pub async fn get_lot(
    State(state): State<AppState>,
    PathParam(lot_id): PathParam<i64>,
) -> WebResult<Json<ParkingLot>> {
    let lot = state
        .store
        .lot(LotId(lot_id))
        .await?
        .ok_or_else(|| ParkingError::NotFound("Not found".to_string()))?;
    Ok(Json(lot))
}

/// Create a lot owned by the caller.
///
/// # Errors
///
/// 403 for drivers, 400 on a malformed body.
pub async fn create_lot(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(draft): JsonBody<LotDraft>,
) -> WebResult<Json<LotCreated>> {
    user.require(Endpoint::CreateLot)?;
    let lot_id = state.store.insert_lot(user.user_id(), &draft).await?;
    info!(lot_id = %lot_id, owner_id = %user.user_id(), "Lot created");
    Ok(Json(LotCreated { lot_id }))
}

/// Overwrite a lot's fields.
///
/// # Errors
///
/// 403 for drivers, 404 if the lot does not exist.
pub async fn update_lot(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(lot_id): PathParam<i64>,
    JsonBody(draft): JsonBody<LotDraft>,
) -> WebResult<Json<Success>> {
    user.require(Endpoint::UpdateLot)?;
    if !state.store.update_lot(LotId(lot_id), &draft).await? {
        return Err(ParkingError::not_found("Lot").into());
    }
    info!(lot_id, "Lot updated");
    Ok(Json(Success::YES))
}

/// Spaces of a lot.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn list_spaces(
    State(state): State<AppState>,
    PathParam(lot_id): PathParam<i64>,
) -> WebResult<Json<Vec<ParkingSpace>>> {
    Ok(Json(state.store.list_spaces(LotId(lot_id)).await?))
}

/// Add available spaces to a lot.
///
/// # Errors
///
/// 403 for drivers, 400 without a `spaces` array, 404 for an unknown lot.
pub async fn add_spaces(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(lot_id): PathParam<i64>,
    JsonBody(body): JsonBody<AddSpaces>,
) -> WebResult<Json<SpacesAdded>> {
    user.require(Endpoint::AddSpaces)?;
    let spaces = body
        .spaces
        .ok_or_else(|| ParkingError::validation("spaces[] required"))?;

    let lot_id = LotId(lot_id);
    if state.store.lot(lot_id).await?.is_none() {
        return Err(ParkingError::not_found("Lot").into());
    }

    let space_ids = state.store.insert_spaces(lot_id, &spaces).await?;
    info!(lot_id = %lot_id, added = space_ids.len(), "Spaces added");
    Ok(Json(SpacesAdded {
        success: true,
        space_ids,
    }))
}
