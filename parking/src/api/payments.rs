//! Payment, receipt, and analytics endpoints.

use super::{Ack, AuthUser, JsonBody, PathParam, ReservationRef};
use crate::payment_gateway::PaymentOrder;
use crate::payments::PaymentConfirmation;
use crate::policy::Endpoint;
use crate::server::state::AppState;
use crate::types::{Counters, LotRevenue, ReservationId};
use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use parking_web::WebResult;
use serde::Deserialize;

/// `POST /api/payments/mark-paid` body.
#[derive(Debug, Deserialize)]
pub struct MarkPaid {
    /// Paid reservation
    #[serde(flatten)]
    pub reservation: ReservationRef,
    /// Gateway references
    #[serde(flatten)]
    pub confirmation: PaymentConfirmation,
}

/// Open a gateway (or mock) order for a reservation.
///
/// # Errors
///
/// 400 without `reservation_id`, 404 for an unknown reservation.
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(body): JsonBody<ReservationRef>,
) -> WebResult<Json<PaymentOrder>> {
    user.require(Endpoint::CreateOrder)?;
    Ok(Json(state.payments.create_order(body.required()?).await?))
}

/// Record a payment.
///
/// # Errors
///
/// 400 without `reservation_id`, 404 for an unknown reservation.
pub async fn mark_paid(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(body): JsonBody<MarkPaid>,
) -> WebResult<Json<Ack>> {
    user.require(Endpoint::MarkPaid)?;
    state
        .payments
        .mark_paid(user.user_id(), body.reservation.required()?, &body.confirmation)
        .await?;
    Ok(Json(Ack::YES))
}

/// PDF receipt, displayed inline.
///
/// # Errors
///
/// 404 for an unknown reservation.
pub async fn receipt(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(reservation_id): PathParam<i64>,
) -> WebResult<impl IntoResponse> {
    user.require(Endpoint::Receipt)?;
    let pdf = state.payments.receipt(ReservationId(reservation_id)).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=receipt_{reservation_id}.pdf"),
            ),
        ],
        pdf,
    ))
}

/// Paid revenue per lot.
///
/// # Errors
///
/// 403 for drivers.
pub async fn revenue_by_lot(
    State(state): State<AppState>,
    user: AuthUser,
) -> WebResult<Json<Vec<LotRevenue>>> {
    user.require(Endpoint::Analytics)?;
    Ok(Json(state.payments.revenue_by_lot().await?))
}

/// Row counts.
///
/// # Errors
///
/// 403 for drivers.
pub async fn counters(
    State(state): State<AppState>,
    user: AuthUser,
) -> WebResult<Json<Counters>> {
    user.require(Endpoint::Analytics)?;
    Ok(Json(state.payments.counters().await?))
}
