//! HTTP handlers, grouped by resource.
//!
//! Handlers stay thin: extract, authorize with [`AuthUser::require`], call
//! one domain service, and map the result. Domain errors convert into
//! `AppError` through `?`.

pub mod auth;
pub mod extract;
pub mod lots;
pub mod payments;
pub mod qr;
pub mod reservations;

pub use extract::{AuthUser, JsonBody, PathParam, QueryParams};

use crate::error::ParkingError;
use crate::types::ReservationId;
use serde::{Deserialize, Serialize};

/// `{"ok": true}`
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Ack {
    /// Always `true`
    pub ok: bool,
}

impl Ack {
    /// The acknowledgement body.
    pub const YES: Self = Self { ok: true };
}

/// `{"success": true}`
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Success {
    /// Always `true`
    pub success: bool,
}

impl Success {
    /// The acknowledgement body.
    pub const YES: Self = Self { success: true };
}

/// Body naming one reservation.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ReservationRef {
    /// Target reservation
    #[serde(default)]
    pub reservation_id: Option<ReservationId>,
}

impl ReservationRef {
    /// The id, or a validation error when absent.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Validation` if `reservation_id` is missing.
    pub fn required(self) -> Result<ReservationId, ParkingError> {
        self.reservation_id
            .ok_or_else(|| ParkingError::validation("reservation_id required"))
    }
}
