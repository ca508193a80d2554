//! QR token service.
//!
//! A reservation's QR code encodes a small JSON payload identifying the
//! booking. The rendered image is stored on the reservation as a
//! `data:` URI so clients can display it directly.

use crate::error::{ParkingError, Result};
use crate::types::{Reservation, ReservationId, SpaceId, UserId};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use qrcode::QrCode;
use qrcode::render::svg;
use serde::{Deserialize, Serialize};

/// Prefix of every encoded artifact.
pub const DATA_URI_PREFIX: &str = "data:image/svg+xml;base64,";

/// What a reservation's QR code says.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    /// Reservation being presented at the gate
    pub reservation_id: ReservationId,
    /// Booking account
    pub user_id: UserId,
    /// Booked space
    pub space_id: SpaceId,
    /// Issue time, epoch milliseconds
    pub ts: i64,
}

impl QrPayload {
    /// Payload of a stored reservation, stamped with its creation time.
    #[must_use]
    pub fn for_reservation(reservation: &Reservation) -> Self {
        Self {
            reservation_id: reservation.reservation_id,
            user_id: reservation.user_id,
            space_id: reservation.space_id,
            ts: reservation.created_at.timestamp_millis(),
        }
    }
}

fn qr_code(payload: &QrPayload) -> Result<QrCode> {
    let text = serde_json::to_vec(payload)
        .map_err(|e| ParkingError::Internal(format!("QR payload serialization failed: {e}")))?;
    QrCode::new(text).map_err(|e| ParkingError::Internal(format!("QR encoding failed: {e}")))
}

/// Module grid of an encoded payload, for renderers that draw it themselves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    /// Encode `payload`.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Internal` if the payload cannot be encoded.
    pub fn encode(payload: &QrPayload) -> Result<Self> {
        let code = qr_code(payload)?;
        Ok(Self {
            width: code.width(),
            dark: code
                .to_colors()
                .into_iter()
                .map(|c| c == qrcode::Color::Dark)
                .collect(),
        })
    }

    /// Modules per side.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Whether the module at (`x`, `y`) is dark. Out-of-range is light.
    #[must_use]
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }

    /// 8-bit greyscale raster, `scale` pixels per module, with a four-module
    /// quiet zone. Returns the side length in pixels and the row-major pixels.
    #[must_use]
    pub fn to_greyscale(&self, scale: usize) -> (usize, Vec<u8>) {
        const QUIET: usize = 4;
        let scale = scale.max(1);
        let side = (self.width + 2 * QUIET) * scale;
        let mut pixels = Vec::with_capacity(side * side);
        for py in 0..side {
            for px in 0..side {
                let module = |p: usize| (p / scale).checked_sub(QUIET);
                let dark = matches!(
                    (module(px), module(py)),
                    (Some(x), Some(y)) if self.is_dark(x, y)
                );
                pixels.push(if dark { 0x00 } else { 0xFF });
            }
        }
        (side, pixels)
    }
}

/// Renders payloads into displayable artifacts.
pub trait QrEncoder: Send + Sync {
    /// Encode `payload` into an image data URI.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Internal` if the payload cannot be encoded.
    fn encode(&self, payload: &QrPayload) -> Result<String>;
}

/// SVG renderer backed by the `qrcode` crate.
#[derive(Clone, Copy, Debug)]
pub struct SvgQrEncoder {
    min_size: u32,
}

impl SvgQrEncoder {
    /// Renderer producing images at least `min_size` pixels square.
    #[must_use]
    pub const fn new(min_size: u32) -> Self {
        Self { min_size }
    }
}

impl Default for SvgQrEncoder {
    fn default() -> Self {
        Self::new(200)
    }
}

impl QrEncoder for SvgQrEncoder {
    fn encode(&self, payload: &QrPayload) -> Result<String> {
        let image = qr_code(payload)?
            .render::<svg::Color>()
            .min_dimensions(self.min_size, self.min_size)
            .build();
        Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(image)))
    }
}
