//! PDF payment receipts.
//!
//! A reservation that was issued a QR code gets it printed on the receipt,
//! re-encoded from the reservation itself so the stored SVG is never parsed.

use crate::error::{ParkingError, Result};
use crate::qr::{QrMatrix, QrPayload};
use crate::types::ReceiptDetails;
use printpdf::{
    BuiltinFont, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, Mm, PdfDocument, Px,
};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE: f32 = 8.0;
const QR_PIXELS_PER_MODULE: usize = 8;
const QR_DPI: f32 = 150.0;

fn pdf_error(err: impl std::fmt::Display) -> ParkingError {
    ParkingError::Internal(format!("receipt rendering failed: {err}"))
}

/// Text lines printed under the title.
#[must_use]
pub fn receipt_lines(details: &ReceiptDetails) -> Vec<String> {
    let r = &details.reservation;
    vec![
        format!("Reservation ID: {}", r.reservation_id),
        format!("User: {} ({})", details.username, details.email),
        format!("Lot: {}", details.lot_name),
        format!("Address: {}", details.address.as_deref().unwrap_or("N/A")),
        format!("Space ID: {}", r.space_id),
        format!("Start: {}", r.start_time.format("%Y-%m-%d %H:%M UTC")),
        format!("End: {}", r.end_time.format("%Y-%m-%d %H:%M UTC")),
        format!("Amount: INR {}", r.total_amount),
        format!("Status: {}", r.status),
    ]
}

/// Render an A4 receipt.
///
/// # Errors
///
/// Returns `ParkingError::Internal` if the document cannot be produced.
pub fn render_receipt(details: &ReceiptDetails) -> Result<Vec<u8>> {
    let title = format!("Receipt {}", details.reservation.reservation_id);
    let (doc, page, layer) =
        PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let heading = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;
    let body = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;
    let canvas = doc.get_page(page).get_layer(layer);

    let mut y = PAGE_HEIGHT - MARGIN - LINE;
    canvas.use_text(
        "Smart Parking - Payment Receipt",
        20.0,
        Mm(MARGIN),
        Mm(y),
        &heading,
    );
    y -= LINE * 2.0;

    for line in receipt_lines(details) {
        canvas.use_text(line, 12.0, Mm(MARGIN), Mm(y), &body);
        y -= LINE;
    }

    if details.reservation.qr_code.is_some() {
        y -= LINE;
        canvas.use_text("QR Code:", 14.0, Mm(MARGIN), Mm(y), &heading);

        let matrix = QrMatrix::encode(&QrPayload::for_reservation(&details.reservation))?;
        let (side, pixels) = matrix.to_greyscale(QR_PIXELS_PER_MODULE);
        #[allow(clippy::cast_precision_loss)]
        let side_mm = side as f32 / QR_DPI * 25.4;

        Image::from(ImageXObject {
            width: Px(side),
            height: Px(side),
            color_space: ColorSpace::Greyscale,
            bits_per_component: ColorBits::Bit8,
            interpolate: false,
            image_data: pixels,
            image_filter: None,
            smask: None,
            clipping_bbox: None,
        })
        .add_to_layer(
            canvas.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN)),
                translate_y: Some(Mm(y - LINE / 2.0 - side_mm)),
                dpi: Some(QR_DPI),
                ..ImageTransform::default()
            },
        );
    }

    doc.save_to_bytes().map_err(pdf_error)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{
        LotId, Money, Reservation, ReservationId, ReservationStatus, SpaceId, UserId,
    };
    use chrono::{TimeZone, Utc};

    fn details() -> ReceiptDetails {
        ReceiptDetails {
            reservation: Reservation {
                reservation_id: ReservationId(31),
                user_id: UserId(4),
                lot_id: LotId(2),
                space_id: SpaceId(8),
                start_time: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
                end_time: Utc.with_ymd_and_hms(2025, 6, 1, 11, 30, 0).unwrap(),
                total_amount: Money::from_major(150),
                status: ReservationStatus::Confirmed,
                qr_code: None,
                created_at: Utc::now(),
            },
            username: "kiran".into(),
            email: "kiran@example.com".into(),
            lot_name: "MG Road".into(),
            address: None,
        }
    }

    #[test]
    fn test_lines_cover_the_booking() {
        let lines = receipt_lines(&details());

        assert!(lines.contains(&"Reservation ID: 31".to_string()));
        assert!(lines.contains(&"Address: N/A".to_string()));
        assert!(lines.contains(&"Amount: INR 150.00".to_string()));
        assert!(lines.contains(&"Start: 2025-06-01 09:00 UTC".to_string()));
        assert!(lines.contains(&"Status: confirmed".to_string()));
    }

    #[test]
    fn test_renders_a_pdf() {
        let bytes = render_receipt(&details()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_issued_qr_code_is_embedded_as_image() {
        let mut with_qr = details();
        with_qr.reservation.qr_code = Some(format!("{}PHN2Zz4=", crate::qr::DATA_URI_PREFIX));

        let plain = render_receipt(&details()).unwrap();
        let bytes = render_receipt(&with_qr).unwrap();

        assert!(String::from_utf8_lossy(&bytes).contains("/Image"));
        assert!(bytes.len() > plain.len());
    }
}
