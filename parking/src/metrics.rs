//! Business metrics for the parking service.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `parking_reservations_total{status}` - Reservations by outcome
//!   (`created`, `rejected`, `failed`, `completed`)
//! - `parking_sessions_total{event}` - Gate events (`entry`, `exit`)
//! - `parking_payments_total{status}` - Recorded payments
//! - `parking_payment_revenue_minor_total` - Recorded revenue in minor units
//!
//! ## Histograms
//! - `parking_session_duration_minutes` - Closed session durations

use metrics::{describe_counter, describe_histogram};

/// Register metric descriptions. Call once at startup.
pub fn register_business_metrics() {
    describe_counter!(
        "parking_reservations_total",
        "Reservations by outcome (created, rejected, failed, completed)"
    );
    describe_counter!("parking_sessions_total", "Gate events by kind (entry, exit)");
    describe_histogram!(
        "parking_session_duration_minutes",
        "Whole minutes between gate entry and exit"
    );
    describe_counter!("parking_payments_total", "Recorded payments by status");
    describe_counter!(
        "parking_payment_revenue_minor_total",
        "Recorded revenue in minor currency units"
    );
    tracing::debug!("Business metrics registered");
}

/// A reservation was committed.
pub fn record_reservation_created() {
    metrics::counter!("parking_reservations_total", "status" => "created").increment(1);
}

/// A reservation attempt found its space missing or taken.
pub fn record_reservation_rejected() {
    metrics::counter!("parking_reservations_total", "status" => "rejected").increment(1);
}

/// A reservation attempt failed and was rolled back.
pub fn record_reservation_failed() {
    metrics::counter!("parking_reservations_total", "status" => "failed").increment(1);
}

/// A vehicle entered.
pub fn record_entry() {
    metrics::counter!("parking_sessions_total", "event" => "entry").increment(1);
}

/// A vehicle exited after `minutes` and its reservation completed.
#[allow(clippy::cast_precision_loss)]
pub fn record_exit(minutes: i64) {
    metrics::counter!("parking_sessions_total", "event" => "exit").increment(1);
    metrics::counter!("parking_reservations_total", "status" => "completed").increment(1);
    metrics::histogram!("parking_session_duration_minutes").record(minutes as f64);
}

/// A payment was recorded.
pub fn record_payment(amount_minor: i64) {
    metrics::counter!("parking_payments_total", "status" => "paid").increment(1);
    metrics::counter!("parking_payment_revenue_minor_total")
        .increment(u64::try_from(amount_minor).unwrap_or(0));
}
