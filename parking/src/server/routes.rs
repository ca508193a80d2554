//! Router configuration.

use super::state::AppState;
use crate::api::{auth, lots, payments, qr, reservations};
use crate::types::LiveEvent;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use parking_web::handlers::{HealthReport, health_check, readiness, websocket};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Banner served at `/`.
pub const BANNER: &str = "Smart Parking API running!";

/// Build the complete router.
///
/// Resource routes live under `/api`; probes, the banner, and the
/// WebSocket channel sit at the root.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/profile", get(auth::profile))
        // Inventory
        .route("/lots", get(lots::list_lots).post(lots::create_lot))
        .route("/lots/:id", get(lots::get_lot).put(lots::update_lot))
        .route(
            "/lots/:id/spaces",
            get(lots::list_spaces).post(lots::add_spaces),
        )
        // Booking
        .route(
            "/reservations",
            get(reservations::list_mine).post(reservations::create),
        )
        // Payments
        .route("/payments/create-order", post(payments::create_order))
        .route("/payments/mark-paid", post(payments::mark_paid))
        .route("/payments/receipt/:id", get(payments::receipt))
        .route(
            "/payments/analytics/revenue-by-lot",
            get(payments::revenue_by_lot),
        )
        .route("/payments/analytics/counters", get(payments::counters))
        // Gates
        .route("/qr/validate-entry", post(qr::validate_entry))
        .route("/qr/validate-exit", post(qr::validate_exit));

    Router::new()
        .route("/", get(banner))
        .route("/health", get(health_check))
        .route("/ready", get(ready))
        .route("/ws", get(websocket::stream::<LiveEvent>))
        .nest("/api", api_routes)
        .layer(middleware::from_fn(parking_web::correlation_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[allow(clippy::unused_async)] // Axum handler signature requires async
async fn banner() -> &'static str {
    BANNER
}

async fn ready(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let healthy = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe failed");
            false
        }
    };
    readiness("database", healthy)
}
