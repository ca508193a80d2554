//! Application state shared by every handler.
//!
//! Services hold `Arc`s internally, so cloning the state per request is a
//! handful of reference-count bumps.

use crate::identity::{IdentityService, TokenIssuer};
use crate::notify::Notifier;
use crate::payment_gateway::PaymentGateway;
use crate::payments::PaymentService;
use crate::qr::SvgQrEncoder;
use crate::reservation::ReservationOrchestrator;
use crate::session::SessionLifecycle;
use crate::store::ParkingStore;
use crate::types::LiveEvent;
use axum::extract::FromRef;
use parking_web::Broadcaster;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Storage backend, for plain reads and writes
    pub store: Arc<dyn ParkingStore>,
    /// Accounts and tokens
    pub identity: IdentityService,
    /// Booking
    pub reservations: ReservationOrchestrator,
    /// Gate entry/exit
    pub sessions: SessionLifecycle,
    /// Orders, payments, receipts, analytics
    pub payments: PaymentService,
    /// Real-time hub behind `/ws`
    pub live: Broadcaster<LiveEvent>,
}

impl AppState {
    /// Wire every service over one store and one real-time hub.
    #[must_use]
    pub fn new(
        store: Arc<dyn ParkingStore>,
        tokens: TokenIssuer,
        gateway: Arc<dyn PaymentGateway>,
        currency: &str,
        live: Broadcaster<LiveEvent>,
    ) -> Self {
        let notifier: Arc<dyn Notifier> = Arc::new(live.clone());
        Self {
            identity: IdentityService::new(Arc::clone(&store), tokens),
            reservations: ReservationOrchestrator::new(
                Arc::clone(&store),
                Arc::new(SvgQrEncoder::default()),
                Arc::clone(&notifier),
            ),
            sessions: SessionLifecycle::new(Arc::clone(&store), notifier),
            payments: PaymentService::new(Arc::clone(&store), gateway, currency),
            store,
            live,
        }
    }
}

impl FromRef<AppState> for IdentityService {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}

impl FromRef<AppState> for Broadcaster<LiveEvent> {
    fn from_ref(state: &AppState) -> Self {
        state.live.clone()
    }
}
