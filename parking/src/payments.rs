//! Payments and reporting.
//!
//! Recording a payment trusts the caller's transaction reference: nothing
//! is cross-checked against the gateway, and the signature is accepted but
//! not verified. The amount always comes from the stored reservation.

use crate::error::{ParkingError, Result};
use crate::metrics;
use crate::payment_gateway::{OrderRequest, PaymentGateway, PaymentOrder};
use crate::receipt;
use crate::store::ParkingStore;
use crate::types::{Counters, LotRevenue, NewPayment, Payment, ReservationId, UserId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Payment method recorded for every payment.
pub const PAYMENT_METHOD: &str = "card";

/// Status recorded for every payment.
pub const PAYMENT_STATUS_PAID: &str = "paid";

/// Reference used when the client supplies none.
pub const FALLBACK_TRANSACTION_REF: &str = "mock_txn";

/// Client confirmation of a completed payment.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaymentConfirmation {
    /// Gateway order id
    #[serde(default)]
    pub order_id: Option<String>,
    /// Gateway payment id
    #[serde(default)]
    pub payment_id: Option<String>,
    /// Gateway signature (accepted, not verified)
    #[serde(default)]
    pub signature: Option<String>,
}

impl PaymentConfirmation {
    /// `payment_id`, else `order_id`, else the fallback reference.
    #[must_use]
    pub fn transaction_ref(&self) -> String {
        [&self.payment_id, &self.order_id]
            .into_iter()
            .flatten()
            .find(|r| !r.is_empty())
            .cloned()
            .unwrap_or_else(|| FALLBACK_TRANSACTION_REF.to_string())
    }
}

/// Orders, payment records, receipts, and revenue reports.
#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn ParkingStore>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl PaymentService {
    /// Wire the service to its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ParkingStore>,
        gateway: Arc<dyn PaymentGateway>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            currency: currency.into(),
        }
    }

    /// Open a gateway order for a reservation's stored amount.
    ///
    /// # Errors
    ///
    /// - `ParkingError::NotFound` if the reservation does not exist
    /// - `ParkingError::Gateway` if the gateway fails
    #[instrument(skip(self))]
    pub async fn create_order(&self, reservation_id: ReservationId) -> Result<PaymentOrder> {
        let reservation = self
            .store
            .reservation(reservation_id)
            .await?
            .ok_or_else(|| ParkingError::not_found("Reservation"))?;

        let request =
            OrderRequest::for_reservation(reservation_id, reservation.total_amount, &self.currency);
        self.gateway
            .create_order(reservation_id, request)
            .await
            .map_err(|e| {
                warn!(error = %e, "Order creation failed");
                ParkingError::Gateway(e.to_string())
            })
    }

    /// Record a payment against a reservation.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::NotFound` if the reservation does not exist.
    #[instrument(skip(self, confirmation))]
    pub async fn mark_paid(
        &self,
        user_id: UserId,
        reservation_id: ReservationId,
        confirmation: &PaymentConfirmation,
    ) -> Result<Payment> {
        let reservation = self
            .store
            .reservation(reservation_id)
            .await?
            .ok_or_else(|| ParkingError::not_found("Reservation"))?;

        let payment = self
            .store
            .insert_payment(NewPayment {
                reservation_id,
                user_id,
                amount: reservation.total_amount,
                payment_method: PAYMENT_METHOD.to_string(),
                transaction_id: confirmation.transaction_ref(),
                payment_status: PAYMENT_STATUS_PAID.to_string(),
            })
            .await?;

        metrics::record_payment(payment.amount.minor());
        info!(
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            signed = confirmation.signature.is_some(),
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Render the PDF receipt of a reservation.
    ///
    /// # Errors
    ///
    /// - `ParkingError::NotFound` if the reservation does not exist
    /// - `ParkingError::Internal` if rendering fails
    #[instrument(skip(self))]
    pub async fn receipt(&self, reservation_id: ReservationId) -> Result<Vec<u8>> {
        let details = self
            .store
            .receipt_details(reservation_id)
            .await?
            .ok_or_else(|| ParkingError::NotFound("Not found".to_string()))?;
        tokio::task::spawn_blocking(move || receipt::render_receipt(&details))
            .await
            .map_err(|e| ParkingError::Internal(format!("receipt task failed: {e}")))?
    }

    /// Paid revenue per lot.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    pub async fn revenue_by_lot(&self) -> Result<Vec<LotRevenue>> {
        self.store.revenue_by_lot().await
    }

    /// Row counts.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    pub async fn counters(&self) -> Result<Counters> {
        self.store.counters().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::payment_gateway::MockPaymentGateway;
    use crate::store::{MemoryParkingStore, UnitOfWork};
    use crate::types::{
        LotDraft, LotId, Money, NewReservation, NewUser, ReservationStatus, Role, SpaceDraft,
    };
    use chrono::Utc;

    async fn seeded() -> (MemoryParkingStore, PaymentService, UserId, LotId, ReservationId) {
        let store = MemoryParkingStore::new();
        let user = store
            .insert_user(NewUser {
                username: "dev".into(),
                email: "dev@example.com".into(),
                password_hash: "x".into(),
                phone: None,
                role: Role::User,
            })
            .await
            .unwrap();
        let lot_id = store
            .insert_lot(
                user.user_id,
                &LotDraft {
                    lot_name: "Airport P2".into(),
                    hourly_rate: Money::from_major(75),
                    ..LotDraft::default()
                },
            )
            .await
            .unwrap();
        let space_id = store
            .insert_spaces(
                lot_id,
                &[SpaceDraft {
                    space_number: "P2-01".into(),
                    space_type: None,
                    floor_level: None,
                }],
            )
            .await
            .unwrap()[0];

        let mut uow: Box<dyn UnitOfWork> = store.begin().await.unwrap();
        let reservation = uow
            .insert_reservation(&NewReservation {
                user_id: user.user_id,
                lot_id,
                space_id,
                start_time: Utc::now(),
                end_time: Utc::now(),
                total_amount: Money::from_major(75),
                status: ReservationStatus::Confirmed,
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let service = PaymentService::new(
            Arc::new(store.clone()),
            MockPaymentGateway::shared(),
            "INR",
        );
        (store, service, user.user_id, lot_id, reservation.reservation_id)
    }

    #[test]
    fn test_transaction_ref_preference() {
        let both = PaymentConfirmation {
            order_id: Some("order_1".into()),
            payment_id: Some("pay_1".into()),
            signature: None,
        };
        assert_eq!(both.transaction_ref(), "pay_1");

        let order_only = PaymentConfirmation {
            order_id: Some("order_1".into()),
            ..PaymentConfirmation::default()
        };
        assert_eq!(order_only.transaction_ref(), "order_1");

        assert_eq!(PaymentConfirmation::default().transaction_ref(), "mock_txn");
    }

    #[tokio::test]
    async fn test_order_uses_stored_amount_in_minor_units() {
        let (_, service, _, _, reservation_id) = seeded().await;
        let order = service.create_order(reservation_id).await.unwrap();

        assert!(order.mock);
        assert_eq!(order.amount, 7_500);
        assert_eq!(order.currency, "INR");
    }

    #[tokio::test]
    async fn test_unknown_reservation_is_not_found() {
        let (_, service, user_id, _, _) = seeded().await;

        assert!(matches!(
            service.create_order(ReservationId(999)).await,
            Err(ParkingError::NotFound(_))
        ));
        assert!(matches!(
            service
                .mark_paid(user_id, ReservationId(999), &PaymentConfirmation::default())
                .await,
            Err(ParkingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_paid_feeds_revenue_report() {
        let (_, service, user_id, lot_id, reservation_id) = seeded().await;

        let payment = service
            .mark_paid(user_id, reservation_id, &PaymentConfirmation::default())
            .await
            .unwrap();
        assert_eq!(payment.amount, Money::from_major(75));
        assert_eq!(payment.transaction_id, "mock_txn");

        let report = service.revenue_by_lot().await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].lot_id, lot_id);
        assert_eq!(report[0].payments, 1);
        assert_eq!(report[0].revenue, Money::from_major(75));
    }

    #[tokio::test]
    async fn test_receipt_and_counters() {
        let (_, service, _, _, reservation_id) = seeded().await;

        let pdf = service.receipt(reservation_id).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));

        let counters = service.counters().await.unwrap();
        assert_eq!(
            counters,
            Counters {
                users: 1,
                lots: 1,
                spaces: 1,
                reservations: 1
            }
        );
    }
}
