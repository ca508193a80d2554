//! Reservation orchestrator.
//!
//! Booking a space is the one multi-step mutation with an invariant to
//! protect: a space is never held by two active reservations. Every step
//! runs inside one unit of work that starts by locking the space row:
//!
//! 1. lock the space (must exist in the lot and be available)
//! 2. read the lot's hourly rate and price the interval
//! 3. insert the reservation as `confirmed`
//! 4. mark the space unavailable
//! 5. render the QR artifact and attach it to the reservation
//! 6. commit, then publish `space_update(is_available = false)`
//!
//! Any failure rolls the whole unit of work back before the error is
//! returned, so no reservation, flag change, or QR artifact survives it.

use crate::error::{ParkingError, Result};
use crate::metrics;
use crate::notify::{Notifier, PostCommitHooks};
use crate::pricing;
use crate::qr::{QrEncoder, QrPayload};
use crate::store::{ParkingStore, UnitOfWork};
use crate::types::{
    LotId, Money, NewReservation, Reservation, ReservationId, ReservationStatus, SpaceId,
    SpaceUpdate, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A booking request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct ReservationRequest {
    /// Lot containing the space
    pub lot_id: LotId,
    /// Space to book
    pub space_id: SpaceId,
    /// Interval start
    pub start_time: DateTime<Utc>,
    /// Interval end
    pub end_time: DateTime<Utc>,
}

/// Result of a successful booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreatedReservation {
    /// New reservation id
    pub reservation_id: ReservationId,
    /// Price fixed at booking time
    pub amount: Money,
    /// QR artifact (data URI)
    pub qr: String,
}

/// Books spaces atomically.
#[derive(Clone)]
pub struct ReservationOrchestrator {
    store: Arc<dyn ParkingStore>,
    qr: Arc<dyn QrEncoder>,
    notifier: Arc<dyn Notifier>,
}

impl ReservationOrchestrator {
    /// Wire the orchestrator to its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ParkingStore>,
        qr: Arc<dyn QrEncoder>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            qr,
            notifier,
        }
    }

    /// Book `request.space_id` for `user_id`.
    ///
    /// # Errors
    ///
    /// - `ParkingError::SpaceUnavailable` if the space does not exist in the
    ///   lot or is already taken
    /// - `ParkingError::Storage`/`Internal` on storage or QR failure; the
    ///   unit of work is rolled back first
    #[instrument(
        skip(self),
        fields(lot_id = %request.lot_id, space_id = %request.space_id)
    )]
    pub async fn create(
        &self,
        user_id: UserId,
        request: ReservationRequest,
    ) -> Result<CreatedReservation> {
        let mut uow = self.store.begin().await?;

        let outcome = self.book(uow.as_mut(), user_id, request).await;
        match outcome {
            Ok((created, hooks)) => {
                uow.commit().await.inspect_err(|e| {
                    metrics::record_reservation_failed();
                    warn!(error = %e, "Reservation commit failed");
                })?;
                hooks.fire(self.notifier.as_ref());
                metrics::record_reservation_created();
                info!(
                    reservation_id = %created.reservation_id,
                    amount = %created.amount,
                    "Reservation confirmed"
                );
                Ok(created)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed; transaction dropped");
                }
                if matches!(err, ParkingError::SpaceUnavailable) {
                    metrics::record_reservation_rejected();
                    warn!("Reservation rejected: space not available");
                } else {
                    metrics::record_reservation_failed();
                    warn!(error = %err, "Reservation rolled back");
                }
                Err(err)
            }
        }
    }

    /// Steps 1-5, all inside `uow`. Returns the events to fire after commit.
    async fn book(
        &self,
        uow: &mut dyn UnitOfWork,
        user_id: UserId,
        request: ReservationRequest,
    ) -> Result<(CreatedReservation, PostCommitHooks)> {
        let space = uow
            .lock_space(request.lot_id, request.space_id)
            .await?
            .filter(|space| space.is_available)
            .ok_or(ParkingError::SpaceUnavailable)?;

        let rate = uow.hourly_rate(request.lot_id).await?.unwrap_or_else(|| {
            warn!("Lot has no rate; booking at zero");
            Money::ZERO
        });
        let amount = pricing::reservation_amount(request.start_time, request.end_time, rate);

        let reservation: Reservation = uow
            .insert_reservation(&NewReservation {
                user_id,
                lot_id: request.lot_id,
                space_id: space.space_id,
                start_time: request.start_time,
                end_time: request.end_time,
                total_amount: amount,
                status: ReservationStatus::Confirmed,
            })
            .await?;

        uow.set_space_available(space.space_id, false).await?;
        let mut hooks = PostCommitHooks::new();
        hooks.space_update(SpaceUpdate {
            lot_id: request.lot_id,
            space_id: space.space_id,
            is_available: false,
        });

        let qr = self.qr.encode(&QrPayload::for_reservation(&reservation))?;
        uow.set_reservation_qr(reservation.reservation_id, &qr).await?;

        Ok((
            CreatedReservation {
                reservation_id: reservation.reservation_id,
                amount,
                qr,
            },
            hooks,
        ))
    }

    /// The caller's reservations, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Reservation>> {
        self.store.reservations_for_user(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::qr::SvgQrEncoder;
    use crate::store::MemoryParkingStore;
    use crate::types::{LiveEvent, LotDraft, SpaceDraft};
    use chrono::TimeZone;
    use parking_web::Broadcaster;

    struct FailingQr;

    impl QrEncoder for FailingQr {
        fn encode(&self, _payload: &QrPayload) -> Result<String> {
            Err(ParkingError::Internal("encoder offline".into()))
        }
    }

    struct Fixture {
        store: MemoryParkingStore,
        hub: Broadcaster<LiveEvent>,
        lot_id: LotId,
        space_id: SpaceId,
    }

    async fn fixture(rate: i64) -> Fixture {
        let store = MemoryParkingStore::new();
        let lot_id = store
            .insert_lot(
                UserId(1),
                &LotDraft {
                    lot_name: "Forum Mall".into(),
                    hourly_rate: Money::from_major(rate),
                    ..LotDraft::default()
                },
            )
            .await
            .unwrap();
        let space_id = store
            .insert_spaces(
                lot_id,
                &[SpaceDraft {
                    space_number: "B2".into(),
                    space_type: None,
                    floor_level: Some("1".into()),
                }],
            )
            .await
            .unwrap()[0];
        Fixture {
            store,
            hub: Broadcaster::new(16),
            lot_id,
            space_id,
        }
    }

    fn orchestrator(f: &Fixture, qr: Arc<dyn QrEncoder>) -> ReservationOrchestrator {
        ReservationOrchestrator::new(Arc::new(f.store.clone()), qr, Arc::new(f.hub.clone()))
    }

    fn request(f: &Fixture) -> ReservationRequest {
        ReservationRequest {
            lot_id: f.lot_id,
            space_id: f.space_id,
            start_time: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 6, 1, 11, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_booking_prices_blocks_and_announces() {
        let f = fixture(50).await;
        let mut rx = f.hub.subscribe();
        let orchestrator = orchestrator(&f, Arc::new(SvgQrEncoder::default()));

        let created = orchestrator.create(UserId(5), request(&f)).await.unwrap();

        assert_eq!(created.amount, Money::from_major(150));
        assert!(created.qr.starts_with(crate::qr::DATA_URI_PREFIX));
        assert!(!f.store.space(f.space_id).await.unwrap().unwrap().is_available);

        let stored = f.store.reservation(created.reservation_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Confirmed);
        assert_eq!(stored.qr_code.as_deref(), Some(created.qr.as_str()));

        assert_eq!(
            rx.recv().await.unwrap(),
            LiveEvent::SpaceUpdate(SpaceUpdate {
                lot_id: f.lot_id,
                space_id: f.space_id,
                is_available: false,
            })
        );
    }

    #[tokio::test]
    async fn test_second_booking_is_rejected() {
        let f = fixture(50).await;
        let orchestrator = orchestrator(&f, Arc::new(SvgQrEncoder::default()));
        orchestrator.create(UserId(5), request(&f)).await.unwrap();

        let err = orchestrator.create(UserId(6), request(&f)).await.unwrap_err();

        assert!(matches!(err, ParkingError::SpaceUnavailable));
        assert_eq!(f.store.counters().await.unwrap().reservations, 1);
    }

    #[tokio::test]
    async fn test_space_from_another_lot_is_unavailable() {
        let f = fixture(50).await;
        let orchestrator = orchestrator(&f, Arc::new(SvgQrEncoder::default()));

        let err = orchestrator
            .create(
                UserId(5),
                ReservationRequest {
                    lot_id: LotId(999),
                    ..request(&f)
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ParkingError::SpaceUnavailable));
    }

    #[tokio::test]
    async fn test_failure_rolls_everything_back_and_stays_silent() {
        let f = fixture(50).await;
        let mut rx = f.hub.subscribe();
        let orchestrator = orchestrator(&f, Arc::new(FailingQr));

        let err = orchestrator.create(UserId(5), request(&f)).await.unwrap_err();

        assert!(matches!(err, ParkingError::Internal(_)));
        assert_eq!(f.store.counters().await.unwrap().reservations, 0);
        assert!(f.store.space(f.space_id).await.unwrap().unwrap().is_available);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_bookings_admit_exactly_one() {
        let f = fixture(50).await;
        let orchestrator = orchestrator(&f, Arc::new(SvgQrEncoder::default()));

        let (a, b) = tokio::join!(
            orchestrator.create(UserId(5), request(&f)),
            orchestrator.create(UserId(6), request(&f)),
        );

        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser, Err(ParkingError::SpaceUnavailable)));
    }

    #[tokio::test]
    async fn test_inverted_interval_bills_one_hour() {
        let f = fixture(40).await;
        let orchestrator = orchestrator(&f, Arc::new(SvgQrEncoder::default()));
        let forward = request(&f);

        let created = orchestrator
            .create(
                UserId(5),
                ReservationRequest {
                    start_time: forward.end_time,
                    end_time: forward.start_time,
                    ..forward
                },
            )
            .await
            .unwrap();

        assert_eq!(created.amount, Money::from_major(40));
    }
}
