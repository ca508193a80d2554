//! Gate entry/exit for reservations.
//!
//! Entry opens a session against a `confirmed` reservation. Exit closes the
//! newest session, frees the space, and completes the reservation in one
//! unit of work; the `space_update(is_available = true)` event is published
//! only after that commits.

use crate::error::{ParkingError, Result};
use crate::metrics;
use crate::notify::{Notifier, PostCommitHooks};
use crate::store::{ParkingStore, UnitOfWork};
use crate::types::{ParkingSession, ReservationId, ReservationStatus, SpaceUpdate};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Whole minutes from `entry` to `exit`, never negative.
#[must_use]
pub fn duration_minutes(entry: DateTime<Utc>, exit: DateTime<Utc>) -> i64 {
    (exit - entry).num_minutes().max(0)
}

/// Entry/exit validation.
#[derive(Clone)]
pub struct SessionLifecycle {
    store: Arc<dyn ParkingStore>,
    notifier: Arc<dyn Notifier>,
}

impl SessionLifecycle {
    /// Wire the lifecycle to its collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn ParkingStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Record a vehicle entering on `reservation_id`.
    ///
    /// Not idempotent: each call opens another session.
    ///
    /// # Errors
    ///
    /// - `ParkingError::NotFound` if the reservation does not exist
    /// - `ParkingError::InvalidState` if it is not `confirmed`; no session
    ///   is created
    #[instrument(skip_all, fields(reservation_id = %reservation_id))]
    pub async fn validate_entry(&self, reservation_id: ReservationId) -> Result<ParkingSession> {
        let reservation = self
            .store
            .reservation(reservation_id)
            .await?
            .ok_or_else(|| ParkingError::NotFound("Not found".to_string()))?;

        if reservation.status != ReservationStatus::Confirmed {
            warn!(status = %reservation.status, "Entry rejected");
            return Err(ParkingError::InvalidState("Invalid status".to_string()));
        }

        let session = self.store.insert_session(reservation_id, Utc::now()).await?;
        metrics::record_entry();
        info!(session_id = %session.session_id, "Vehicle entered");
        Ok(session)
    }

    /// Record a vehicle leaving on `reservation_id`.
    ///
    /// Returns the closed session.
    ///
    /// # Errors
    ///
    /// - `ParkingError::NotFound` ("No session") if the reservation has no
    ///   session
    /// - `ParkingError::InvalidState` if the reservation is no longer
    ///   `confirmed`; its space may already be held by someone else
    #[instrument(skip_all, fields(reservation_id = %reservation_id))]
    pub async fn validate_exit(&self, reservation_id: ReservationId) -> Result<ParkingSession> {
        let mut uow = self.store.begin().await?;

        let outcome = Self::close(uow.as_mut(), reservation_id).await;
        match outcome {
            Ok((session, hooks)) => {
                uow.commit().await?;
                hooks.fire(self.notifier.as_ref());
                let minutes = session.actual_duration.unwrap_or_default();
                metrics::record_exit(minutes);
                info!(
                    session_id = %session.session_id,
                    duration_minutes = minutes,
                    "Vehicle exited"
                );
                Ok(session)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed; transaction dropped");
                }
                warn!(error = %err, "Exit rejected");
                Err(err)
            }
        }
    }

    async fn close(
        uow: &mut dyn UnitOfWork,
        reservation_id: ReservationId,
    ) -> Result<(ParkingSession, PostCommitHooks)> {
        let mut session = uow
            .latest_session(reservation_id)
            .await?
            .ok_or_else(|| ParkingError::NotFound("No session".to_string()))?;

        let reservation = uow
            .lock_reservation(reservation_id)
            .await?
            .ok_or_else(|| ParkingError::not_found("Reservation"))?;
        if reservation.status != ReservationStatus::Confirmed {
            return Err(ParkingError::InvalidState(
                "Reservation already completed".to_string(),
            ));
        }

        let exit_time = Utc::now();
        let minutes = duration_minutes(session.entry_time, exit_time);
        uow.close_session(session.session_id, exit_time, minutes).await?;
        uow.set_space_available(reservation.space_id, true).await?;
        uow.set_reservation_status(reservation_id, ReservationStatus::Completed)
            .await?;

        session.exit_time = Some(exit_time);
        session.actual_duration = Some(minutes);

        let mut hooks = PostCommitHooks::new();
        hooks.space_update(SpaceUpdate {
            lot_id: reservation.lot_id,
            space_id: reservation.space_id,
            is_available: true,
        });
        Ok((session, hooks))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::qr::SvgQrEncoder;
    use crate::reservation::{ReservationOrchestrator, ReservationRequest};
    use crate::store::MemoryParkingStore;
    use crate::types::{LiveEvent, LotDraft, LotId, Money, SpaceDraft, SpaceId, UserId};
    use chrono::{Duration, TimeZone};
    use parking_web::Broadcaster;

    struct Booked {
        store: MemoryParkingStore,
        hub: Broadcaster<LiveEvent>,
        lifecycle: SessionLifecycle,
        lot_id: LotId,
        space_id: SpaceId,
        reservation_id: ReservationId,
    }

    async fn booked() -> Booked {
        let store = MemoryParkingStore::new();
        let hub = Broadcaster::new(16);
        let lot_id = store
            .insert_lot(
                UserId(1),
                &LotDraft {
                    lot_name: "Station Road".into(),
                    hourly_rate: Money::from_major(20),
                    ..LotDraft::default()
                },
            )
            .await
            .unwrap();
        let space_id = store
            .insert_spaces(
                lot_id,
                &[SpaceDraft {
                    space_number: "C7".into(),
                    space_type: Some("compact".into()),
                    floor_level: None,
                }],
            )
            .await
            .unwrap()[0];

        let shared: Arc<dyn ParkingStore> = Arc::new(store.clone());
        let notifier: Arc<dyn Notifier> = Arc::new(hub.clone());
        let created = ReservationOrchestrator::new(
            Arc::clone(&shared),
            Arc::new(SvgQrEncoder::default()),
            Arc::clone(&notifier),
        )
        .create(
            UserId(2),
            ReservationRequest {
                lot_id,
                space_id,
                start_time: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
                end_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            },
        )
        .await
        .unwrap();

        Booked {
            lifecycle: SessionLifecycle::new(shared, notifier),
            store,
            hub,
            lot_id,
            space_id,
            reservation_id: created.reservation_id,
        }
    }

    #[test]
    fn test_duration_is_whole_non_negative_minutes() {
        let entry = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        assert_eq!(duration_minutes(entry, entry + Duration::seconds(119)), 1);
        assert_eq!(duration_minutes(entry, entry + Duration::minutes(95)), 95);
        assert_eq!(duration_minutes(entry, entry - Duration::minutes(5)), 0);
    }

    #[tokio::test]
    async fn test_entry_then_exit_completes_and_frees_space() {
        let b = booked().await;
        let mut rx = b.hub.subscribe();

        b.lifecycle.validate_entry(b.reservation_id).await.unwrap();
        let closed = b.lifecycle.validate_exit(b.reservation_id).await.unwrap();

        assert!(closed.exit_time.is_some());
        assert_eq!(closed.actual_duration, Some(0));
        let reservation = b.store.reservation(b.reservation_id).await.unwrap().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Completed);
        assert!(b.store.space(b.space_id).await.unwrap().unwrap().is_available);
        assert_eq!(
            rx.recv().await.unwrap(),
            LiveEvent::SpaceUpdate(SpaceUpdate {
                lot_id: b.lot_id,
                space_id: b.space_id,
                is_available: true,
            })
        );
    }

    #[tokio::test]
    async fn test_entry_on_completed_reservation_is_rejected() {
        let b = booked().await;
        b.lifecycle.validate_entry(b.reservation_id).await.unwrap();
        b.lifecycle.validate_exit(b.reservation_id).await.unwrap();

        let err = b.lifecycle.validate_entry(b.reservation_id).await.unwrap_err();

        assert!(matches!(err, ParkingError::InvalidState(_)));
        assert_eq!(b.store.sessions_for(b.reservation_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_entry_on_unknown_reservation_is_not_found() {
        let b = booked().await;
        let err = b.lifecycle.validate_entry(ReservationId(404)).await.unwrap_err();
        assert!(matches!(err, ParkingError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_exit_without_session_is_not_found() {
        let b = booked().await;
        let mut rx = b.hub.subscribe();

        let err = b.lifecycle.validate_exit(b.reservation_id).await.unwrap_err();

        assert!(matches!(err, ParkingError::NotFound(ref m) if m == "No session"));
        assert!(!b.store.space(b.space_id).await.unwrap().unwrap().is_available);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_exit_closes_only_the_newest_session() {
        let b = booked().await;
        let first = b.lifecycle.validate_entry(b.reservation_id).await.unwrap();
        let second = b.lifecycle.validate_entry(b.reservation_id).await.unwrap();

        b.lifecycle.validate_exit(b.reservation_id).await.unwrap();

        let sessions = b.store.sessions_for(b.reservation_id).await.unwrap();
        let by_id = |id| sessions.iter().find(|s| s.session_id == id).unwrap();
        assert!(by_id(first.session_id).exit_time.is_none());
        assert!(by_id(second.session_id).exit_time.is_some());
    }

    #[tokio::test]
    async fn test_second_exit_does_not_free_the_space_again() {
        let b = booked().await;
        b.lifecycle.validate_entry(b.reservation_id).await.unwrap();
        b.lifecycle.validate_exit(b.reservation_id).await.unwrap();

        let err = b.lifecycle.validate_exit(b.reservation_id).await.unwrap_err();
        assert!(matches!(err, ParkingError::InvalidState(_)));
    }
}
