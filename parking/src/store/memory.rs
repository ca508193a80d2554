//! In-memory [`ParkingStore`] for tests and local development.
//!
//! All tables live behind one async mutex. A [`UnitOfWork`] holds that
//! mutex for its whole lifetime and mutates a staged copy of the tables;
//! commit swaps the copy in, rollback (or drop) throws it away. Holding the
//! store-wide lock serializes units of work the same way the row lock does
//! in `PostgreSQL`.

use super::{ParkingStore, UnitOfWork};
use crate::error::{ParkingError, Result};
use crate::types::{
    ACTIVE_SPACE_STATUS, Counters, DEFAULT_SPACE_TYPE, LotDraft, LotId, LotRevenue, Money,
    NewPayment, NewReservation, NewUser, ParkingLot, ParkingSession, ParkingSpace, Payment,
    PaymentId, ReceiptDetails, Reservation, ReservationId, ReservationStatus, SessionId,
    SpaceDraft, SpaceId, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Payment status counted as revenue.
const PAID: &str = "paid";

#[derive(Clone, Debug, Default)]
struct Sequences {
    users: i64,
    lots: i64,
    spaces: i64,
    reservations: i64,
    sessions: i64,
    payments: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Clone, Debug, Default)]
struct Tables {
    seq: Sequences,
    users: BTreeMap<UserId, User>,
    lots: BTreeMap<LotId, ParkingLot>,
    spaces: BTreeMap<SpaceId, ParkingSpace>,
    reservations: BTreeMap<ReservationId, Reservation>,
    sessions: BTreeMap<SessionId, ParkingSession>,
    payments: BTreeMap<PaymentId, Payment>,
}

impl Tables {
    fn reservation_mut(&mut self, id: ReservationId) -> Result<&mut Reservation> {
        self.reservations
            .get_mut(&id)
            .ok_or_else(|| ParkingError::Storage(format!("reservation {id} does not exist")))
    }
}

/// In-memory store. Cloning shares the underlying tables.
#[derive(Clone, Debug, Default)]
pub struct MemoryParkingStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryParkingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParkingStore for MemoryParkingStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, staged }))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(ParkingError::Conflict("Email already exists".to_string()));
        }
        let user = User {
            user_id: UserId(next(&mut tables.seq.users)),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            phone: user.phone,
            role: user.role,
            created_at: Utc::now(),
        };
        tables.users.insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn user_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(&user_id).cloned())
    }

    async fn list_lots(&self, city: Option<&str>) -> Result<Vec<ParkingLot>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .lots
            .values()
            .filter(|lot| city.is_none_or(|c| lot.city.as_deref() == Some(c)))
            .cloned()
            .collect())
    }

    async fn lot(&self, lot_id: LotId) -> Result<Option<ParkingLot>> {
        Ok(self.tables.lock().await.lots.get(&lot_id).cloned())
    }

    async fn insert_lot(&self, owner: UserId, draft: &LotDraft) -> Result<LotId> {
        let mut tables = self.tables.lock().await;
        let lot_id = LotId(next(&mut tables.seq.lots));
        tables.lots.insert(
            lot_id,
            ParkingLot {
                lot_id,
                lot_name: draft.lot_name.clone(),
                address: draft.address.clone(),
                city: draft.city.clone(),
                state: draft.state.clone(),
                latitude: draft.latitude,
                longitude: draft.longitude,
                total_spaces: draft.total_spaces,
                hourly_rate: draft.hourly_rate,
                owner_id: Some(owner),
                created_at: Utc::now(),
            },
        );
        Ok(lot_id)
    }

    async fn update_lot(&self, lot_id: LotId, draft: &LotDraft) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let Some(lot) = tables.lots.get_mut(&lot_id) else {
            return Ok(false);
        };
        lot.lot_name.clone_from(&draft.lot_name);
        lot.address.clone_from(&draft.address);
        lot.city.clone_from(&draft.city);
        lot.state.clone_from(&draft.state);
        lot.latitude = draft.latitude;
        lot.longitude = draft.longitude;
        lot.total_spaces = draft.total_spaces;
        lot.hourly_rate = draft.hourly_rate;
        Ok(true)
    }

    async fn list_spaces(&self, lot_id: LotId) -> Result<Vec<ParkingSpace>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .spaces
            .values()
            .filter(|s| s.lot_id == lot_id)
            .cloned()
            .collect())
    }

    async fn space(&self, space_id: SpaceId) -> Result<Option<ParkingSpace>> {
        Ok(self.tables.lock().await.spaces.get(&space_id).cloned())
    }

    async fn insert_spaces(&self, lot_id: LotId, spaces: &[SpaceDraft]) -> Result<Vec<SpaceId>> {
        let mut tables = self.tables.lock().await;
        if !tables.lots.contains_key(&lot_id) {
            return Err(ParkingError::Storage(format!("lot {lot_id} does not exist")));
        }
        let mut ids = Vec::with_capacity(spaces.len());
        for draft in spaces {
            let space_id = SpaceId(next(&mut tables.seq.spaces));
            tables.spaces.insert(
                space_id,
                ParkingSpace {
                    space_id,
                    lot_id,
                    space_number: draft.space_number.clone(),
                    space_type: draft
                        .space_type
                        .clone()
                        .unwrap_or_else(|| DEFAULT_SPACE_TYPE.to_string()),
                    floor_level: draft.floor_level.clone(),
                    is_available: true,
                    status: ACTIVE_SPACE_STATUS.to_string(),
                },
            );
            ids.push(space_id);
        }
        Ok(ids)
    }

    async fn reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self
            .tables
            .lock()
            .await
            .reservations
            .get(&reservation_id)
            .cloned())
    }

    async fn reservations_for_user(&self, user_id: UserId) -> Result<Vec<Reservation>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reservations
            .values()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_session(
        &self,
        reservation_id: ReservationId,
        entry_time: DateTime<Utc>,
    ) -> Result<ParkingSession> {
        let mut tables = self.tables.lock().await;
        if !tables.reservations.contains_key(&reservation_id) {
            return Err(ParkingError::Storage(format!(
                "reservation {reservation_id} does not exist"
            )));
        }
        let session = ParkingSession {
            session_id: SessionId(next(&mut tables.seq.sessions)),
            reservation_id,
            entry_time,
            exit_time: None,
            actual_duration: None,
        };
        tables.sessions.insert(session.session_id, session.clone());
        Ok(session)
    }

    async fn sessions_for(&self, reservation_id: ReservationId) -> Result<Vec<ParkingSession>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .values()
            .filter(|s| s.reservation_id == reservation_id)
            .cloned()
            .collect())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        let mut tables = self.tables.lock().await;
        if !tables.reservations.contains_key(&payment.reservation_id) {
            return Err(ParkingError::Storage(format!(
                "reservation {} does not exist",
                payment.reservation_id
            )));
        }
        let payment = Payment {
            payment_id: PaymentId(next(&mut tables.seq.payments)),
            reservation_id: payment.reservation_id,
            user_id: payment.user_id,
            amount: payment.amount,
            payment_method: payment.payment_method,
            transaction_id: payment.transaction_id,
            payment_status: payment.payment_status,
            created_at: Utc::now(),
        };
        tables.payments.insert(payment.payment_id, payment.clone());
        Ok(payment)
    }

    async fn receipt_details(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<ReceiptDetails>> {
        let tables = self.tables.lock().await;
        let Some(reservation) = tables.reservations.get(&reservation_id) else {
            return Ok(None);
        };
        let (Some(user), Some(lot)) = (
            tables.users.get(&reservation.user_id),
            tables.lots.get(&reservation.lot_id),
        ) else {
            return Ok(None);
        };
        Ok(Some(ReceiptDetails {
            reservation: reservation.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            lot_name: lot.lot_name.clone(),
            address: lot.address.clone(),
        }))
    }

    async fn revenue_by_lot(&self) -> Result<Vec<LotRevenue>> {
        let tables = self.tables.lock().await;
        let mut report: Vec<LotRevenue> = tables
            .lots
            .values()
            .map(|lot| {
                let paid = tables.payments.values().filter(|p| {
                    p.payment_status == PAID
                        && tables
                            .reservations
                            .get(&p.reservation_id)
                            .is_some_and(|r| r.lot_id == lot.lot_id)
                });
                let (payments, revenue) = paid.fold((0, Money::ZERO), |(n, sum), p| {
                    (n + 1, Money::from_minor(sum.minor() + p.amount.minor()))
                });
                LotRevenue {
                    lot_id: lot.lot_id,
                    lot_name: lot.lot_name.clone(),
                    payments,
                    revenue,
                }
            })
            .collect();
        report.sort_by(|a, b| b.revenue.cmp(&a.revenue).then(a.lot_id.cmp(&b.lot_id)));
        Ok(report)
    }

    async fn counters(&self) -> Result<Counters> {
        let tables = self.tables.lock().await;
        let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        Ok(Counters {
            users: count(tables.users.len()),
            lots: count(tables.lots.len()),
            spaces: count(tables.spaces.len()),
            reservations: count(tables.reservations.len()),
        })
    }
}

// =============================================================================
// Unit of work
// =============================================================================

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_space(
        &mut self,
        lot_id: LotId,
        space_id: SpaceId,
    ) -> Result<Option<ParkingSpace>> {
        Ok(self
            .staged
            .spaces
            .get(&space_id)
            .filter(|s| s.lot_id == lot_id)
            .cloned())
    }

    async fn hourly_rate(&mut self, lot_id: LotId) -> Result<Option<Money>> {
        Ok(self.staged.lots.get(&lot_id).map(|lot| lot.hourly_rate))
    }

    async fn insert_reservation(&mut self, new: &NewReservation) -> Result<Reservation> {
        if !self.staged.spaces.contains_key(&new.space_id) {
            return Err(ParkingError::Storage(format!(
                "space {} does not exist",
                new.space_id
            )));
        }
        let reservation = Reservation {
            reservation_id: ReservationId(next(&mut self.staged.seq.reservations)),
            user_id: new.user_id,
            lot_id: new.lot_id,
            space_id: new.space_id,
            start_time: new.start_time,
            end_time: new.end_time,
            total_amount: new.total_amount,
            status: new.status,
            qr_code: None,
            created_at: Utc::now(),
        };
        self.staged
            .reservations
            .insert(reservation.reservation_id, reservation.clone());
        Ok(reservation)
    }

    async fn set_space_available(&mut self, space_id: SpaceId, available: bool) -> Result<()> {
        if let Some(space) = self.staged.spaces.get_mut(&space_id) {
            space.is_available = available;
        }
        Ok(())
    }

    async fn set_reservation_qr(&mut self, reservation_id: ReservationId, qr: &str) -> Result<()> {
        self.staged.reservation_mut(reservation_id)?.qr_code = Some(qr.to_string());
        Ok(())
    }

    async fn lock_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>> {
        Ok(self.staged.reservations.get(&reservation_id).cloned())
    }

    async fn set_reservation_status(
        &mut self,
        reservation_id: ReservationId,
        status: ReservationStatus,
    ) -> Result<()> {
        self.staged.reservation_mut(reservation_id)?.status = status;
        Ok(())
    }

    async fn latest_session(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<ParkingSession>> {
        Ok(self
            .staged
            .sessions
            .values()
            .rev()
            .find(|s| s.reservation_id == reservation_id)
            .cloned())
    }

    async fn close_session(
        &mut self,
        session_id: SessionId,
        exit_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<()> {
        let session = self
            .staged
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| ParkingError::Storage(format!("session {session_id} does not exist")))?;
        session.exit_time = Some(exit_time);
        session.actual_duration = Some(duration_minutes);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::Role;

    async fn seeded() -> (MemoryParkingStore, LotId, SpaceId) {
        let store = MemoryParkingStore::new();
        let lot = store
            .insert_lot(
                UserId(1),
                &LotDraft {
                    lot_name: "Central".into(),
                    hourly_rate: Money::from_major(50),
                    ..LotDraft::default()
                },
            )
            .await
            .unwrap();
        let spaces = store
            .insert_spaces(
                lot,
                &[SpaceDraft {
                    space_number: "A1".into(),
                    space_type: None,
                    floor_level: None,
                }],
            )
            .await
            .unwrap();
        (store, lot, spaces[0])
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_conflict() {
        let store = MemoryParkingStore::new();
        let user = NewUser {
            username: "asha".into(),
            email: "asha@example.com".into(),
            password_hash: "hash".into(),
            phone: None,
            role: Role::User,
        };
        store.insert_user(user.clone()).await.unwrap();

        let err = store.insert_user(user).await.unwrap_err();
        assert!(matches!(err, ParkingError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_new_spaces_are_available_and_regular() {
        let (store, _, space_id) = seeded().await;
        let space = store.space(space_id).await.unwrap().unwrap();

        assert!(space.is_available);
        assert_eq!(space.space_type, DEFAULT_SPACE_TYPE);
        assert_eq!(space.status, ACTIVE_SPACE_STATUS);
    }

    #[tokio::test]
    async fn test_lock_space_requires_matching_lot() {
        let (store, lot, space_id) = seeded().await;
        let mut uow = store.begin().await.unwrap();

        assert!(uow.lock_space(lot, space_id).await.unwrap().is_some());
        assert!(uow.lock_space(LotId(99), space_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_changes() {
        let (store, _, space_id) = seeded().await;

        let mut uow = store.begin().await.unwrap();
        uow.set_space_available(space_id, false).await.unwrap();
        uow.rollback().await.unwrap();

        assert!(store.space(space_id).await.unwrap().unwrap().is_available);
    }

    #[tokio::test]
    async fn test_drop_discards_staged_changes() {
        let (store, _, space_id) = seeded().await;

        {
            let mut uow = store.begin().await.unwrap();
            uow.set_space_available(space_id, false).await.unwrap();
        }

        assert!(store.space(space_id).await.unwrap().unwrap().is_available);
    }

    #[tokio::test]
    async fn test_commit_publishes_staged_changes() {
        let (store, _, space_id) = seeded().await;

        let mut uow = store.begin().await.unwrap();
        uow.set_space_available(space_id, false).await.unwrap();
        uow.commit().await.unwrap();

        assert!(!store.space(space_id).await.unwrap().unwrap().is_available);
    }

    #[tokio::test]
    async fn test_unit_of_work_blocks_other_writers() {
        let (store, _, _) = seeded().await;
        let uow = store.begin().await.unwrap();

        let contender = store.clone();
        let pending = tokio::spawn(async move { contender.counters().await });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        uow.commit().await.unwrap();
        let counters = pending.await.unwrap().unwrap();
        assert_eq!(counters.lots, 1);
    }
}
