//! Inventory store: the seam between business logic and persistence.
//!
//! Plain reads and single-statement writes go through [`ParkingStore`]
//! directly. Multi-step mutations run inside a [`UnitOfWork`] obtained from
//! [`ParkingStore::begin`], which provides:
//!
//! - **Atomicity**: nothing is visible to other callers until
//!   [`UnitOfWork::commit`]; [`UnitOfWork::rollback`] (or dropping the unit
//!   of work) discards every change
//! - **Row locking**: [`UnitOfWork::lock_space`] holds an exclusive lock on
//!   the space row until commit/rollback, serializing concurrent bookings of
//!   the same space
//!
//! # Implementations
//!
//! - [`PgParkingStore`]: `PostgreSQL` via `sqlx` (`SELECT ... FOR UPDATE`)
//! - [`MemoryParkingStore`]: in-process store for tests and local runs

use crate::error::Result;
use crate::types::{
    Counters, LotDraft, LotId, LotRevenue, Money, NewPayment, NewReservation, NewUser,
    ParkingLot, ParkingSession, ParkingSpace, Payment, ReceiptDetails, Reservation,
    ReservationId, ReservationStatus, SessionId, SpaceDraft, SpaceId, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;
pub mod postgres;

pub use memory::MemoryParkingStore;
pub use postgres::PgParkingStore;

/// Persistent storage for accounts, inventory, bookings, and payments.
#[async_trait]
pub trait ParkingStore: Send + Sync {
    /// Cheap connectivity check used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` if the backend is unreachable.
    async fn ping(&self) -> Result<()>;

    /// Open a unit of work.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` if no transaction can be started.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new account.
    ///
    /// # Errors
    ///
    /// - `ParkingError::Conflict` if the email is already registered
    /// - `ParkingError::Storage` on backend failure
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    /// Look up an account by email.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up an account by id.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn user_by_id(&self, user_id: UserId) -> Result<Option<User>>;

    // =========================================================================
    // Lots and spaces
    // =========================================================================

    /// List lots, optionally restricted to one city.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn list_lots(&self, city: Option<&str>) -> Result<Vec<ParkingLot>>;

    /// Fetch one lot.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn lot(&self, lot_id: LotId) -> Result<Option<ParkingLot>>;

    /// Create a lot owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn insert_lot(&self, owner: UserId, draft: &LotDraft) -> Result<LotId>;

    /// Overwrite a lot's writable fields. Returns `false` if the lot does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn update_lot(&self, lot_id: LotId, draft: &LotDraft) -> Result<bool>;

    /// Spaces of a lot, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn list_spaces(&self, lot_id: LotId) -> Result<Vec<ParkingSpace>>;

    /// Fetch one space.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn space(&self, space_id: SpaceId) -> Result<Option<ParkingSpace>>;

    /// Add available, active spaces to a lot. All or nothing.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn insert_spaces(&self, lot_id: LotId, spaces: &[SpaceDraft]) -> Result<Vec<SpaceId>>;

    // =========================================================================
    // Reservations and sessions
    // =========================================================================

    /// Fetch one reservation.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>>;

    /// A user's reservations, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn reservations_for_user(&self, user_id: UserId) -> Result<Vec<Reservation>>;

    /// Open a session for a reservation.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn insert_session(
        &self,
        reservation_id: ReservationId,
        entry_time: DateTime<Utc>,
    ) -> Result<ParkingSession>;

    /// All sessions of a reservation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn sessions_for(&self, reservation_id: ReservationId) -> Result<Vec<ParkingSession>>;

    // =========================================================================
    // Payments and reporting
    // =========================================================================

    /// Record a payment.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment>;

    /// Reservation joined with its user and lot, for receipts.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn receipt_details(&self, reservation_id: ReservationId)
    -> Result<Option<ReceiptDetails>>;

    /// Paid revenue per lot.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn revenue_by_lot(&self) -> Result<Vec<LotRevenue>>;

    /// Row counts.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn counters(&self) -> Result<Counters>;
}

/// One atomic unit of work.
///
/// Dropping a unit of work without calling [`commit`](Self::commit) rolls it back.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Lock the space row exclusively and return it, or `None` if no space
    /// with this id exists in this lot.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn lock_space(&mut self, lot_id: LotId, space_id: SpaceId)
    -> Result<Option<ParkingSpace>>;

    /// Hourly rate of a lot, or `None` if the lot does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn hourly_rate(&mut self, lot_id: LotId) -> Result<Option<Money>>;

    /// Insert a reservation row.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn insert_reservation(&mut self, reservation: &NewReservation) -> Result<Reservation>;

    /// Set a space's availability flag.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn set_space_available(&mut self, space_id: SpaceId, available: bool) -> Result<()>;

    /// Attach the encoded QR artifact to a reservation.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn set_reservation_qr(&mut self, reservation_id: ReservationId, qr: &str) -> Result<()>;

    /// Lock and fetch a reservation.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn lock_reservation(&mut self, reservation_id: ReservationId)
    -> Result<Option<Reservation>>;

    /// Update a reservation's status.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn set_reservation_status(
        &mut self,
        reservation_id: ReservationId,
        status: ReservationStatus,
    ) -> Result<()>;

    /// Lock and fetch the most recently created session of a reservation.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn latest_session(&mut self, reservation_id: ReservationId)
    -> Result<Option<ParkingSession>>;

    /// Record exit time and duration on a session.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn close_session(
        &mut self,
        session_id: SessionId,
        exit_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<()>;

    /// Make every change visible and release all locks.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` if the commit fails (nothing is applied).
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every change and release all locks.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` on backend failure.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
