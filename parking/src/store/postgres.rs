//! `PostgreSQL` implementation of [`ParkingStore`].
//!
//! Queries are checked at runtime (`sqlx::query_as` into private row
//! structs) so the workspace builds without a live database. Row structs
//! hold plain column types and convert into domain types here; money
//! columns are `BIGINT` minor units.
//!
//! # Example
//!
//! ```no_run
//! use parking::store::PgParkingStore;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgres://localhost/parking").await?;
//! let store = PgParkingStore::new(pool);
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use super::{ParkingStore, UnitOfWork};
use crate::config::DatabaseConfig;
use crate::error::{ParkingError, Result};
use crate::types::{
    ACTIVE_SPACE_STATUS, Counters, DEFAULT_SPACE_TYPE, LotDraft, LotId, LotRevenue, Money,
    NewPayment, NewReservation, NewUser, ParkingLot, ParkingSession, ParkingSpace, Payment,
    PaymentId, ReceiptDetails, Reservation, ReservationId, ReservationStatus, SessionId,
    SpaceDraft, SpaceId, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::time::Duration;

const USER_COLUMNS: &str = "user_id, username, email, password_hash, phone, user_type, created_at";
const LOT_COLUMNS: &str = "lot_id, lot_name, address, city, state, latitude, longitude, \
                           total_spaces, hourly_rate, owner_id, created_at";
const SPACE_COLUMNS: &str =
    "space_id, lot_id, space_number, space_type, floor_level, is_available, status";
const RESERVATION_COLUMNS: &str = "reservation_id, user_id, lot_id, space_id, start_time, \
                                   end_time, total_amount, status, qr_code, created_at";
const SESSION_COLUMNS: &str =
    "session_id, reservation_id, entry_time, exit_time, actual_duration";

// ============================================================================
// Row mapping
// ============================================================================

#[derive(FromRow)]
struct UserRow {
    user_id: i64,
    username: String,
    email: String,
    password_hash: String,
    phone: Option<String>,
    user_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = ParkingError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            user_id: UserId(row.user_id),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            phone: row.phone,
            role: row
                .user_type
                .parse()
                .map_err(|e| ParkingError::Storage(format!("corrupt users row: {e}")))?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct LotRow {
    lot_id: i64,
    lot_name: String,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    total_spaces: i32,
    hourly_rate: i64,
    owner_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl From<LotRow> for ParkingLot {
    fn from(row: LotRow) -> Self {
        Self {
            lot_id: LotId(row.lot_id),
            lot_name: row.lot_name,
            address: row.address,
            city: row.city,
            state: row.state,
            latitude: row.latitude,
            longitude: row.longitude,
            total_spaces: row.total_spaces,
            hourly_rate: Money::from_minor(row.hourly_rate),
            owner_id: row.owner_id.map(UserId),
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SpaceRow {
    space_id: i64,
    lot_id: i64,
    space_number: String,
    space_type: String,
    floor_level: Option<String>,
    is_available: bool,
    status: String,
}

impl From<SpaceRow> for ParkingSpace {
    fn from(row: SpaceRow) -> Self {
        Self {
            space_id: SpaceId(row.space_id),
            lot_id: LotId(row.lot_id),
            space_number: row.space_number,
            space_type: row.space_type,
            floor_level: row.floor_level,
            is_available: row.is_available,
            status: row.status,
        }
    }
}

#[derive(FromRow)]
struct ReservationRow {
    reservation_id: i64,
    user_id: i64,
    lot_id: i64,
    space_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    total_amount: i64,
    status: String,
    qr_code: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = ParkingError;

    fn try_from(row: ReservationRow) -> Result<Self> {
        Ok(Self {
            reservation_id: ReservationId(row.reservation_id),
            user_id: UserId(row.user_id),
            lot_id: LotId(row.lot_id),
            space_id: SpaceId(row.space_id),
            start_time: row.start_time,
            end_time: row.end_time,
            total_amount: Money::from_minor(row.total_amount),
            status: row
                .status
                .parse()
                .map_err(|e| ParkingError::Storage(format!("corrupt reservations row: {e}")))?,
            qr_code: row.qr_code,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct SessionRow {
    session_id: i64,
    reservation_id: i64,
    entry_time: DateTime<Utc>,
    exit_time: Option<DateTime<Utc>>,
    actual_duration: Option<i64>,
}

impl From<SessionRow> for ParkingSession {
    fn from(row: SessionRow) -> Self {
        Self {
            session_id: SessionId(row.session_id),
            reservation_id: ReservationId(row.reservation_id),
            entry_time: row.entry_time,
            exit_time: row.exit_time,
            actual_duration: row.actual_duration,
        }
    }
}

#[derive(FromRow)]
struct PaymentRow {
    payment_id: i64,
    reservation_id: i64,
    user_id: i64,
    amount: i64,
    payment_method: String,
    transaction_id: String,
    payment_status: String,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            payment_id: PaymentId(row.payment_id),
            reservation_id: ReservationId(row.reservation_id),
            user_id: UserId(row.user_id),
            amount: Money::from_minor(row.amount),
            payment_method: row.payment_method,
            transaction_id: row.transaction_id,
            payment_status: row.payment_status,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ReceiptRow {
    #[sqlx(flatten)]
    reservation: ReservationRow,
    username: String,
    email: String,
    lot_name: String,
    address: Option<String>,
}

#[derive(FromRow)]
struct RevenueRow {
    lot_id: i64,
    lot_name: String,
    payments: i64,
    revenue: i64,
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = ParkingError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// Store
// ============================================================================

/// `PostgreSQL`-backed store.
#[derive(Clone, Debug)]
pub struct PgParkingStore {
    pool: PgPool,
}

impl PgParkingStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool sized and timed by `config`.
    ///
    /// `ssl` forces `sslmode=require`; otherwise the URL's own setting wins.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` if the URL is malformed or the first
    /// connection cannot be established.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut options: PgConnectOptions = config
            .url
            .parse()
            .map_err(|e: sqlx::Error| ParkingError::Storage(format!("invalid DATABASE_URL: {e}")))?;
        if config.ssl {
            options = options.ssl_mode(PgSslMode::Require);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Storage` if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ParkingStore for PgParkingStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (username, email, password_hash, phone, user_type) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn user_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"))
                .bind(user_id.get())
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_lots(&self, city: Option<&str>) -> Result<Vec<ParkingLot>> {
        let rows: Vec<LotRow> = sqlx::query_as(&format!(
            "SELECT {LOT_COLUMNS} FROM parking_lots \
             WHERE ($1::TEXT IS NULL OR city = $1) ORDER BY lot_id"
        ))
        .bind(city)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ParkingLot::from).collect())
    }

    async fn lot(&self, lot_id: LotId) -> Result<Option<ParkingLot>> {
        let row: Option<LotRow> = sqlx::query_as(&format!(
            "SELECT {LOT_COLUMNS} FROM parking_lots WHERE lot_id = $1"
        ))
        .bind(lot_id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ParkingLot::from))
    }

    async fn insert_lot(&self, owner: UserId, draft: &LotDraft) -> Result<LotId> {
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO parking_lots
                (lot_name, address, city, state, latitude, longitude,
                 total_spaces, hourly_rate, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING lot_id
            ",
        )
        .bind(&draft.lot_name)
        .bind(&draft.address)
        .bind(&draft.city)
        .bind(&draft.state)
        .bind(draft.latitude)
        .bind(draft.longitude)
        .bind(draft.total_spaces)
        .bind(draft.hourly_rate.minor())
        .bind(owner.get())
        .fetch_one(&self.pool)
        .await?;
        Ok(LotId(id))
    }

    async fn update_lot(&self, lot_id: LotId, draft: &LotDraft) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE parking_lots
            SET lot_name = $1, address = $2, city = $3, state = $4, latitude = $5,
                longitude = $6, total_spaces = $7, hourly_rate = $8
            WHERE lot_id = $9
            ",
        )
        .bind(&draft.lot_name)
        .bind(&draft.address)
        .bind(&draft.city)
        .bind(&draft.state)
        .bind(draft.latitude)
        .bind(draft.longitude)
        .bind(draft.total_spaces)
        .bind(draft.hourly_rate.minor())
        .bind(lot_id.get())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_spaces(&self, lot_id: LotId) -> Result<Vec<ParkingSpace>> {
        let rows: Vec<SpaceRow> = sqlx::query_as(&format!(
            "SELECT {SPACE_COLUMNS} FROM parking_spaces WHERE lot_id = $1 ORDER BY space_id"
        ))
        .bind(lot_id.get())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ParkingSpace::from).collect())
    }

    async fn space(&self, space_id: SpaceId) -> Result<Option<ParkingSpace>> {
        let row: Option<SpaceRow> = sqlx::query_as(&format!(
            "SELECT {SPACE_COLUMNS} FROM parking_spaces WHERE space_id = $1"
        ))
        .bind(space_id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ParkingSpace::from))
    }

    async fn insert_spaces(&self, lot_id: LotId, spaces: &[SpaceDraft]) -> Result<Vec<SpaceId>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(spaces.len());
        for draft in spaces {
            let id: i64 = sqlx::query_scalar(
                r"
                INSERT INTO parking_spaces
                    (lot_id, space_number, space_type, floor_level, is_available, status)
                VALUES ($1, $2, $3, $4, TRUE, $5)
                RETURNING space_id
                ",
            )
            .bind(lot_id.get())
            .bind(&draft.space_number)
            .bind(draft.space_type.as_deref().unwrap_or(DEFAULT_SPACE_TYPE))
            .bind(&draft.floor_level)
            .bind(ACTIVE_SPACE_STATUS)
            .fetch_one(&mut *tx)
            .await?;
            ids.push(SpaceId(id));
        }
        tx.commit().await?;
        Ok(ids)
    }

    async fn reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE reservation_id = $1"
        ))
        .bind(reservation_id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Reservation::try_from).transpose()
    }

    async fn reservations_for_user(&self, user_id: UserId) -> Result<Vec<Reservation>> {
        let rows: Vec<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE user_id = $1 \
             ORDER BY created_at DESC, reservation_id DESC"
        ))
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn insert_session(
        &self,
        reservation_id: ReservationId,
        entry_time: DateTime<Utc>,
    ) -> Result<ParkingSession> {
        let row: SessionRow = sqlx::query_as(&format!(
            "INSERT INTO parking_sessions (reservation_id, entry_time) VALUES ($1, $2) \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(reservation_id.get())
        .bind(entry_time)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn sessions_for(&self, reservation_id: ReservationId) -> Result<Vec<ParkingSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM parking_sessions WHERE reservation_id = $1 \
             ORDER BY session_id"
        ))
        .bind(reservation_id.get())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ParkingSession::from).collect())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        let row: PaymentRow = sqlx::query_as(
            r"
            INSERT INTO payments
                (reservation_id, user_id, amount, payment_method, transaction_id, payment_status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING payment_id, reservation_id, user_id, amount, payment_method,
                      transaction_id, payment_status, created_at
            ",
        )
        .bind(payment.reservation_id.get())
        .bind(payment.user_id.get())
        .bind(payment.amount.minor())
        .bind(&payment.payment_method)
        .bind(&payment.transaction_id)
        .bind(&payment.payment_status)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn receipt_details(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<ReceiptDetails>> {
        let row: Option<ReceiptRow> = sqlx::query_as(
            r"
            SELECT r.reservation_id, r.user_id, r.lot_id, r.space_id, r.start_time,
                   r.end_time, r.total_amount, r.status, r.qr_code, r.created_at,
                   u.username, u.email, l.lot_name, l.address
            FROM reservations r
            JOIN users u ON u.user_id = r.user_id
            JOIN parking_lots l ON l.lot_id = r.lot_id
            WHERE r.reservation_id = $1
            ",
        )
        .bind(reservation_id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(ReceiptDetails {
                reservation: row.reservation.try_into()?,
                username: row.username,
                email: row.email,
                lot_name: row.lot_name,
                address: row.address,
            })
        })
        .transpose()
    }

    async fn revenue_by_lot(&self) -> Result<Vec<LotRevenue>> {
        let rows: Vec<RevenueRow> =
            sqlx::query_as("SELECT lot_id, lot_name, payments, revenue FROM vw_revenue_by_lot")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|row| LotRevenue {
                lot_id: LotId(row.lot_id),
                lot_name: row.lot_name,
                payments: row.payments,
                revenue: Money::from_minor(row.revenue),
            })
            .collect())
    }

    async fn counters(&self) -> Result<Counters> {
        let (users, lots, spaces, reservations): (i64, i64, i64, i64) = sqlx::query_as(
            r"
            SELECT (SELECT COUNT(*) FROM users),
                   (SELECT COUNT(*) FROM parking_lots),
                   (SELECT COUNT(*) FROM parking_spaces),
                   (SELECT COUNT(*) FROM reservations)
            ",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(Counters {
            users,
            lots,
            spaces,
            reservations,
        })
    }
}

// ============================================================================
// Unit of work
// ============================================================================

/// One database transaction. Dropping it rolls back.
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_space(
        &mut self,
        lot_id: LotId,
        space_id: SpaceId,
    ) -> Result<Option<ParkingSpace>> {
        let row: Option<SpaceRow> = sqlx::query_as(&format!(
            "SELECT {SPACE_COLUMNS} FROM parking_spaces \
             WHERE space_id = $1 AND lot_id = $2 FOR UPDATE"
        ))
        .bind(space_id.get())
        .bind(lot_id.get())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(ParkingSpace::from))
    }

    async fn hourly_rate(&mut self, lot_id: LotId) -> Result<Option<Money>> {
        let rate: Option<i64> =
            sqlx::query_scalar("SELECT hourly_rate FROM parking_lots WHERE lot_id = $1")
                .bind(lot_id.get())
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(rate.map(Money::from_minor))
    }

    async fn insert_reservation(&mut self, new: &NewReservation) -> Result<Reservation> {
        let row: ReservationRow = sqlx::query_as(&format!(
            "INSERT INTO reservations \
                 (user_id, lot_id, space_id, start_time, end_time, total_amount, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {RESERVATION_COLUMNS}"
        ))
        .bind(new.user_id.get())
        .bind(new.lot_id.get())
        .bind(new.space_id.get())
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(new.total_amount.minor())
        .bind(new.status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn set_space_available(&mut self, space_id: SpaceId, available: bool) -> Result<()> {
        sqlx::query("UPDATE parking_spaces SET is_available = $1 WHERE space_id = $2")
            .bind(available)
            .bind(space_id.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn set_reservation_qr(&mut self, reservation_id: ReservationId, qr: &str) -> Result<()> {
        sqlx::query("UPDATE reservations SET qr_code = $1 WHERE reservation_id = $2")
            .bind(qr)
            .bind(reservation_id.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE reservation_id = $1 FOR UPDATE"
        ))
        .bind(reservation_id.get())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Reservation::try_from).transpose()
    }

    async fn set_reservation_status(
        &mut self,
        reservation_id: ReservationId,
        status: ReservationStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE reservations SET status = $1 WHERE reservation_id = $2")
            .bind(status.as_str())
            .bind(reservation_id.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn latest_session(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<ParkingSession>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM parking_sessions WHERE reservation_id = $1 \
             ORDER BY session_id DESC LIMIT 1 FOR UPDATE"
        ))
        .bind(reservation_id.get())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(ParkingSession::from))
    }

    async fn close_session(
        &mut self,
        session_id: SessionId,
        exit_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE parking_sessions SET exit_time = $1, actual_duration = $2 WHERE session_id = $3",
        )
        .bind(exit_time)
        .bind(duration_minutes)
        .bind(session_id.get())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
