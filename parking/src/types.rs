//! Domain types for the smart parking service.
//!
//! Identifiers, value objects (roles, money, statuses), the persisted
//! entities, and the real-time event sent to connected viewers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Get the raw database key.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique identifier for a user account
    UserId
);
id_type!(
    /// Unique identifier for a parking lot
    LotId
);
id_type!(
    /// Unique identifier for a parking space
    SpaceId
);
id_type!(
    /// Unique identifier for a reservation
    ReservationId
);
id_type!(
    /// Unique identifier for a parking session (one entry/exit)
    SessionId
);
id_type!(
    /// Unique identifier for a recorded payment
    PaymentId
);

// ============================================================================
// Roles
// ============================================================================

/// Account role. Fixed at registration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular driver
    #[default]
    User,
    /// Lot owner/operator
    Owner,
    /// Platform administrator
    Admin,
}

impl Role {
    /// Wire/storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Owner => "owner",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role or status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Money Value Object (minor units to avoid floating point errors)
// ============================================================================

/// Amount of money in minor currency units (paise/cents).
///
/// Serialized in JSON as a decimal number of major units (`150.5`), stored
/// as an integer number of minor units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Creates a `Money` value from whole major units.
    #[must_use]
    pub const fn from_major(major: i64) -> Self {
        Self(major.saturating_mul(100))
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Multiplies by a whole count, saturating on overflow.
    #[must_use]
    pub const fn times(self, count: i64) -> Self {
        Self(self.0.saturating_mul(count))
    }

    /// Amount in major units as a float, for display and JSON.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parse a major-unit decimal, rounding to the nearest minor unit.
    ///
    /// Returns `None` for negative or non-finite input.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn try_from_major(major: f64) -> Option<Self> {
        if !major.is_finite() || major < 0.0 || major > 9.0e15 {
            return None;
        }
        Some(Self((major * 100.0).round() as i64))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_major())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let major = f64::deserialize(deserializer)?;
        Self::try_from_major(major)
            .ok_or_else(|| serde::de::Error::custom("amount must be a non-negative number"))
    }
}

// ============================================================================
// Users
// ============================================================================

/// A registered account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    /// Account id
    pub user_id: UserId,
    /// Display name
    pub username: String,
    /// Login email (unique)
    pub email: String,
    /// Argon2 PHC string; never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Optional phone number
    pub phone: Option<String>,
    /// Account role
    #[serde(rename = "user_type")]
    pub role: Role,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

/// Data needed to create an account.
#[derive(Clone, Debug)]
pub struct NewUser {
    /// Display name
    pub username: String,
    /// Login email
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    /// Optional phone number
    pub phone: Option<String>,
    /// Account role
    pub role: Role,
}

// ============================================================================
// Lots and spaces
// ============================================================================

/// A physical parking facility.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParkingLot {
    /// Lot id
    pub lot_id: LotId,
    /// Display name
    pub lot_name: String,
    /// Street address
    pub address: Option<String>,
    /// City (used by the list filter)
    pub city: Option<String>,
    /// State/region
    pub state: Option<String>,
    /// Latitude
    pub latitude: Option<f64>,
    /// Longitude
    pub longitude: Option<f64>,
    /// Advertised capacity
    pub total_spaces: i32,
    /// Price per billable hour
    pub hourly_rate: Money,
    /// Owning account
    pub owner_id: Option<UserId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Writable lot fields, used for both create and full update.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LotDraft {
    /// Display name
    pub lot_name: String,
    /// Street address
    #[serde(default)]
    pub address: Option<String>,
    /// City
    #[serde(default)]
    pub city: Option<String>,
    /// State/region
    #[serde(default)]
    pub state: Option<String>,
    /// Latitude
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Advertised capacity (defaults to 0)
    #[serde(default)]
    pub total_spaces: i32,
    /// Price per billable hour (defaults to 0)
    #[serde(default)]
    pub hourly_rate: Money,
}

/// Space type assigned when none is given.
pub const DEFAULT_SPACE_TYPE: &str = "regular";

/// Space status assigned on creation.
pub const ACTIVE_SPACE_STATUS: &str = "active";

/// One bookable slot within a lot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParkingSpace {
    /// Space id
    pub space_id: SpaceId,
    /// Owning lot
    pub lot_id: LotId,
    /// Label painted on the ground
    pub space_number: String,
    /// `regular`, `compact`, `ev`, ...
    pub space_type: String,
    /// Optional floor label
    pub floor_level: Option<String>,
    /// Free to reserve
    pub is_available: bool,
    /// Operational status (`active`)
    pub status: String,
}

/// A space definition submitted by an operator.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SpaceDraft {
    /// Label painted on the ground
    pub space_number: String,
    /// Space type (defaults to `regular`)
    #[serde(default)]
    pub space_type: Option<String>,
    /// Optional floor label
    #[serde(default)]
    pub floor_level: Option<String>,
}

// ============================================================================
// Reservations
// ============================================================================

/// Reservation lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Booked and holding its space
    Confirmed,
    /// Vehicle exited; space released
    Completed,
}

impl ReservationStatus {
    /// Wire/storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            other => Err(UnknownVariant {
                kind: "reservation status",
                value: other.to_string(),
            }),
        }
    }
}

/// A booking of one space for `[start_time, end_time)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reservation {
    /// Reservation id
    pub reservation_id: ReservationId,
    /// Booking account
    pub user_id: UserId,
    /// Lot of the booked space
    pub lot_id: LotId,
    /// Booked space
    pub space_id: SpaceId,
    /// Interval start (inclusive)
    pub start_time: DateTime<Utc>,
    /// Interval end (exclusive)
    pub end_time: DateTime<Utc>,
    /// Price fixed at booking time
    pub total_amount: Money,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// QR image as a data URI
    pub qr_code: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Row data for a reservation about to be inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReservation {
    /// Booking account
    pub user_id: UserId,
    /// Lot of the booked space
    pub lot_id: LotId,
    /// Booked space
    pub space_id: SpaceId,
    /// Interval start
    pub start_time: DateTime<Utc>,
    /// Interval end
    pub end_time: DateTime<Utc>,
    /// Computed price
    pub total_amount: Money,
    /// Initial status
    pub status: ReservationStatus,
}

// ============================================================================
// Sessions
// ============================================================================

/// One physical occupancy: entry and (eventually) exit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParkingSession {
    /// Session id (monotonic; newest session has the largest id)
    pub session_id: SessionId,
    /// Reservation being used
    pub reservation_id: ReservationId,
    /// Gate entry time
    pub entry_time: DateTime<Utc>,
    /// Gate exit time
    pub exit_time: Option<DateTime<Utc>>,
    /// Whole minutes between entry and exit
    pub actual_duration: Option<i64>,
}

// ============================================================================
// Payments and reporting
// ============================================================================

/// A recorded payment against a reservation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Payment {
    /// Payment id
    pub payment_id: PaymentId,
    /// Paid reservation
    pub reservation_id: ReservationId,
    /// Paying account
    pub user_id: UserId,
    /// Amount copied from the reservation
    pub amount: Money,
    /// Payment method label (`card`)
    pub payment_method: String,
    /// Gateway or client-supplied reference
    pub transaction_id: String,
    /// `paid`
    pub payment_status: String,
    /// Record time
    pub created_at: DateTime<Utc>,
}

/// Row data for a payment about to be inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPayment {
    /// Paid reservation
    pub reservation_id: ReservationId,
    /// Paying account
    pub user_id: UserId,
    /// Amount copied from the reservation
    pub amount: Money,
    /// Payment method label
    pub payment_method: String,
    /// Transaction reference
    pub transaction_id: String,
    /// Payment status
    pub payment_status: String,
}

/// Revenue aggregated per lot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LotRevenue {
    /// Lot id
    pub lot_id: LotId,
    /// Lot display name
    pub lot_name: String,
    /// Number of paid payments
    pub payments: i64,
    /// Sum of paid amounts
    pub revenue: Money,
}

/// Row counts across the main tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Registered accounts
    pub users: i64,
    /// Lots
    pub lots: i64,
    /// Spaces
    pub spaces: i64,
    /// Reservations (all statuses)
    pub reservations: i64,
}

/// Everything printed on a receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptDetails {
    /// The reservation
    pub reservation: Reservation,
    /// Booking user's name
    pub username: String,
    /// Booking user's email
    pub email: String,
    /// Lot name
    pub lot_name: String,
    /// Lot address
    pub address: Option<String>,
}

// ============================================================================
// Real-time events
// ============================================================================

/// Availability change for one space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceUpdate {
    /// Lot of the space
    pub lot_id: LotId,
    /// Space whose flag changed
    pub space_id: SpaceId,
    /// New availability flag
    pub is_available: bool,
}

/// Message pushed to real-time subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A space became free or taken
    SpaceUpdate(SpaceUpdate),
}
