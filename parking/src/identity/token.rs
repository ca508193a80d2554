//! Signed session tokens (JWT, HS256).

use crate::error::{ParkingError, Result};
use crate::types::{Role, User, UserId};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Who a token was issued to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account id
    pub user_id: UserId,
    /// Display name
    pub username: String,
    /// Login email
    pub email: String,
    /// Account role
    pub user_type: Role,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            user_type: user.role,
        }
    }
}

/// Token claims: the identity plus issue/expiry times (epoch seconds).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Token subject
    #[serde(flatten)]
    pub identity: Identity,
    /// Issued at
    pub iat: i64,
    /// Expires at
    pub exp: i64,
}

/// Issues and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer for `secret` whose tokens live `ttl_secs` seconds.
    #[must_use]
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl,
        }
    }

    /// Issue a token for `identity`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Internal` if signing fails.
    pub fn issue(&self, identity: Identity) -> Result<String> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::Internal` if signing fails.
    pub fn issue_at(&self, identity: Identity, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            identity,
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.ttl)
                .map_or(i64::MAX, |t| t.timestamp()),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ParkingError::Internal(format!("token signing failed: {e}")))
    }

    /// Decode and validate a token.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::InvalidToken` if the token is expired, tampered
    /// with, signed with another secret, or malformed.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                ParkingError::InvalidToken
            })
    }
}
