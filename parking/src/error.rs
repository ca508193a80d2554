//! Error taxonomy for the parking service.

use parking_web::AppError;
use thiserror::Error;

/// Result type alias for parking operations.
pub type Result<T> = std::result::Result<T, ParkingError>;

/// Every way a parking operation can fail.
///
/// Client errors carry the message shown to the caller. Server errors carry
/// a description for the logs only; the client sees a generic message.
#[derive(Debug, Error)]
pub enum ParkingError {
    // ============================================================
    // Client errors
    // ============================================================
    /// Missing or malformed request fields.
    #[error("{0}")]
    Validation(String),

    /// No bearer token supplied.
    #[error("Missing token")]
    MissingToken,

    /// Token expired, tampered with, or malformed.
    #[error("Invalid token")]
    InvalidToken,

    /// Unknown email or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Caller's role is not allowed on this endpoint.
    #[error("Forbidden")]
    Forbidden,

    /// Requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation (duplicate registration email).
    #[error("{0}")]
    Conflict(String),

    /// Target space missing or already taken.
    #[error("Space not available")]
    SpaceUnavailable,

    /// Operation not allowed in the reservation's current state.
    #[error("{0}")]
    InvalidState(String),

    // ============================================================
    // Server errors
    // ============================================================
    /// Storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Payment gateway failure.
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// Any other unexpected failure (hashing, QR/PDF rendering, ...).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParkingError {
    /// Shorthand for [`ParkingError::NotFound`].
    #[must_use]
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(format!("{resource} not found"))
    }

    /// Shorthand for [`ParkingError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<sqlx::Error> for ParkingError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let message = match db_err.constraint() {
                    Some(name) if name.contains("email") => "Email already exists",
                    _ => "Duplicate record",
                };
                return Self::Conflict(message.to_string());
            }
        }
        Self::Storage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for ParkingError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Storage(format!("migration failed: {err}"))
    }
}

impl From<ParkingError> for AppError {
    fn from(err: ParkingError) -> Self {
        let message = err.to_string();
        match err {
            ParkingError::Validation(_) => Self::validation(message),
            ParkingError::MissingToken
            | ParkingError::InvalidToken
            | ParkingError::InvalidCredentials => Self::unauthorized(message),
            ParkingError::Forbidden => Self::forbidden(message),
            ParkingError::NotFound(_) => Self::not_found(message),
            ParkingError::Conflict(_) => Self::conflict(message),
            ParkingError::SpaceUnavailable => {
                Self::bad_request(message).with_code("SPACE_UNAVAILABLE")
            }
            ParkingError::InvalidState(_) => Self::invalid_state(message),
            ParkingError::Storage(_) | ParkingError::Gateway(_) | ParkingError::Internal(_) => {
                Self::internal("Server error").with_source(anyhow::Error::new(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn status_of(err: ParkingError) -> (StatusCode, String) {
        let app: AppError = err.into();
        (app.status(), app.code().to_string())
    }

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(status_of(ParkingError::validation("x")).0, StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ParkingError::InvalidToken).0, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ParkingError::MissingToken).0, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ParkingError::Forbidden).0, StatusCode::FORBIDDEN);
        assert_eq!(status_of(ParkingError::not_found("Reservation")).0, StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ParkingError::Conflict("Email already exists".into())).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ParkingError::InvalidState("Invalid status".into())),
            (StatusCode::BAD_REQUEST, "STATE_ERROR".to_string())
        );
        assert_eq!(
            status_of(ParkingError::SpaceUnavailable),
            (StatusCode::BAD_REQUEST, "SPACE_UNAVAILABLE".to_string())
        );
        assert_eq!(
            status_of(ParkingError::Storage("boom".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let app: AppError = ParkingError::Storage("relation \"users\" does not exist".into()).into();
        assert_eq!(app.message(), "Server error");
    }
}
