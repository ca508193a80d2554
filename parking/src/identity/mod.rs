//! Identity provider: registration, login, token verification, profiles.
//!
//! Passwords are hashed with Argon2id ([`password`]); sessions are signed
//! JWTs ([`token`]). Hashing runs on the blocking pool so it never stalls
//! the async workers.

pub mod password;
pub mod token;

pub use token::{Claims, Identity, TokenIssuer};

use crate::error::{ParkingError, Result};
use crate::store::ParkingStore;
use crate::types::{NewUser, Role, User, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Registration request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Registration {
    /// Display name
    #[serde(default)]
    pub username: String,
    /// Login email
    #[serde(default)]
    pub email: String,
    /// Plain-text password
    #[serde(default)]
    pub password: String,
    /// Optional phone number
    #[serde(default)]
    pub phone: Option<String>,
    /// Requested role (`user` when absent)
    #[serde(default, alias = "role")]
    pub user_type: Option<String>,
}

/// Login request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Credentials {
    /// Login email
    #[serde(default)]
    pub email: String,
    /// Plain-text password
    #[serde(default)]
    pub password: String,
}

/// Issued session: a token plus the identity it encodes.
#[derive(Clone, Debug, Serialize)]
pub struct AuthSession {
    /// Always `true`
    pub success: bool,
    /// Bearer token
    pub token: String,
    /// Token subject
    pub user: Identity,
}

/// Account and session management.
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn ParkingStore>,
    tokens: TokenIssuer,
}

impl IdentityService {
    /// Create a service over `store`, signing with `tokens`.
    #[must_use]
    pub fn new(store: Arc<dyn ParkingStore>, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    /// Create an account and sign the caller in.
    ///
    /// # Errors
    ///
    /// - `ParkingError::Validation` if username, email, or password is empty,
    ///   or the role is unknown
    /// - `ParkingError::Conflict` if the email is already registered
    #[instrument(skip_all, fields(email = %registration.email))]
    pub async fn register(&self, registration: Registration) -> Result<AuthSession> {
        let Registration {
            username,
            email,
            password,
            phone,
            user_type,
        } = registration;

        if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(ParkingError::validation("Missing fields"));
        }
        let role = match user_type.as_deref() {
            None | Some("") => Role::default(),
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|e| ParkingError::validation(e.to_string()))?,
        };

        if self.store.user_by_email(&email).await?.is_some() {
            warn!("Registration rejected: email taken");
            return Err(ParkingError::Conflict("Email already exists".to_string()));
        }

        let password_hash = hash_blocking(password).await?;
        let user = self
            .store
            .insert_user(NewUser {
                username,
                email,
                password_hash,
                phone: phone.filter(|p| !p.is_empty()),
                role,
            })
            .await?;

        info!(user_id = %user.user_id, role = %user.role, "User registered");
        self.session_for(&user)
    }

    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::InvalidCredentials` for an unknown email or a
    /// wrong password, without saying which.
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login(&self, credentials: Credentials) -> Result<AuthSession> {
        let Some(user) = self.store.user_by_email(&credentials.email).await? else {
            warn!("Login rejected");
            return Err(ParkingError::InvalidCredentials);
        };

        let stored = user.password_hash.clone();
        let ok = tokio::task::spawn_blocking(move || {
            password::verify_password(&credentials.password, &stored)
        })
        .await
        .map_err(|e| ParkingError::Internal(format!("password check panicked: {e}")))?;

        if !ok {
            warn!(user_id = %user.user_id, "Login rejected");
            return Err(ParkingError::InvalidCredentials);
        }

        info!(user_id = %user.user_id, "User logged in");
        self.session_for(&user)
    }

    /// Validate a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::InvalidToken` if the token does not verify.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.tokens.verify(token)
    }

    /// Public profile of an account.
    ///
    /// # Errors
    ///
    /// Returns `ParkingError::NotFound` if the account no longer exists.
    pub async fn profile(&self, user_id: UserId) -> Result<User> {
        self.store
            .user_by_id(user_id)
            .await?
            .ok_or_else(|| ParkingError::not_found("User"))
    }

    fn session_for(&self, user: &User) -> Result<AuthSession> {
        let identity = Identity::from(user);
        Ok(AuthSession {
            success: true,
            token: self.tokens.issue(identity.clone())?,
            user: identity,
        })
    }
}

async fn hash_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| ParkingError::Internal(format!("password hashing panicked: {e}")))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryParkingStore;

    fn service() -> IdentityService {
        IdentityService::new(
            Arc::new(MemoryParkingStore::new()),
            TokenIssuer::new("test-secret", 3600),
        )
    }

    fn registration(email: &str) -> Registration {
        Registration {
            username: "meera".into(),
            email: email.into(),
            password: "s3cret".into(),
            ..Registration::default()
        }
    }

    #[tokio::test]
    async fn test_register_then_login_round_trip() {
        let identity = service();
        let registered = identity.register(registration("meera@example.com")).await.unwrap();
        assert_eq!(registered.user.user_type, Role::User);

        let session = identity
            .login(Credentials {
                email: "meera@example.com".into(),
                password: "s3cret".into(),
            })
            .await
            .unwrap();

        let claims = identity.verify(&session.token).unwrap();
        assert_eq!(claims.identity, registered.user);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let identity = service();
        identity.register(registration("dup@example.com")).await.unwrap();

        let err = identity.register(registration("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, ParkingError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected() {
        let err = service()
            .register(Registration {
                email: "x@example.com".into(),
                ..Registration::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ParkingError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_role_is_rejected() {
        let err = service()
            .register(Registration {
                user_type: Some("superuser".into()),
                ..registration("role@example.com")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ParkingError::Validation(_)));
    }

    #[tokio::test]
    async fn test_bad_login_does_not_reveal_which_part_failed() {
        let identity = service();
        identity.register(registration("who@example.com")).await.unwrap();

        let wrong_password = identity
            .login(Credentials {
                email: "who@example.com".into(),
                password: "nope".into(),
            })
            .await
            .unwrap_err();
        let unknown_email = identity
            .login(Credentials {
                email: "nobody@example.com".into(),
                password: "s3cret".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, ParkingError::InvalidCredentials));
        assert!(matches!(unknown_email, ParkingError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_profile_of_registered_user() {
        let identity = service();
        let session = identity
            .register(Registration {
                user_type: Some("admin".into()),
                phone: Some("+91-98450".into()),
                ..registration("admin@example.com")
            })
            .await
            .unwrap();

        let profile = identity.profile(session.user.user_id).await.unwrap();
        assert_eq!(profile.role, Role::Admin);
        assert_eq!(profile.phone.as_deref(), Some("+91-98450"));
    }
}
