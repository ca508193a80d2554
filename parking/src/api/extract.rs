//! Request extractors shared by the API handlers.

use crate::error::ParkingError;
use crate::identity::{Claims, IdentityService};
use crate::policy::{self, Endpoint};
use crate::types::{Role, UserId};
use axum::{
    Json, async_trait,
    extract::{FromRef, FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use parking_web::{AppError, BearerToken};
use serde::de::DeserializeOwned;

/// The authenticated caller, decoded from the bearer token.
///
/// Extraction only authenticates. Each handler authorizes explicitly with
/// [`AuthUser::require`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// Caller's account id.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.0.identity.user_id
    }

    /// Caller's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.0.identity.user_type
    }

    /// Fail with 403 unless the caller's role may call `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns a forbidden [`AppError`] when the policy denies access.
    pub fn require(&self, endpoint: Endpoint) -> Result<(), AppError> {
        if policy::allowed(self.role(), endpoint) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.user_id(),
                role = %self.role(),
                ?endpoint,
                "Access denied"
            );
            Err(ParkingError::Forbidden.into())
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    IdentityService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state)
            .await
            .map_err(|_| ParkingError::MissingToken)?;
        let claims = IdentityService::from_ref(state).verify(&token)?;
        Ok(Self(claims))
    }
}

/// JSON body whose rejections are reported as validation errors.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|rejection| AppError::validation(rejection.body_text()))
    }
}

/// Path segments whose rejections are reported as validation errors.
#[derive(Debug, Clone)]
pub struct PathParam<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| Self(value))
            .map_err(|rejection| AppError::validation(rejection.body_text()))
    }
}

/// Query string whose rejections are reported as validation errors.
#[derive(Debug, Clone)]
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| AppError::validation(rejection.body_text()))
    }
}
