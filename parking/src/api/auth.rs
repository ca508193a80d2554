//! Account endpoints.
//!
//! - `POST /api/auth/register`
//! - `POST /api/auth/login`
//! - `GET /api/auth/profile`

use super::{AuthUser, JsonBody};
use crate::identity::{AuthSession, Credentials, Registration};
use crate::policy::Endpoint;
use crate::server::state::AppState;
use crate::types::User;
use axum::{Json, extract::State};
use parking_web::{ClientIp, WebResult};
use tracing::{Instrument, info_span};

/// Create an account and return a session.
///
/// # Errors
///
/// 400 on missing fields or unknown role, 409 on a taken email.
pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    JsonBody(registration): JsonBody<Registration>,
) -> WebResult<Json<AuthSession>> {
    let session = state
        .identity
        .register(registration)
        .instrument(info_span!("register", client_ip = %ip))
        .await?;
    Ok(Json(session))
}

/// Exchange credentials for a session.
///
/// # Errors
///
/// 401 on an unknown email or wrong password.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    JsonBody(credentials): JsonBody<Credentials>,
) -> WebResult<Json<AuthSession>> {
    let session = state
        .identity
        .login(credentials)
        .instrument(info_span!("login", client_ip = %ip))
        .await?;
    Ok(Json(session))
}

/// The caller's own profile.
///
/// # Errors
///
/// 401 without a valid token, 404 if the account is gone.
pub async fn profile(State(state): State<AppState>, user: AuthUser) -> WebResult<Json<User>> {
    user.require(Endpoint::Profile)?;
    Ok(Json(state.identity.profile(user.user_id()).await?))
}
