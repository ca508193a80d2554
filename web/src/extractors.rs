//! Custom Axum extractors.
//!
//! - `CorrelationId`: the request's correlation id (set by the middleware,
//!   read from `X-Correlation-ID`, or freshly generated)
//! - `ClientIp`: client IP address from proxy headers
//! - `BearerToken`: raw token from `Authorization: Bearer <token>`
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     correlation_id: CorrelationId,
//!     BearerToken(token): BearerToken,
//! ) -> Result<Json<Response>, AppError> {
//!     tracing::info!(correlation_id = %correlation_id.0, "Processing request");
//!     Ok(Json(response))
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use std::net::{IpAddr, Ipv4Addr};
use uuid::Uuid;

/// Correlation ID for request tracing.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<CorrelationId>() {
            return Ok(*id);
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Client IP address.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first IP in the list)
/// 2. `X-Real-IP`
/// 3. Loopback
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(extract_client_ip(&parts.headers)))
    }
}

fn extract_client_ip(headers: &HeaderMap) -> IpAddr {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    if let Some(ip) = forwarded {
        return ip;
    }

    headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Bearer token extracted from `Authorization: Bearer <token>` header.
///
/// Rejects with 401 when the header is missing, not a bearer credential,
/// or empty. The token itself is not validated here.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing token"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                AppError::unauthorized("Invalid authorization format. Expected 'Bearer <token>'")
            })?
            .trim();

        if token.is_empty() {
            return Err(AppError::unauthorized("Missing token"));
        }

        Ok(Self(token.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts_with(header: Option<(&str, &str)>) -> Parts {
        let mut builder = Request::builder();
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let mut parts = parts_with(Some((CORRELATION_ID_HEADER, &uuid.to_string())));

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_prefers_extension() {
        let uuid = Uuid::new_v4();
        let mut parts = parts_with(Some((CORRELATION_ID_HEADER, &Uuid::new_v4().to_string())));
        parts.extensions.insert(CorrelationId(uuid));

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_client_ip_from_x_forwarded_for() {
        let mut parts = parts_with(Some(("X-Forwarded-For", "203.0.113.1, 198.51.100.1")));
        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(client_ip.0.to_string(), "203.0.113.1");
    }

    #[tokio::test]
    async fn test_client_ip_fallback() {
        let mut parts = parts_with(None);
        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(client_ip.0.to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_bearer_token_extracted() {
        let mut parts = parts_with(Some(("authorization", "Bearer abc.def.ghi")));
        let token = BearerToken::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(token.0, "abc.def.ghi");
    }

    #[tokio::test]
    async fn test_bearer_token_missing() {
        let mut parts = parts_with(None);
        let err = BearerToken::from_request_parts(&mut parts, &())
            .await
            .expect_err("Should reject");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bearer_token_wrong_scheme() {
        let mut parts = parts_with(Some(("authorization", "Basic dXNlcjpwYXNz")));
        let err = BearerToken::from_request_parts(&mut parts, &())
            .await
            .expect_err("Should reject");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
