//! Axum HTTP shell for the smart parking service.
//!
//! This crate holds the transport-level pieces that every handler in the
//! service shares, keeping them apart from the parking domain:
//!
//! - [`AppError`]: the single error type handlers return, rendered as a JSON
//!   body with a stable machine-readable `code`
//! - [`extractors`]: correlation ids, client IP, and bearer tokens
//! - [`middleware`]: correlation-id propagation and request spans
//! - [`broadcast`]: the best-effort publish/subscribe hub behind the
//!   real-time channel
//! - [`handlers`]: liveness/readiness probes and the WebSocket fan-out
//!
//! # Request Flow
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌──────────────────┐
//! │ HTTP request │──>│ correlation layer │──>│ handler          │
//! └──────────────┘   │ (span + header)   │   │  extract → call  │
//!                    └───────────────────┘   │  domain → map    │
//!                                            │  Result<_, AppError>
//!                                            └──────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod broadcast;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use broadcast::Broadcaster;
pub use error::AppError;
pub use extractors::{BearerToken, ClientIp, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
