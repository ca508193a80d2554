//! Shared HTTP handlers.

pub mod health;
pub mod websocket;

pub use health::{HealthReport, health_check, readiness};
