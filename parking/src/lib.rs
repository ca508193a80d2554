//! Smart parking reservation backend.
//!
//! Drivers find lots, book a specific space for a time window, and receive
//! a QR artifact; gate operators validate entry and exit against it. Owners
//! manage lots and spaces and see revenue. Availability changes are pushed
//! to connected clients over a WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────────────┐   ┌──────────────┐
//! │ api::*    │──>│ services                     │──>│ ParkingStore │
//! │ handlers  │   │  IdentityService             │   │  Postgres    │
//! │ (axum)    │   │  ReservationOrchestrator ─┐  │   │  Memory      │
//! └───────────┘   │  SessionLifecycle ────────┤  │   └──────────────┘
//!                 │  PaymentService           │  │
//!                 └───────────────────────────┼──┘
//!                                             │ after commit
//!                                             ▼
//!                                   Broadcaster<LiveEvent> ──> /ws
//! ```
//!
//! Multi-step mutations (booking, exit) run in one [`store::UnitOfWork`]
//! that locks the rows it changes. Events are queued as
//! [`notify::PostCommitHooks`] and published only once the unit commits.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod notify;
pub mod payment_gateway;
pub mod payments;
pub mod policy;
pub mod pricing;
pub mod qr;
pub mod receipt;
pub mod reservation;
pub mod server;
pub mod session;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{ParkingError, Result};
pub use server::{AppState, build_router};
