//! Smart parking API server.
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/parking cargo run --bin parking-server
//! ```

use anyhow::Context;
use parking::identity::TokenIssuer;
use parking::store::{ParkingStore, PgParkingStore};
use parking::types::LiveEvent;
use parking::{AppState, Config, build_router, metrics, payment_gateway, server};
use parking_web::Broadcaster;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parking=info,parking_web=info,tower_http=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set; using the development secret");
    }

    let store = PgParkingStore::connect(&config.database)
        .await
        .context("connecting to PostgreSQL")?;
    store.migrate().await.context("applying migrations")?;
    tracing::info!("Database ready");

    metrics::register_business_metrics();

    let gateway = payment_gateway::from_config(&config.payment)
        .context("building payment gateway")?;
    let store: Arc<dyn ParkingStore> = Arc::new(store);
    let state = AppState::new(
        store,
        TokenIssuer::new(&config.auth.jwt_secret, config.auth.token_ttl),
        gateway,
        &config.payment.currency,
        Broadcaster::<LiveEvent>::new(config.notifications.channel_capacity),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "Smart Parking API listening");

    let draining = Arc::new(Notify::new());
    let signal = {
        let draining = Arc::clone(&draining);
        async move {
            server::shutdown_signal().await;
            draining.notify_one();
        }
    };
    let serve = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(signal)
        .into_future();
    let deadline = Duration::from_secs(config.server.shutdown_timeout);

    tokio::select! {
        result = serve => result.context("serving HTTP")?,
        () = async {
            draining.notified().await;
            tokio::time::sleep(deadline).await;
        } => tracing::warn!(?deadline, "Shutdown deadline passed; dropping open connections"),
    }

    tracing::info!("Server stopped");
    Ok(())
}
