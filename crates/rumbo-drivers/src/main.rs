//! Rumbo driver service entry point.
//!
//! Wires the driver store, the location index, the broker consumers
//! (dispatch fan-out, assignment confirmations), the watchdog, and the
//! HTTP/WebSocket surface. Exit codes: 0 clean shutdown, 1 configuration
//! error, 2 unrecoverable broker error during startup.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]

use std::process::ExitCode;
use std::sync::Arc;

use rumbo_broker::{Broker, consumer, topology};
use rumbo_drivers::accept::AcceptanceService;
use rumbo_drivers::api::{self, AppState};
use rumbo_drivers::auth::DriverTokenVerifier;
use rumbo_drivers::config::DriversConfig;
use rumbo_drivers::confirmations::ConfirmationHandler;
use rumbo_drivers::dispatch::DispatchHandler;
use rumbo_drivers::registry::PushRegistry;
use rumbo_drivers::watchdog;
use rumbo_session::{LocationIndex, SessionStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,rumbo_drivers=info,rumbo_broker=info")),
        )
        .init();

    let config = match DriversConfig::from_env() {
        Ok(config) => config,
        Err(config_error) => {
            error!(%config_error, "configuration error, refusing to start");
            return ExitCode::from(1);
        },
    };

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(db_error) => {
            error!(%db_error, "cannot reach the drivers database");
            return ExitCode::from(1);
        },
    };

    let session_store = match SessionStore::connect(&config.redis_url).await {
        Ok(store) => store,
        Err(store_error) => {
            error!(%store_error, "cannot reach the session store");
            return ExitCode::from(1);
        },
    };
    let locations = LocationIndex::new(session_store.connection(), config.locations_key.clone());

    let broker = match Broker::connect(&config.broker).await {
        Ok(broker) => Arc::new(broker),
        Err(broker_error) => {
            error!(%broker_error, "unrecoverable broker error during startup");
            return ExitCode::from(2);
        },
    };

    for spec in [
        topology::MOTOTAXI_DISPATCH,
        topology::ORDER_UPDATES,
        topology::DISPATCH_CONFIRMATIONS,
    ] {
        if let Err(declare_error) = broker.declare(&spec).await {
            error!(queue = spec.queue, %declare_error, "topology declaration failed");
            return ExitCode::from(2);
        }
    }

    let registry = Arc::new(PushRegistry::new());
    let accept = AcceptanceService::new(pool.clone(), Arc::clone(&broker));

    tokio::spawn(consumer::run(
        config.broker.clone(),
        topology::MOTOTAXI_DISPATCH,
        Arc::new(DispatchHandler::new(
            pool.clone(),
            Arc::clone(&registry),
            config.dispatch_cap,
        )),
    ));
    tokio::spawn(consumer::run(
        config.broker.clone(),
        topology::DISPATCH_CONFIRMATIONS,
        Arc::new(ConfirmationHandler::new(pool.clone())),
    ));
    tokio::spawn(watchdog::run(
        pool.clone(),
        config.assignment_grace_secs,
        config.watchdog_interval_secs,
    ));

    let state = AppState {
        pool,
        registry,
        accept,
        verifier: DriverTokenVerifier::new(&config.jwt_secret),
        locations,
    };

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(bind_error) => {
            error!(addr = %config.listen_addr, %bind_error, "cannot bind listen address");
            return ExitCode::from(1);
        },
    };

    info!(addr = %config.listen_addr, "driver service listening");

    let serve = axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal());

    if let Err(serve_error) = serve.await {
        error!(%serve_error, "server error");
        return ExitCode::from(1);
    }

    info!("driver service stopped");
    broker.close().await;
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(signal_error) = tokio::signal::ctrl_c().await {
        error!(%signal_error, "failed to install shutdown handler");
    }
}
