//! Rumbo orders service entry point.
//!
//! Wires the store, the broker, two consumers and the REST API together.
//! Exit codes: 0 clean shutdown, 1 configuration error, 2 unrecoverable
//! broker error during startup.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]

use std::process::ExitCode;
use std::sync::Arc;

use rumbo_broker::{Broker, consumer, topology};
use rumbo_orders::api::{self, AppState};
use rumbo_orders::auth::JwtVerifier;
use rumbo_orders::config::OrdersConfig;
use rumbo_orders::consumers::{DriverAcceptedHandler, NewOrderHandler};
use rumbo_orders::service::OrderService;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,rumbo_orders=info,rumbo_broker=info")),
        )
        .init();

    let config = match OrdersConfig::from_env() {
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
            error!(%db_error, "cannot reach the orders database");
            return ExitCode::from(1);
        },
    };

    let broker = match Broker::connect(&config.broker).await {
        Ok(broker) => Arc::new(broker),
        Err(broker_error) => {
            error!(%broker_error, "unrecoverable broker error during startup");
            return ExitCode::from(2);
        },
    };

    for spec in [
        topology::NEW_ORDERS,
        topology::MOTOTAXI_DISPATCH,
        topology::ORDER_UPDATES,
        topology::CLIENT_NOTIFICATIONS,
    ] {
        if let Err(declare_error) = broker.declare(&spec).await {
            error!(queue = spec.queue, %declare_error, "topology declaration failed");
            return ExitCode::from(2);
        }
    }

    let service = OrderService::new(pool, Arc::clone(&broker));

    tokio::spawn(consumer::run(
        config.broker.clone(),
        topology::NEW_ORDERS,
        Arc::new(NewOrderHandler::new(service.clone())),
    ));
    tokio::spawn(consumer::run(
        config.broker.clone(),
        topology::ORDER_UPDATES,
        Arc::new(DriverAcceptedHandler::new(service.clone())),
    ));

    let state = AppState {
        service,
        verifier: JwtVerifier::new(&config.jwt_secret),
    };

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(bind_error) => {
            error!(addr = %config.listen_addr, %bind_error, "cannot bind listen address");
            return ExitCode::from(1);
        },
    };

    info!(addr = %config.listen_addr, "orders service listening");

    let serve = axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal());

    if let Err(serve_error) = serve.await {
        error!(%serve_error, "server error");
        return ExitCode::from(1);
    }

    info!("orders service stopped");
    broker.close().await;
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(signal_error) = tokio::signal::ctrl_c().await {
        error!(%signal_error, "failed to install shutdown handler");
    }
}
