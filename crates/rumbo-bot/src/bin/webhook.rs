//! Rumbo chat webhook entry point.
//!
//! Exit codes: 0 clean shutdown, 1 configuration error, 2 unrecoverable
//! broker error during startup.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]

use std::process::ExitCode;
use std::sync::Arc;

use rumbo_bot::config::WebhookConfig;
use rumbo_bot::signature::SignatureValidator;
use rumbo_bot::webhook::{self, WebhookState};
use rumbo_broker::{Broker, topology};
use rumbo_session::{RateLimiter, SessionStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,rumbo_bot=info,rumbo_broker=info")),
        )
        .init();

    let config = match WebhookConfig::from_env() {
        Ok(config) => config,
        Err(config_error) => {
            error!(%config_error, "configuration error, refusing to start");
            return ExitCode::from(1);
        },
    };

    let store = match SessionStore::connect(&config.redis_url).await {
        Ok(store) => store,
        Err(store_error) => {
            error!(%store_error, "cannot reach the session store");
            return ExitCode::from(1);
        },
    };
    let limiter = RateLimiter::new(
        store.connection(),
        config.rate_limit_requests,
        config.rate_limit_window_seconds,
    );

    let broker = match Broker::connect(&config.broker).await {
        Ok(broker) => Arc::new(broker),
        Err(broker_error) => {
            error!(%broker_error, "unrecoverable broker error during startup");
            return ExitCode::from(2);
        },
    };
    if let Err(declare_error) = broker.declare(&topology::INCOMING_MESSAGES).await {
        error!(%declare_error, "topology declaration failed");
        return ExitCode::from(2);
    }

    let state = WebhookState {
        store,
        limiter,
        broker: Arc::clone(&broker),
        validator: SignatureValidator::new(&config.provider_secret),
        public_url: config.public_url.clone(),
        max_request_bytes: config.max_request_bytes,
    };

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(bind_error) => {
            error!(addr = %config.listen_addr, %bind_error, "cannot bind listen address");
            return ExitCode::from(1);
        },
    };

    info!(addr = %config.listen_addr, "webhook listening");

    let serve = axum::serve(listener, webhook::router(state))
        .with_graceful_shutdown(shutdown_signal());

    if let Err(serve_error) = serve.await {
        error!(%serve_error, "server error");
        return ExitCode::from(1);
    }

    info!("webhook stopped");
    broker.close().await;
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(signal_error) = tokio::signal::ctrl_c().await {
        error!(%signal_error, "failed to install shutdown handler");
    }
}
