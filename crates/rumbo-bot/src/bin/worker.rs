//! Rumbo dialogue worker entry point.
//!
//! Runs the slot-filling dialogue consumer and the client-notification
//! consumer. Exit codes: 0 clean shutdown, 1 configuration error, 2
//! unrecoverable broker error during startup.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]

use std::process::ExitCode;
use std::sync::Arc;

use rumbo_bot::audio::AudioFetcher;
use rumbo_bot::config::WorkerConfig;
use rumbo_bot::extract::HttpExtractor;
use rumbo_bot::notify::NotificationHandler;
use rumbo_bot::outbound::ChatApiClient;
use rumbo_bot::transcribe::HttpTranscriber;
use rumbo_bot::worker::DialogueWorker;
use rumbo_broker::{Broker, consumer, topology};
use rumbo_session::SessionStore;
use tokio::sync::Semaphore;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Bound on concurrent heavy work (transcription + extraction).
const HEAVY_WORK_PERMITS: usize = 2;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,rumbo_bot=info,rumbo_broker=info")),
        )
        .init();

    let config = match WorkerConfig::from_env() {
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

    let broker = match Broker::connect(&config.broker).await {
        Ok(broker) => Arc::new(broker),
        Err(broker_error) => {
            error!(%broker_error, "unrecoverable broker error during startup");
            return ExitCode::from(2);
        },
    };
    for spec in [
        topology::INCOMING_MESSAGES,
        topology::NEW_ORDERS,
        topology::CLIENT_NOTIFICATIONS,
    ] {
        if let Err(declare_error) = broker.declare(&spec).await {
            error!(queue = spec.queue, %declare_error, "topology declaration failed");
            return ExitCode::from(2);
        }
    }

    let permits = Arc::new(Semaphore::new(HEAVY_WORK_PERMITS));
    let extractor = Arc::new(HttpExtractor::new(
        config.extractor_url.clone(),
        config.extractor_api_key.clone(),
        Arc::clone(&permits),
    ));
    let transcriber = Arc::new(HttpTranscriber::new(
        config.stt_url.clone(),
        config.stt_api_key.clone(),
        Arc::clone(&permits),
    ));
    let sender = Arc::new(ChatApiClient::new(
        config.chat_api_base.clone(),
        config.chat_account_sid.clone(),
        config.chat_auth_token.clone(),
        config.chat_from_number.clone(),
    ));
    let audio = AudioFetcher::new(
        config.max_audio_bytes(),
        config.chat_account_sid.clone(),
        config.chat_auth_token.clone(),
    );

    let dialogue = DialogueWorker::new(
        store,
        Arc::clone(&broker),
        extractor,
        transcriber,
        Arc::clone(&sender) as Arc<dyn rumbo_bot::outbound::ChatSender>,
        audio,
    );

    tokio::spawn(consumer::run(
        config.broker.clone(),
        topology::INCOMING_MESSAGES,
        Arc::new(dialogue),
    ));
    tokio::spawn(consumer::run(
        config.broker.clone(),
        topology::CLIENT_NOTIFICATIONS,
        Arc::new(NotificationHandler::new(
            sender as Arc<dyn rumbo_bot::outbound::ChatSender>,
        )),
    ));

    info!("worker consuming");

    if let Err(signal_error) = tokio::signal::ctrl_c().await {
        error!(%signal_error, "failed to install shutdown handler");
        return ExitCode::from(1);
    }

    info!("worker stopped");
    broker.close().await;
    ExitCode::SUCCESS
}
