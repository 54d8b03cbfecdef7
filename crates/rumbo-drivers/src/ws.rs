//! The driver push channel: a duplex WebSocket.
//!
//! Downstream: dispatch events and the connection ack. Upstream: location
//! updates into the geospatial index. Authentication happens before the
//! upgrade, from the bearer token in the query string.
//!
//! The socket sink is owned by a writer task fed from the registry's
//! channel; the upgraded task itself only reads. Malformed inbound frames
//! get a per-frame error reply and the loop continues.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use rumbo_core::{DriverId, DriverPushMessage, LocationData};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct WsParams {
    token: Option<String>,
}

/// `GET /ws/drivers/location?token=…`
pub(crate) async fn location_ws(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.token else {
        warn!("websocket rejected: no token provided");
        return (StatusCode::UNAUTHORIZED, "token required").into_response();
    };

    let Ok(driver_id) = state.verifier.verify(&token) else {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    };

    ws.on_upgrade(move |socket| drive_channel(state, driver_id, socket))
}

async fn drive_channel(state: AppState, driver_id: DriverId, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<DriverPushMessage>();
    let token = state.registry.register(driver_id, tx.clone());

    let _ = tx.send(DriverPushMessage::ConnectionAck {
        message: "Conectado al servidor de ubicación.".to_string(),
    });

    // Writer: the only place this socket is ever written.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                },
                Err(encode_error) => {
                    warn!(%encode_error, "failed to encode push frame");
                },
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_location_frame(&state, driver_id, text.as_str(), &tx).await;
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}, // pings/pongs/binary: ignored
        }
    }

    state.registry.unregister(driver_id, token);
    writer.abort();
}

async fn handle_location_frame(
    state: &AppState,
    driver_id: DriverId,
    raw: &str,
    tx: &mpsc::UnboundedSender<DriverPushMessage>,
) {
    let location: LocationData = match serde_json::from_str(raw) {
        Ok(location) => location,
        Err(parse_error) => {
            debug!(driver_id = %driver_id, %parse_error, "invalid location frame");
            let _ = tx.send(DriverPushMessage::Error {
                message: format!("Datos de ubicación inválidos: {parse_error}"),
            });
            return;
        },
    };

    if let Err(store_error) = state.locations.update(driver_id, &location).await {
        warn!(driver_id = %driver_id, %store_error, "failed to store driver location");
    } else {
        debug!(driver_id = %driver_id, "location processed");
    }
}
