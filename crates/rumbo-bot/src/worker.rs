//! The dialogue worker: one queued chat message in, one dialogue turn out.
//!
//! Turn shape, in order: take the per-sender processing lock (or tell the
//! sender to wait), maybe welcome them back, resolve the text (body, or
//! download-and-transcribe for voice notes), extract fields, merge into
//! the session, then either prompt for what's missing or publish the
//! completed order. The lock is released on every path out.

use std::sync::Arc;

use async_trait::async_trait;
use rumbo_broker::{Broker, HandlerError, MessageHandler, topology};
use rumbo_core::IncomingMessage;
use rumbo_session::{SessionStore, UserSession};
use tracing::{error, info, warn};

use crate::audio::{AudioError, AudioFetcher};
use crate::dialogue::{self, NextStep};
use crate::extract::Extractor;
use crate::messages;
use crate::outbound::ChatSender;
use crate::transcribe::Transcriber;

/// Consumes `incoming_messages` and runs the slot-filling dialogue.
pub struct DialogueWorker {
    store: SessionStore,
    broker: Arc<Broker>,
    extractor: Arc<dyn Extractor>,
    transcriber: Arc<dyn Transcriber>,
    sender: Arc<dyn ChatSender>,
    audio: AudioFetcher,
}

impl DialogueWorker {
    /// Wire the worker's collaborators together.
    #[must_use]
    pub fn new(
        store: SessionStore,
        broker: Arc<Broker>,
        extractor: Arc<dyn Extractor>,
        transcriber: Arc<dyn Transcriber>,
        sender: Arc<dyn ChatSender>,
        audio: AudioFetcher,
    ) -> Self {
        Self {
            store,
            broker,
            extractor,
            transcriber,
            sender,
            audio,
        }
    }

    /// One dialogue turn, with the processing lock held.
    async fn run_turn(&self, message: &IncomingMessage) -> Result<(), HandlerError> {
        let sender = message.sender_number.as_str();
        let name = dialogue::display_name(message.profile_name.as_deref());

        let mut session = self
            .store
            .get_session(sender)
            .await
            .map_err(|store_error| HandlerError::Failed(store_error.to_string()))?;

        let welcome_due = session.should_send_welcome(chrono::Utc::now());
        if welcome_due {
            self.sender.send(sender, &messages::welcome(&name)).await;
        }

        let Some(text) = self.resolve_text(message, sender, &name, welcome_due).await else {
            return Ok(());
        };

        let extracted = match self.extractor.extract(&text).await {
            Ok(extracted) => extracted,
            Err(extract_error) => {
                error!(%extract_error, "field extraction failed");
                self.sender
                    .send(sender, &messages::extraction_error(&name))
                    .await;
                return Ok(());
            },
        };
        dialogue::merge_extracted(&mut session, &extracted);

        match dialogue::next_step(&session, &name) {
            NextStep::Ask(prompt) => {
                self.sender.send(sender, &prompt).await;
                session.awaiting_more_info = true;
                self.save(sender, &mut session).await;
            },
            NextStep::Complete => {
                let payload =
                    dialogue::build_order_payload(&session, sender, message.profile_name.as_deref());

                match self.broker.publish_json(&topology::NEW_ORDERS, &payload).await {
                    Ok(()) => {
                        info!(
                            tipo_servicio = %payload.tipo_servicio,
                            "order published"
                        );
                        self.sender
                            .send(sender, &messages::order_confirmed(payload.tipo_servicio))
                            .await;
                        session.clear_order();
                    },
                    Err(publish_error) => {
                        // Keep the session: the sender can retry the turn.
                        error!(%publish_error, "failed to publish order");
                        self.sender.send(sender, messages::ORDER_FAILED).await;
                    },
                }
                self.save(sender, &mut session).await;
            },
        }

        Ok(())
    }

    /// Text to analyze for this message: the body, a transcription, or
    /// nothing (after an appropriate reply).
    async fn resolve_text(
        &self,
        message: &IncomingMessage,
        sender: &str,
        name: &str,
        welcome_sent: bool,
    ) -> Option<String> {
        if message.num_media > 0
            && let Some(media_url) = &message.media_url
        {
            let content_type = message.media_content_type.as_deref().unwrap_or("");
            if !content_type.starts_with("audio/") {
                self.sender
                    .send(sender, &messages::unsupported_media(name))
                    .await;
                return None;
            }

            let audio_file = match self.audio.download(media_url, content_type).await {
                Ok(file) => file,
                Err(audio_error @ (AudioError::SizeLimitExceeded { .. }
                | AudioError::InvalidMimeType(_))) => {
                    warn!(%audio_error, "audio rejected");
                    self.sender.send(sender, &messages::audio_error(name)).await;
                    return None;
                },
                Err(audio_error) => {
                    error!(%audio_error, "audio download failed");
                    self.sender.send(sender, &messages::audio_error(name)).await;
                    return None;
                },
            };

            return match self.transcriber.transcribe(audio_file.path()).await {
                Ok(Some(text)) => Some(text),
                Ok(None) => {
                    self.sender
                        .send(sender, &messages::audio_not_understood(name))
                        .await;
                    None
                },
                Err(transcribe_error) => {
                    error!(%transcribe_error, "transcription failed");
                    self.sender.send(sender, &messages::audio_error(name)).await;
                    None
                },
            };
        }

        if let Some(body) = &message.message_body {
            return Some(body.clone());
        }

        // Nothing usable; if they were not just welcomed, say so.
        if !welcome_sent {
            self.sender
                .send(sender, &messages::message_not_understood(name))
                .await;
        }
        None
    }

    async fn save(&self, sender: &str, session: &mut UserSession) {
        if let Err(save_error) = self.store.save_session(sender, session).await {
            error!(%save_error, "failed to save session");
        }
    }
}

#[async_trait]
impl MessageHandler for DialogueWorker {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        let message: IncomingMessage = serde_json::from_slice(payload)
            .map_err(|parse_error| HandlerError::Malformed(parse_error.to_string()))?;
        let sender = message.sender_number.clone();

        if sender.trim().is_empty() {
            return Err(HandlerError::Malformed("empty sender".to_string()));
        }

        // The serialization point: one dialogue turn per sender at a time.
        if !self.store.try_acquire_processing(&sender).await {
            self.sender.send(&sender, messages::PROCESSING_MESSAGE).await;
            return Ok(());
        }

        let outcome = self.run_turn(&message).await;
        self.store.release_processing(&sender).await;
        outcome
    }
}

impl std::fmt::Debug for DialogueWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogueWorker").finish_non_exhaustive()
    }
}
