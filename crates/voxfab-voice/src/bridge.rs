//! The voice bridge — one bidirectional model stream per agent session.
//!
//! ```text
//!   agent runtime ── send_audio_chunk/send_text/… ──▶ uplink task ──▶ model
//!   agent runtime ◀── BridgeEvent channel ◀── downlink task ◀── model
//! ```
//!
//! One task per direction, both owned by the bridge and cancelled together.
//! The downlink task is the only producer on the event channel, which gives
//! the ordering guarantee for free: events reach the runtime in model
//! emission order, and a PCM frame is never interleaved with another
//! frame's bytes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use voxfab_core::UsageCounters;
use voxfab_core::contracts::pcm;

use crate::backend::{ModelBackend, ModelClientEvent, ModelSink, ModelStream};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::events::BridgeEvent;

/// Bidirectional audio/event conduit to the voice model.
///
/// Lifecycle: `set_config` → `start` → (stream operations) → `stop`.
/// `stop` is idempotent and also runs on drop.
pub struct VoiceBridge {
    backend: Arc<dyn ModelBackend>,
    session_id: String,
    config: Option<BridgeConfig>,
    started: bool,

    /// Uplink inbox; present while started.
    to_model: Option<mpsc::Sender<ModelClientEvent>>,

    /// Cancels both pump tasks.
    cancel: CancellationToken,

    /// Set once the downlink observes a fatal condition or clean close.
    stream_gone: Arc<AtomicBool>,

    /// Usage accumulated from the model's usage events.
    usage: Arc<Mutex<UsageCounters>>,
}

impl VoiceBridge {
    /// Create an unconfigured bridge for one session.
    #[must_use]
    pub fn new(backend: Arc<dyn ModelBackend>, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
            config: None,
            started: false,
            to_model: None,
            cancel: CancellationToken::new(),
            stream_gone: Arc::new(AtomicBool::new(false)),
            usage: Arc::new(Mutex::new(UsageCounters::default())),
        }
    }

    /// Apply session configuration. Must precede `start`; the model does
    /// not reread the system prompt once the stream is open.
    pub fn set_config(&mut self, config: BridgeConfig) -> Result<(), BridgeError> {
        if self.started {
            return Err(BridgeError::AlreadyStarted);
        }
        self.config = Some(config);
        Ok(())
    }

    /// Open the model stream and start both pump tasks.
    ///
    /// Returns the ordered downstream event channel.
    pub async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<BridgeEvent>, BridgeError> {
        if self.started {
            return Err(BridgeError::AlreadyStarted);
        }
        let config = self.config.as_ref().ok_or(BridgeError::NotConfigured)?;

        let (sink, stream) = self.backend.open(&self.session_id, config).await?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (to_model, from_runtime) = mpsc::channel(64);

        self.spawn_uplink(sink, from_runtime);
        self.spawn_downlink(stream, event_tx);

        self.to_model = Some(to_model);
        self.started = true;
        debug!(session_id = %self.session_id, "Voice bridge started");
        Ok(event_rx)
    }

    fn spawn_uplink(
        &self,
        mut sink: Box<dyn ModelSink>,
        mut from_runtime: mpsc::Receiver<ModelClientEvent>,
    ) {
        let cancel = self.cancel.clone();
        let stream_gone = Arc::clone(&self.stream_gone);
        let session_id = self.session_id.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = from_runtime.recv() => {
                        let Some(event) = event else { break };
                        if let Err(e) = sink.send(event).await {
                            warn!(session_id = %session_id, error = %e, "Uplink send failed");
                            stream_gone.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                    () = cancel.cancelled() => break,
                }
            }
            if let Err(e) = sink.close().await {
                debug!(session_id = %session_id, error = %e, "Model sink close");
            }
        });
    }

    fn spawn_downlink(
        &self,
        mut stream: Box<dyn ModelStream>,
        event_tx: mpsc::UnboundedSender<BridgeEvent>,
    ) {
        let cancel = self.cancel.clone();
        let stream_gone = Arc::clone(&self.stream_gone);
        let usage = Arc::clone(&self.usage);
        let session_id = self.session_id.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    event = stream.next() => event,
                    () = cancel.cancelled() => break,
                };
                match event {
                    Some(Ok(event)) => {
                        let event = match event {
                            // Consumer-side half of the even-length defence.
                            BridgeEvent::Audio(bytes) => BridgeEvent::Audio(pcm::pad_even(bytes)),
                            BridgeEvent::Usage {
                                input_tokens,
                                output_tokens,
                                total_tokens,
                            } => {
                                usage.lock().await.add(input_tokens, output_tokens, total_tokens);
                                BridgeEvent::Usage {
                                    input_tokens,
                                    output_tokens,
                                    total_tokens,
                                }
                            }
                            other => other,
                        };
                        if event_tx.send(event).is_err() {
                            // Runtime dropped its receiver — session is over.
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, error = %e, "Model stream error");
                        let fatal = e.is_fatal();
                        if fatal {
                            stream_gone.store(true, Ordering::SeqCst);
                        }
                        let _ = event_tx.send(BridgeEvent::Error {
                            message: e.to_string(),
                            fatal,
                        });
                        if fatal {
                            break;
                        }
                    }
                    None => {
                        debug!(session_id = %session_id, "Model stream finished");
                        stream_gone.store(true, Ordering::SeqCst);
                        let _ = event_tx.send(BridgeEvent::Error {
                            message: BridgeError::StreamClosed.to_string(),
                            fatal: true,
                        });
                        break;
                    }
                }
            }
        });
    }

    /// Push a PCM16 chunk upstream. Odd-length chunks are padded here as
    /// defence-in-depth — the ingress should already have done it.
    pub async fn send_audio_chunk(&self, pcm_bytes: Vec<u8>) -> Result<(), BridgeError> {
        self.send(ModelClientEvent::AudioChunk(pcm::pad_even(pcm_bytes)))
            .await
    }

    /// Inject a user-role text turn.
    ///
    /// Zero-length input is ignored: there is no empty user turn.
    pub async fn send_text(&self, text: &str) -> Result<(), BridgeError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        self.send(ModelClientEvent::Text {
            content: text.to_string(),
        })
        .await
    }

    /// Return a tool invocation result to the model.
    pub async fn send_tool_result(
        &self,
        tool_use_id: &str,
        result: Value,
        is_error: bool,
    ) -> Result<(), BridgeError> {
        self.send(ModelClientEvent::ToolResult {
            tool_use_id: tool_use_id.to_string(),
            content: result,
            is_error,
        })
        .await
    }

    /// Mark end-of-user-utterance.
    pub async fn end_audio_input(&self) -> Result<(), BridgeError> {
        self.send(ModelClientEvent::EndAudio).await
    }

    async fn send(&self, event: ModelClientEvent) -> Result<(), BridgeError> {
        if self.stream_gone.load(Ordering::SeqCst) {
            return Err(BridgeError::StreamClosed);
        }
        let to_model = self.to_model.as_ref().ok_or(BridgeError::NotStarted)?;
        to_model
            .send(event)
            .await
            .map_err(|_| BridgeError::StreamClosed)
    }

    /// Cleanly close the stream. Safe to call any number of times.
    pub fn stop(&mut self) {
        if self.started {
            debug!(session_id = %self.session_id, "Voice bridge stopping");
        }
        self.cancel.cancel();
        self.to_model = None;
        self.started = false;
    }

    /// Whether the bridge has a live stream.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started && !self.stream_gone.load(Ordering::SeqCst)
    }

    /// Usage accumulated so far on this session.
    pub async fn usage(&self) -> UsageCounters {
        *self.usage.lock().await
    }
}

impl Drop for VoiceBridge {
    fn drop(&mut self) {
        self.stop();
    }
}
