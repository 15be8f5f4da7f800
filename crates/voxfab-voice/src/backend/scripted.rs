//! Scripted in-process backend for tests.
//!
//! No sockets, no model: the test holds a [`ScriptedModelHandle`] and plays
//! the model's side of the stream by pushing [`BridgeEvent`]s down and
//! observing the [`ModelClientEvent`]s the bridge sends up. Dropping the
//! handle's event sender ends the stream, which is how tests exercise
//! stream-gone teardown.

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::backend::{ModelBackend, ModelClientEvent, ModelSink, ModelStream};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::events::BridgeEvent;

/// The test's handle on the fake model.
pub struct ScriptedModelHandle {
    /// Push model-side events to the bridge.
    pub events: mpsc::UnboundedSender<Result<BridgeEvent, BridgeError>>,

    /// Observe what the bridge sent upstream.
    pub uplink: mpsc::UnboundedReceiver<ModelClientEvent>,

    /// Config the bridge opened the stream with.
    pub opened_with: BridgeConfig,
}

/// Backend whose single stream is driven by the test.
pub struct ScriptedBackend {
    handle_tx: Mutex<Option<tokio::sync::oneshot::Sender<ScriptedModelHandle>>>,
}

impl ScriptedBackend {
    /// Returns the backend and a receiver that yields the model handle once
    /// the bridge opens its stream.
    #[must_use]
    pub fn new() -> (Self, tokio::sync::oneshot::Receiver<ScriptedModelHandle>) {
        let (handle_tx, handle_rx) = tokio::sync::oneshot::channel();
        (
            Self {
                handle_tx: Mutex::new(Some(handle_tx)),
            },
            handle_rx,
        )
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn open(
        &self,
        _session_id: &str,
        config: &BridgeConfig,
    ) -> Result<(Box<dyn ModelSink>, Box<dyn ModelStream>), BridgeError> {
        let Some(handle_tx) = self.handle_tx.lock().await.take() else {
            return Err(BridgeError::AlreadyStarted);
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (uplink_tx, uplink_rx) = mpsc::unbounded_channel();

        let _ = handle_tx.send(ScriptedModelHandle {
            events: event_tx,
            uplink: uplink_rx,
            opened_with: config.clone(),
        });

        Ok((
            Box::new(ScriptedSink { uplink: uplink_tx }),
            Box::new(ScriptedStream { events: event_rx }),
        ))
    }
}

struct ScriptedSink {
    uplink: mpsc::UnboundedSender<ModelClientEvent>,
}

#[async_trait]
impl ModelSink for ScriptedSink {
    async fn send(&mut self, event: ModelClientEvent) -> Result<(), BridgeError> {
        self.uplink
            .send(event)
            .map_err(|_| BridgeError::StreamClosed)
    }

    async fn close(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }
}

struct ScriptedStream {
    events: mpsc::UnboundedReceiver<Result<BridgeEvent, BridgeError>>,
}

#[async_trait]
impl ModelStream for ScriptedStream {
    async fn next(&mut self) -> Option<Result<BridgeEvent, BridgeError>> {
        self.events.recv().await
    }
}
