//! Control-plane transport primitives.
//!
//! Two transports exist per isolate: a request/response control channel for
//! lifecycle commands, and a single-use startup signal that delivers the
//! isolate's readiness event. Both are thin wrappers over tokio channels so
//! the orchestration layer never depends on a concrete wire format.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::error::{ControlError, Result};

/// A control-plane request: a method name, JSON arguments, and a single-use
/// reply slot.
pub struct ControlMessage {
    /// Wire method name
    pub method: String,

    /// JSON-encoded arguments
    pub arguments: serde_json::Value,

    /// Reply slot; every message receives exactly one response
    pub reply: oneshot::Sender<ControlResponse>,
}

/// The closed set of control-plane responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ControlResponse {
    /// The operation completed; no payload.
    Success,

    /// A boolean result.
    Bool(bool),

    /// The ids of the currently active isolates.
    IsolateList(Vec<String>),

    /// The operation failed.
    Error(String),

    /// The method is not part of the control protocol.
    NotImplemented(String),
}

/// Sender half of a control channel.
///
/// Cloning produces another handle onto the same dispatcher, which is how
/// every spawned isolate receives its own control channel registered
/// against the same endpoint.
#[derive(Clone)]
pub struct ControlChannel {
    tx: mpsc::Sender<ControlMessage>,
}

impl ControlChannel {
    /// Issue a control call and wait for its response.
    pub async fn call(
        &self,
        method: &str,
        arguments: serde_json::Value,
    ) -> Result<ControlResponse> {
        let (reply, response) = oneshot::channel();
        let message = ControlMessage {
            method: method.to_string(),
            arguments,
            reply,
        };
        self.tx
            .send(message)
            .await
            .map_err(|_| ControlError::ChannelClosed)?;
        response.await.map_err(|_| ControlError::ChannelClosed.into())
    }
}

/// Receiver half of a control channel.
pub struct ControlEndpoint {
    rx: mpsc::Receiver<ControlMessage>,
}

impl ControlEndpoint {
    /// Receive the next control message, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<ControlMessage> {
        self.rx.recv().await
    }
}

/// Create a connected control channel pair.
pub fn control_channel(capacity: usize) -> (ControlChannel, ControlEndpoint) {
    let (tx, rx) = mpsc::channel(capacity);
    (ControlChannel { tx }, ControlEndpoint { rx })
}

/// A readiness event emitted by a newly created isolate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyEvent {
    /// The isolate's own external id
    pub isolate_id: String,

    /// Token of the spawn the signal was minted for. Ids can be reused
    /// across teardowns; the token cannot, so readiness is attributed to
    /// exactly the creation that produced it.
    pub token: u64,
}

/// Single-use readiness notifier handed to the engine factory alongside a
/// new execution context.
///
/// The signal carries the id and spawn token of the isolate it was minted
/// for and emits exactly one event before closing; `notify_ready` consumes
/// it.
pub struct StartupSignal {
    isolate_id: String,
    token: u64,
    tx: mpsc::Sender<ReadyEvent>,
}

impl StartupSignal {
    /// Create a signal scoped to the given spawn.
    pub fn new(isolate_id: impl Into<String>, token: u64, tx: mpsc::Sender<ReadyEvent>) -> Self {
        Self {
            isolate_id: isolate_id.into(),
            token,
            tx,
        }
    }

    /// The id of the isolate this signal belongs to.
    pub fn isolate_id(&self) -> &str {
        &self.isolate_id
    }

    /// The token of the spawn this signal belongs to.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Report that the isolate has finished bootstrapping.
    ///
    /// A dropped receiver means the runtime is no longer interested in this
    /// isolate (it was torn down in bulk); the event is silently discarded.
    pub async fn notify_ready(self) {
        let _ = self
            .tx
            .send(ReadyEvent {
                isolate_id: self.isolate_id,
                token: self.token,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_control_round_trip() {
        let (channel, mut endpoint) = control_channel(8);

        let server = tokio::spawn(async move {
            while let Some(message) = endpoint.recv().await {
                assert_eq!(message.method, "get_isolate_list");
                let _ = message
                    .reply
                    .send(ControlResponse::IsolateList(vec!["a".to_string()]));
            }
        });

        let response = channel.call("get_isolate_list", json!({})).await.unwrap();
        assert_eq!(
            response,
            ControlResponse::IsolateList(vec!["a".to_string()])
        );

        drop(channel);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_call_on_closed_endpoint() {
        let (channel, endpoint) = control_channel(1);
        drop(endpoint);

        let result = channel.call("kill_all_isolates", json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_startup_signal_emits_own_id_and_token() {
        let (tx, mut rx) = mpsc::channel(1);
        let signal = StartupSignal::new("worker-1", 7, tx);
        assert_eq!(signal.isolate_id(), "worker-1");
        assert_eq!(signal.token(), 7);

        signal.notify_ready().await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.isolate_id, "worker-1");
        assert_eq!(event.token, 7);

        // The signal was consumed; the stream closes with it.
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_response_serialization() {
        let encoded = serde_json::to_value(ControlResponse::Bool(true)).unwrap();
        assert_eq!(encoded, json!({ "status": "bool", "value": true }));

        let encoded =
            serde_json::to_value(ControlResponse::NotImplemented("pause".to_string())).unwrap();
        assert_eq!(
            encoded,
            json!({ "status": "not_implemented", "value": "pause" })
        );
    }
}
