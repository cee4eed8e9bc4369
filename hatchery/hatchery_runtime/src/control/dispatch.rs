//! Control-plane dispatcher.
//!
//! Owns the receiving end of the control channel and the readiness event
//! stream. Every control message is decoded into a [`ControlOp`] and
//! forwarded to the lifecycle controller; readiness events are relayed the
//! same way so the controller stays the single owner of lifecycle state.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use hatchery_core::error::ControlError;
use hatchery_core::transport::{ControlEndpoint, ControlMessage, ControlResponse, ReadyEvent};

use super::message::ControlOp;
use crate::isolate::ControllerHandle;

/// Bridges the control transport to the lifecycle controller.
pub struct ControlDispatcher {
    endpoint: ControlEndpoint,
    ready_events: mpsc::Receiver<ReadyEvent>,
    controller: ControllerHandle,
}

impl ControlDispatcher {
    /// Create a dispatcher over the given transport ends.
    pub fn new(
        endpoint: ControlEndpoint,
        ready_events: mpsc::Receiver<ReadyEvent>,
        controller: ControllerHandle,
    ) -> Self {
        Self {
            endpoint,
            ready_events,
            controller,
        }
    }

    /// Serve control messages and readiness events until both streams end
    /// or the controller goes away.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                message = self.endpoint.recv() => match message {
                    Some(message) => self.dispatch(message).await,
                    None => break,
                },
                event = self.ready_events.recv() => match event {
                    Some(event) => {
                        if self
                            .controller
                            .notify_ready(event.isolate_id, event.token)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("Control dispatcher stopped");
    }

    async fn dispatch(&self, message: ControlMessage) {
        let ControlMessage {
            method,
            arguments,
            reply,
        } = message;

        let op = match ControlOp::decode(&method, &arguments) {
            Ok(op) => op,
            Err(ControlError::NotImplemented(method)) => {
                warn!("Unknown control method: {}", method);
                let _ = reply.send(ControlResponse::NotImplemented(method));
                return;
            }
            Err(err) => {
                warn!("Rejecting control call {}: {}", method, err);
                let _ = reply.send(ControlResponse::Error(err.to_string()));
                return;
            }
        };

        debug!("Dispatching control operation: {:?}", op);
        match op {
            ControlOp::SpawnIsolate {
                isolate_id,
                entry_point,
            } => match self.controller.spawn(isolate_id, entry_point).await {
                Ok(completion) => {
                    // The reply resolves only once the isolate is ready,
                    // which must not stall the dispatch loop.
                    tokio::spawn(async move {
                        let response = match completion.wait().await {
                            Ok(()) => ControlResponse::Success,
                            Err(err) => ControlResponse::Error(err.to_string()),
                        };
                        let _ = reply.send(response);
                    });
                }
                Err(err) => {
                    let _ = reply.send(ControlResponse::Error(err.to_string()));
                }
            },
            ControlOp::KillIsolate { isolate_id } => {
                let response = match self.controller.kill(&isolate_id).await {
                    Ok(killed) => ControlResponse::Bool(killed),
                    Err(err) => ControlResponse::Error(err.to_string()),
                };
                let _ = reply.send(response);
            }
            ControlOp::GetIsolateList => {
                let response = match self.controller.list().await {
                    Ok(ids) => ControlResponse::IsolateList(ids),
                    Err(err) => ControlResponse::Error(err.to_string()),
                };
                let _ = reply.send(response);
            }
            ControlOp::KillAllIsolates => {
                let response = match self.controller.kill_all().await {
                    Ok(killed) => ControlResponse::Bool(killed),
                    Err(err) => ControlResponse::Error(err.to_string()),
                };
                let _ = reply.send(response);
            }
        }
    }
}
