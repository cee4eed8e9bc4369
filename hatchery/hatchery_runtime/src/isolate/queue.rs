//! Startup queue of pending spawn requests.
//!
//! Spawn requests wait here in FIFO order until their isolate reports
//! readiness. At most one engine creation is in flight at any time; the
//! in-flight request stays at the head of the queue until it is promoted
//! or fails.

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tracing::debug;

use hatchery_core::error::{Error, Result, SpawnError};
use hatchery_core::traits::EngineContext;
use hatchery_core::transport::ControlChannel;
use hatchery_core::types::{EntryPoint, IsolateState};

/// A spawn request that has not yet completed startup.
///
/// Created when a spawn call arrives and consumed exactly once: on
/// promotion, creation failure, or cancellation. The only mutations after
/// creation attach the engine context and record the readiness observation.
pub struct SpawnRequest {
    /// Caller-supplied external id
    pub id: String,

    /// Controller-assigned token, unique per spawn. Ids can be reused
    /// after teardown; tokens never are, so creation outcomes and
    /// readiness events are matched against this instead of the id.
    pub token: u64,

    /// Reference to the code the isolate should run
    pub entry_point: EntryPoint,

    /// Current lifecycle state (`Queued` until creation begins)
    pub state: IsolateState,

    /// Engine context, attached once creation returns
    pub context: Option<Box<dyn EngineContext>>,

    /// The isolate's own control channel, attached when creation begins
    pub control: Option<ControlChannel>,

    /// Whether the readiness event has been observed
    pub ready: bool,

    completion: oneshot::Sender<Result<()>>,
}

impl SpawnRequest {
    /// Create a queued request.
    pub fn new(
        id: impl Into<String>,
        token: u64,
        entry_point: EntryPoint,
        completion: oneshot::Sender<Result<()>>,
    ) -> Self {
        Self {
            id: id.into(),
            token,
            entry_point,
            state: IsolateState::Queued,
            context: None,
            control: None,
            ready: false,
            completion,
        }
    }

    /// Whether the request can be promoted to an active isolate.
    pub fn is_complete(&self) -> bool {
        self.ready && self.context.is_some()
    }

    /// Break the request apart for promotion.
    pub fn into_parts(
        self,
    ) -> (
        String,
        Option<Box<dyn EngineContext>>,
        Option<ControlChannel>,
        oneshot::Sender<Result<()>>,
    ) {
        (self.id, self.context, self.control, self.completion)
    }

    /// Fail the request's completion with the given error.
    pub fn fail(self, error: Error) {
        let _ = self.completion.send(Err(error));
    }

    /// Fail the request's completion as cancelled.
    pub fn cancel(self) {
        debug!("Cancelling pending spawn of isolate {}", self.id);
        let id = self.id;
        let _ = self.completion.send(Err(SpawnError::Cancelled(id).into()));
    }
}

/// FIFO queue of pending spawn requests.
#[derive(Default)]
pub struct StartupQueue {
    pending: VecDeque<SpawnRequest>,
}

impl StartupQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request.
    ///
    /// Returns `true` when this is now the only pending request, i.e. no
    /// other spawn is ahead of it and creation should begin immediately.
    pub fn push(&mut self, request: SpawnRequest) -> bool {
        self.pending.push_back(request);
        self.pending.len() == 1
    }

    /// The oldest pending request.
    pub fn head(&self) -> Option<&SpawnRequest> {
        self.pending.front()
    }

    /// Mutable access to the oldest pending request.
    pub fn head_mut(&mut self) -> Option<&mut SpawnRequest> {
        self.pending.front_mut()
    }

    /// Remove and return the oldest pending request.
    pub fn pop(&mut self) -> Option<SpawnRequest> {
        self.pending.pop_front()
    }

    /// Whether any pending request carries the given id.
    pub fn contains(&self, id: &str) -> bool {
        self.pending.iter().any(|request| request.id == id)
    }

    /// Remove every pending request, preserving FIFO order.
    pub fn drain(&mut self) -> Vec<SpawnRequest> {
        self.pending.drain(..).collect()
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
