//! Isolate lifecycle controller.
//!
//! The controller is a single task that owns the startup queue and the
//! isolate registry. Commands arrive on an mpsc channel; engine creation
//! outcomes arrive on an internal channel from spawned creation tasks.
//! Serializing all state mutation through one task removes any need for
//! locking, and the one-creation-in-flight invariant serializes engine
//! startup without a mutex.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use hatchery_core::error::{ControlError, Result, SpawnError};
use hatchery_core::traits::{EngineContext, EngineFactory, IsolateRegistrant};
use hatchery_core::transport::{ControlChannel, ReadyEvent, StartupSignal};
use hatchery_core::types::{EntryPoint, IsolateState};

use super::queue::{SpawnRequest, StartupQueue};
use super::registry::{IsolateHandle, IsolateRegistry};
use crate::system::config::RuntimeConfig;

/// Commands accepted by the controller task.
enum Command {
    Spawn {
        id: String,
        entry_point: EntryPoint,
        completion: oneshot::Sender<Result<()>>,
    },
    Kill {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    KillAll {
        reply: oneshot::Sender<bool>,
    },
    List {
        reply: oneshot::Sender<Vec<String>>,
    },
    Ready {
        id: String,
        token: u64,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Outcome of an engine creation task.
struct CreationOutcome {
    id: String,
    token: u64,
    result: Result<Box<dyn EngineContext>>,
}

/// Deferred result of a spawn call.
///
/// Resolves once the isolate reports readiness, which may be an
/// arbitrarily long time after the spawn call returned.
pub struct SpawnCompletion {
    receiver: oneshot::Receiver<Result<()>>,
}

impl SpawnCompletion {
    /// Wait for the spawn to complete or fail.
    pub async fn wait(self) -> Result<()> {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ControlError::ChannelClosed.into()),
        }
    }
}

/// Cloneable handle for issuing lifecycle commands to the controller task.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
}

impl ControllerHandle {
    /// Request a new isolate.
    ///
    /// Returns immediately with a deferred completion; the isolate id must
    /// not already be pending or active.
    pub async fn spawn(
        &self,
        id: impl Into<String>,
        entry_point: EntryPoint,
    ) -> Result<SpawnCompletion> {
        let (completion, receiver) = oneshot::channel();
        self.commands
            .send(Command::Spawn {
                id: id.into(),
                entry_point,
                completion,
            })
            .await
            .map_err(|_| ControlError::ChannelClosed)?;
        Ok(SpawnCompletion { receiver })
    }

    /// Spawn an isolate and wait for it to become ready.
    pub async fn spawn_and_wait(
        &self,
        id: impl Into<String>,
        entry_point: EntryPoint,
    ) -> Result<()> {
        self.spawn(id, entry_point).await?.wait().await
    }

    /// Kill an isolate. Reports `true` even if the id is unknown.
    pub async fn kill(&self, id: &str) -> Result<bool> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Kill {
                id: id.to_string(),
                reply,
            })
            .await
            .map_err(|_| ControlError::ChannelClosed)?;
        response.await.map_err(|_| ControlError::ChannelClosed.into())
    }

    /// Kill every active isolate and cancel every pending spawn.
    pub async fn kill_all(&self) -> Result<bool> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::KillAll { reply })
            .await
            .map_err(|_| ControlError::ChannelClosed)?;
        response.await.map_err(|_| ControlError::ChannelClosed.into())
    }

    /// Ids of all active isolates, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::List { reply })
            .await
            .map_err(|_| ControlError::ChannelClosed)?;
        response.await.map_err(|_| ControlError::ChannelClosed.into())
    }

    /// Deliver a readiness event. Normally invoked by the control
    /// dispatcher when an isolate's startup signal fires.
    pub async fn notify_ready(&self, isolate_id: String, token: u64) -> Result<()> {
        self.commands
            .send(Command::Ready {
                id: isolate_id,
                token,
            })
            .await
            .map_err(|_| ControlError::ChannelClosed)?;
        Ok(())
    }

    /// Tear down every isolate and stop the controller task.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { reply })
            .await
            .map_err(|_| ControlError::ChannelClosed)?;
        response.await.map_err(|_| ControlError::ChannelClosed)?;
        Ok(())
    }
}

/// The lifecycle controller task.
pub struct IsolateController {
    config: RuntimeConfig,
    factory: Arc<dyn EngineFactory>,
    registrant: Option<Arc<dyn IsolateRegistrant>>,

    /// Template for per-isolate control channels; every clone feeds the
    /// same dispatcher.
    isolate_control: ControlChannel,

    /// Sender from which per-isolate startup signals are minted.
    ready_tx: mpsc::Sender<ReadyEvent>,

    commands: mpsc::Receiver<Command>,
    outcomes: mpsc::Receiver<CreationOutcome>,
    outcomes_tx: mpsc::Sender<CreationOutcome>,

    queue: StartupQueue,
    registry: IsolateRegistry,

    /// Token of the spawn whose engine creation is currently outstanding.
    /// Tokens are never reused, unlike isolate ids, so a creation left
    /// behind by `kill_all` stays stale even if its id is spawned again.
    in_flight: Option<u64>,

    /// Source of spawn tokens, incremented per request.
    next_token: u64,
}

impl IsolateController {
    /// Create a controller and its command handle.
    ///
    /// The controller does nothing until `run` is awaited, typically on a
    /// spawned task.
    pub fn new(
        config: RuntimeConfig,
        factory: Arc<dyn EngineFactory>,
        registrant: Option<Arc<dyn IsolateRegistrant>>,
        isolate_control: ControlChannel,
        ready_tx: mpsc::Sender<ReadyEvent>,
    ) -> (ControllerHandle, Self) {
        let (commands_tx, commands) = mpsc::channel(config.command_buffer);
        let (outcomes_tx, outcomes) = mpsc::channel(config.event_buffer);

        let controller = Self {
            config,
            factory,
            registrant,
            isolate_control,
            ready_tx,
            commands,
            outcomes,
            outcomes_tx,
            queue: StartupQueue::new(),
            registry: IsolateRegistry::new(),
            in_flight: None,
            next_token: 1,
        };

        (
            ControllerHandle {
                commands: commands_tx,
            },
            controller,
        )
    }

    /// Drive the controller until shutdown.
    pub async fn run(mut self) {
        info!("Isolate lifecycle controller started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => break,
                },
                Some(outcome) = self.outcomes.recv() => {
                    self.handle_creation_outcome(outcome);
                }
            }
        }

        // Every handle is gone or shutdown was requested; release whatever
        // is still running.
        self.kill_all();
        info!("Isolate lifecycle controller stopped");
    }

    /// Handle one command; returns `false` once shutdown is requested.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Spawn {
                id,
                entry_point,
                completion,
            } => self.handle_spawn(id, entry_point, completion),
            Command::Kill { id, reply } => {
                self.kill_isolate(&id);
                let _ = reply.send(true);
            }
            Command::KillAll { reply } => {
                self.kill_all();
                let _ = reply.send(true);
            }
            Command::List { reply } => {
                let _ = reply.send(self.registry.ids());
            }
            Command::Ready { id, token } => self.handle_ready(id, token),
            Command::Shutdown { reply } => {
                self.kill_all();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn handle_spawn(
        &mut self,
        id: String,
        entry_point: EntryPoint,
        completion: oneshot::Sender<Result<()>>,
    ) {
        if self.queue.contains(&id) || self.registry.contains(&id) {
            warn!("Rejecting spawn with duplicate isolate id {}", id);
            let _ = completion.send(Err(SpawnError::DuplicateId(id).into()));
            return;
        }

        debug!("Queueing spawn of isolate {} ({})", id, entry_point);
        let token = self.next_token;
        self.next_token += 1;
        let only_pending = self
            .queue
            .push(SpawnRequest::new(id, token, entry_point, completion));

        if only_pending && self.in_flight.is_none() {
            self.begin_creation();
        }
    }

    /// Kick off engine creation for the request at the head of the queue.
    ///
    /// The factory call runs on its own task so the control loop stays
    /// responsive while the engine boots; its outcome comes back through
    /// the internal outcome channel.
    fn begin_creation(&mut self) {
        let (id, token, entry_point, control) = match self.queue.head_mut() {
            Some(request) => {
                request.state = IsolateState::Starting;
                let control = self.isolate_control.clone();
                request.control = Some(control.clone());
                (
                    request.id.clone(),
                    request.token,
                    request.entry_point.clone(),
                    control,
                )
            }
            None => return,
        };

        info!("Creating engine context for isolate {}", id);
        self.in_flight = Some(token);

        let startup = StartupSignal::new(id.clone(), token, self.ready_tx.clone());
        let factory = Arc::clone(&self.factory);
        let registrant = self.registrant.clone();
        let outcomes = self.outcomes_tx.clone();
        let bundle_location = self.config.bundle_location.clone();

        tokio::spawn(async move {
            let result = factory
                .create_context(&bundle_location, &entry_point, startup, control)
                .await;

            if let (Ok(context), Some(registrant)) = (&result, &registrant) {
                if let Err(err) = registrant.register(context.as_ref()) {
                    error!(
                        "Custom registrant failed for isolate {}: {}. Spawned isolates have no \
                         host surface; register only the capabilities the isolate needs.",
                        id, err
                    );
                }
            }

            let _ = outcomes.send(CreationOutcome { id, token, result }).await;
        });
    }

    fn handle_creation_outcome(&mut self, outcome: CreationOutcome) {
        let CreationOutcome { id, token, result } = outcome;

        if self.in_flight != Some(token) {
            // The queue was cleared while this creation was running; the id
            // may have been spawned again since, but the token cannot match.
            warn!("Discarding stale creation outcome for isolate {}", id);
            if let Ok(context) = result {
                if let Err(err) = context.destroy() {
                    error!("Failed to destroy stale context for isolate {}: {}", id, err);
                }
            }
            return;
        }

        match result {
            Ok(context) => {
                if self.queue.head().map(|r| r.token == token).unwrap_or(false) {
                    if let Some(request) = self.queue.head_mut() {
                        request.context = Some(context);
                    }
                    debug!("Engine context attached for isolate {}", id);
                    self.try_promote();
                } else {
                    error!("No pending request matches created isolate {}", id);
                    if let Err(err) = context.destroy() {
                        error!("Failed to destroy context for isolate {}: {}", id, err);
                    }
                    self.in_flight = None;
                    self.start_next();
                }
            }
            Err(err) => {
                error!("Engine creation failed for isolate {}: {}", id, err);
                self.in_flight = None;
                if let Some(request) = self.queue.pop() {
                    let failed_id = request.id.clone();
                    request.fail(
                        SpawnError::CreationFailed {
                            id: failed_id,
                            reason: err.to_string(),
                        }
                        .into(),
                    );
                }
                // A creation failure must never stall the spawns behind it.
                self.start_next();
            }
        }
    }

    fn handle_ready(&mut self, id: String, token: u64) {
        match self.queue.head_mut() {
            // Matching on the token rather than the id keeps a stale event
            // from a torn-down creation away from a respawn under the same
            // id.
            Some(request) if request.token == token => {
                if request.ready {
                    warn!("Duplicate readiness event for isolate {}", id);
                    return;
                }
                request.ready = true;
                debug!("Readiness observed for isolate {}", id);
                self.try_promote();
            }
            Some(request) => {
                warn!(
                    "Readiness event for isolate {} does not match in-flight isolate {}; dropping",
                    id, request.id
                );
            }
            None => {
                warn!(
                    "Readiness event for isolate {} with no pending spawn; dropping",
                    id
                );
            }
        }
    }

    /// Promote the head request once both its engine context and its
    /// readiness event have arrived, then start the next creation.
    fn try_promote(&mut self) {
        if !self.queue.head().map(SpawnRequest::is_complete).unwrap_or(false) {
            return;
        }
        let request = match self.queue.pop() {
            Some(request) => request,
            None => return,
        };
        self.in_flight = None;

        let (id, context, control, completion) = request.into_parts();
        match (context, control) {
            (Some(context), Some(control)) => {
                let handle = IsolateHandle::new(id.clone(), context, control);
                match self.registry.insert(handle) {
                    Ok(()) => {
                        info!(
                            "Isolate {} is ready ({} active)",
                            id,
                            self.registry.len()
                        );
                        let _ = completion.send(Ok(()));
                    }
                    Err(err) => {
                        // Spawn rejects duplicates upfront, so this cannot
                        // happen under normal sequencing.
                        error!("Failed to register isolate {}: {}", id, err);
                        let _ = completion.send(Err(SpawnError::DuplicateId(id).into()));
                    }
                }
            }
            _ => {
                error!("Isolate {} completed startup without an attached context", id);
                let _ = completion.send(Err(SpawnError::CreationFailed {
                    id: id.clone(),
                    reason: "no execution context attached".to_string(),
                }
                .into()));
            }
        }

        self.start_next();
    }

    fn start_next(&mut self) {
        if !self.queue.is_empty() {
            self.begin_creation();
        }
    }

    fn kill_isolate(&mut self, id: &str) {
        match self.registry.remove(id) {
            Some(mut handle) => {
                // A context that fails to destroy cleanly must still not
                // remain addressable.
                if let Err(err) = handle.destroy() {
                    error!("Failed to destroy engine context for isolate {}: {}", id, err);
                }
                info!("Killed isolate {} ({} active)", id, self.registry.len());
            }
            None => debug!("Kill requested for unknown isolate {}", id),
        }
    }

    fn kill_all(&mut self) {
        let pending = self.queue.drain();
        if !pending.is_empty() {
            info!("Cancelling {} pending spawn request(s)", pending.len());
        }
        for mut request in pending {
            if let Some(context) = request.context.take() {
                if let Err(err) = context.destroy() {
                    error!(
                        "Failed to destroy context for pending isolate {}: {}",
                        request.id, err
                    );
                }
            }
            request.cancel();
        }

        // Any outstanding creation is now stale; its late outcome will be
        // destroyed on arrival and its readiness event dropped.
        self.in_flight = None;

        let active = self.registry.remove_all();
        if !active.is_empty() {
            info!("Killing {} active isolate(s)", active.len());
        }
        for mut handle in active {
            if let Err(err) = handle.destroy() {
                error!(
                    "Failed to destroy engine context for isolate {}: {}",
                    handle.id, err
                );
            }
        }
    }
}
