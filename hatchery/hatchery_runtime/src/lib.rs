//! Hatchery Runtime - Isolate lifecycle orchestration
//!
//! This crate provides the runtime components of the hatchery system:
//! the startup queue, the registry of active isolates, the lifecycle
//! controller that drives spawns from queued to active, and the control
//! dispatcher that serves the wire protocol.

pub mod control;
pub mod isolate;
pub mod system;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use hatchery_core::traits::{EngineFactory, IsolateRegistrant};
use hatchery_core::transport::{control_channel, ControlChannel};

use control::ControlDispatcher;
use isolate::{ControllerHandle, IsolateController};
use system::RuntimeConfig;

/// Runtime facade that wires the controller and dispatcher together.
pub struct Runtime {
    /// Direct handle onto the lifecycle controller
    pub isolates: ControllerHandle,

    /// Template for control channels handed to callers and isolates
    control: ControlChannel,

    controller_task: JoinHandle<()>,
    dispatcher_task: JoinHandle<()>,
}

impl Runtime {
    /// Create and start a runtime from an already loaded configuration.
    ///
    /// Must be called within a tokio runtime; the controller and
    /// dispatcher tasks are spawned immediately.
    pub fn new(
        config: RuntimeConfig,
        factory: Arc<dyn EngineFactory>,
        registrant: Option<Arc<dyn IsolateRegistrant>>,
    ) -> Result<Self> {
        info!("Initializing Hatchery Runtime");

        config.validate()?;

        let (control, endpoint) = control_channel(config.command_buffer);
        let (ready_tx, ready_rx) = mpsc::channel(config.event_buffer);

        let (isolates, controller) =
            IsolateController::new(config, factory, registrant, control.clone(), ready_tx);
        let dispatcher = ControlDispatcher::new(endpoint, ready_rx, isolates.clone());

        let controller_task = tokio::spawn(controller.run());
        let dispatcher_task = tokio::spawn(dispatcher.run());

        info!("Hatchery Runtime initialized successfully");

        Ok(Self {
            isolates,
            control,
            controller_task,
            dispatcher_task,
        })
    }

    /// Create a runtime, loading configuration from the given path.
    pub async fn with_config_path(
        config_path: Option<&str>,
        factory: Arc<dyn EngineFactory>,
        registrant: Option<Arc<dyn IsolateRegistrant>>,
    ) -> Result<Self> {
        let config = RuntimeConfig::load(config_path).await?;
        Self::new(config, factory, registrant)
    }

    /// A control channel onto this runtime's dispatcher.
    pub fn control_channel(&self) -> ControlChannel {
        self.control.clone()
    }

    /// Gracefully shut down the runtime.
    ///
    /// Tears down every isolate, cancels pending spawns, and waits for
    /// the controller and dispatcher tasks to finish.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down Hatchery Runtime");

        self.isolates.shutdown().await?;
        drop(self.control);

        // The dispatcher stops once the readiness stream closes with the
        // controller; outstanding control channel clones cannot revive it.
        self.controller_task.await?;
        self.dispatcher_task.await?;

        info!("Hatchery Runtime shut down successfully");

        Ok(())
    }
}
