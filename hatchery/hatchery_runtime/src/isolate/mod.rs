//! Isolate lifecycle orchestration.
//!
//! This module contains the startup queue of pending spawn requests, the
//! registry of active isolates, and the lifecycle controller that drives
//! both from a single control task.

pub mod controller;
pub mod queue;
pub mod registry;

pub use controller::{ControllerHandle, IsolateController, SpawnCompletion};
pub use queue::{SpawnRequest, StartupQueue};
pub use registry::{IsolateHandle, IsolateRegistry, RegistryError};
