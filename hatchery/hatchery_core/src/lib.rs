//! # Hatchery Core
//!
//! `hatchery_core` provides the shared vocabulary for the hatchery isolate
//! runtime: the error hierarchy, the core types describing isolates and
//! their entry points, the collaborator traits implemented by an execution
//! engine, and the generic transport primitives used on the control plane.
//!
//! Key concepts:
//!
//! 1. **Isolate**: an independently executing worker context with its own
//!    execution state, spawned from a designated entry point.
//!
//! 2. **Engine Factory**: the external capability that instantiates a new
//!    isolated execution context for an entry point.
//!
//! 3. **Engine Context**: an owned handle to a running execution context;
//!    destroying it releases all engine resources exactly once.
//!
//! 4. **Control Channel**: the request/response transport used to issue
//!    lifecycle commands (spawn/kill/list).
//!
//! 5. **Startup Signal**: the single-use notifier a newly created isolate
//!    fires once it has finished bootstrapping.
//!
//! 6. **Registrant**: an injectable hook that performs auxiliary setup on
//!    every freshly created execution context.

pub mod error;
pub mod traits;
pub mod transport;
pub mod types;

// Re-export key types and traits for convenience
pub use error::{ControlError, EngineError, Error, Result, SpawnError};
pub use traits::{EngineContext, EngineFactory, IsolateRegistrant};
pub use transport::{
    control_channel, ControlChannel, ControlEndpoint, ControlMessage, ControlResponse, ReadyEvent,
    StartupSignal,
};
pub use types::{EntryPoint, IsolateState};
