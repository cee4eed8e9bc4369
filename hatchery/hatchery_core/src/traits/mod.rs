//! Collaborator trait definitions.
//!
//! The orchestration layer never executes code itself; it drives an
//! external execution engine through the traits defined here.

mod engine;
mod registrant;

pub use engine::{EngineContext, EngineFactory};
pub use registrant::IsolateRegistrant;
