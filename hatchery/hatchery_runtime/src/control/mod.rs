//! Control plane: wire-method decoding and dispatch.

pub mod dispatch;
pub mod message;

pub use dispatch::ControlDispatcher;
pub use message::ControlOp;
