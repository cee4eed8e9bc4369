//! Core types describing isolates and their entry points.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque reference to the code a new isolate should run.
///
/// Callers on the wire may supply either a numeric callback handle or a
/// symbolic name; both forms are carried through to the engine factory
/// unchanged, which is why the serde representation is untagged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPoint {
    /// A numeric callback handle
    Handle(i64),

    /// A symbolic entry-point name
    Symbol(String),
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryPoint::Handle(handle) => write!(f, "handle:{}", handle),
            EntryPoint::Symbol(symbol) => write!(f, "symbol:{}", symbol),
        }
    }
}

impl From<i64> for EntryPoint {
    fn from(handle: i64) -> Self {
        EntryPoint::Handle(handle)
    }
}

impl From<&str> for EntryPoint {
    fn from(symbol: &str) -> Self {
        EntryPoint::Symbol(symbol.to_string())
    }
}

/// The lifecycle state of an isolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolateState {
    /// The spawn request is queued; creation has not begun.
    Queued,

    /// Engine creation is in flight; readiness has not been observed.
    Starting,

    /// The isolate has reported readiness and is addressable.
    Active,

    /// The isolate has been torn down.
    Terminated,
}

impl IsolateState {
    /// Check whether the isolate still holds engine resources.
    pub fn is_live(&self) -> bool {
        !matches!(self, IsolateState::Terminated)
    }

    /// Check whether the isolate can receive control messages.
    pub fn is_active(&self) -> bool {
        matches!(self, IsolateState::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_point_from_wire() {
        let entry: EntryPoint = serde_json::from_str("42").unwrap();
        assert_eq!(entry, EntryPoint::Handle(42));

        let entry: EntryPoint = serde_json::from_str("\"main\"").unwrap();
        assert_eq!(entry, EntryPoint::Symbol("main".to_string()));
    }

    #[test]
    fn test_entry_point_display() {
        assert_eq!(EntryPoint::Handle(7).to_string(), "handle:7");
        assert_eq!(EntryPoint::from("boot").to_string(), "symbol:boot");
    }

    #[test]
    fn test_state_transitions() {
        assert!(IsolateState::Queued.is_live());
        assert!(IsolateState::Starting.is_live());
        assert!(IsolateState::Active.is_live());
        assert!(!IsolateState::Terminated.is_live());

        assert!(IsolateState::Active.is_active());
        assert!(!IsolateState::Starting.is_active());
    }
}
