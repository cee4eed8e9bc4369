//! Registrant hook for newly created execution contexts.

use crate::error::Result;
use crate::traits::EngineContext;

/// Auxiliary setup performed on every freshly created execution context.
///
/// A registrant is handed the new context after creation and before the
/// isolate is promoted to active, and can register whatever capabilities
/// the isolate's code expects to find. It is injected explicitly at
/// controller construction rather than held in process-wide mutable state,
/// so different controllers can carry different registrants.
///
/// Registrant failures are logged and do not fail the spawn.
pub trait IsolateRegistrant: Send + Sync {
    /// Perform setup against the new execution context.
    fn register(&self, context: &dyn EngineContext) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NoopContext;

    impl EngineContext for NoopContext {
        fn destroy(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    struct CountingRegistrant {
        calls: Arc<AtomicUsize>,
    }

    impl IsolateRegistrant for CountingRegistrant {
        fn register(&self, _context: &dyn EngineContext) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingRegistrant;

    impl IsolateRegistrant for FailingRegistrant {
        fn register(&self, _context: &dyn EngineContext) -> Result<()> {
            Err(EngineError::RegistrantFailed("no registerWith method".to_string()).into())
        }
    }

    #[test]
    fn test_registrant_invocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registrant = CountingRegistrant {
            calls: calls.clone(),
        };

        let context = NoopContext;
        registrant.register(&context).unwrap();
        registrant.register(&context).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failing_registrant_reports_cause() {
        let err = FailingRegistrant.register(&NoopContext).unwrap_err();
        assert!(err.to_string().contains("no registerWith method"));
    }
}
