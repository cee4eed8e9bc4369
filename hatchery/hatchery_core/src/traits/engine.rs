//! Execution engine trait definitions.
//!
//! The engine factory is the external capability that instantiates a new
//! isolated execution context given an entry-point reference. The runtime
//! only ever invokes one creation at a time, so implementations need not be
//! safe against concurrent creation calls.

use async_trait::async_trait;

use crate::error::Result;
use crate::transport::{ControlChannel, StartupSignal};
use crate::types::EntryPoint;

/// Factory for isolated execution contexts.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Create a running execution context for the given entry point.
    ///
    /// The startup signal is scoped to the new context and must be fired
    /// exactly once, after the context has finished bootstrapping. The
    /// control channel is the context's own handle onto the control plane;
    /// the factory wires it into the context so the isolate can issue
    /// lifecycle calls back if it chooses to.
    ///
    /// Creation may take substantial wall-clock time. A failure here fails
    /// only the spawn request the call was made for.
    async fn create_context(
        &self,
        bundle_location: &str,
        entry_point: &EntryPoint,
        startup: StartupSignal,
        control: ControlChannel,
    ) -> Result<Box<dyn EngineContext>>;
}

/// An owned handle to a running execution context.
///
/// Destroying the context releases all engine resources. Taking `self` by
/// box makes the release single-shot by construction: once destroyed, the
/// handle is gone.
pub trait EngineContext: Send {
    /// Release the execution context.
    ///
    /// Must be safe to call while the context is mid-execution.
    fn destroy(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::control_channel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct TestContext {
        destroyed: Arc<AtomicUsize>,
    }

    impl EngineContext for TestContext {
        fn destroy(self: Box<Self>) -> Result<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct TestFactory {
        destroyed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EngineFactory for TestFactory {
        async fn create_context(
            &self,
            _bundle_location: &str,
            _entry_point: &EntryPoint,
            startup: StartupSignal,
            _control: ControlChannel,
        ) -> Result<Box<dyn EngineContext>> {
            let context = TestContext {
                destroyed: self.destroyed.clone(),
            };
            tokio::spawn(startup.notify_ready());
            Ok(Box::new(context))
        }
    }

    #[tokio::test]
    async fn test_create_signal_destroy() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let factory = TestFactory {
            destroyed: destroyed.clone(),
        };

        let (ready_tx, mut ready_rx) = mpsc::channel(1);
        let (control, _endpoint) = control_channel(1);
        let startup = StartupSignal::new("worker-1", 1, ready_tx);

        let context = factory
            .create_context("./bundle", &EntryPoint::Handle(1), startup, control)
            .await
            .unwrap();

        let event = ready_rx.recv().await.unwrap();
        assert_eq!(event.isolate_id, "worker-1");

        context.destroy().unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }
}
