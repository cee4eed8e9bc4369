//! Registry of active isolates.
//!
//! Maps external ids to live isolate handles. The registry is exclusively
//! owned by the lifecycle controller, which is the only task that mutates
//! it, so no locking is involved.

use std::collections::HashMap;

use tracing::info;

use hatchery_core::error::Result;
use hatchery_core::traits::EngineContext;
use hatchery_core::transport::ControlChannel;
use hatchery_core::types::IsolateState;

/// Errors that can occur in registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Isolate {0} already active")]
    AlreadyExists(String),
}

/// A live, addressable isolate.
///
/// The handle exclusively owns the engine context; `destroy` releases the
/// context exactly once and moves the handle to `Terminated`.
pub struct IsolateHandle {
    /// External id, stable for the isolate's lifetime
    pub id: String,

    /// Current lifecycle state (`Active` from promotion until teardown)
    pub state: IsolateState,

    context: Option<Box<dyn EngineContext>>,
    control: ControlChannel,
}

impl IsolateHandle {
    /// Promote a completed spawn into a live handle.
    pub fn new(
        id: impl Into<String>,
        context: Box<dyn EngineContext>,
        control: ControlChannel,
    ) -> Self {
        Self {
            id: id.into(),
            state: IsolateState::Active,
            context: Some(context),
            control,
        }
    }

    /// The isolate's own control channel.
    pub fn control(&self) -> &ControlChannel {
        &self.control
    }

    /// Release the engine context and mark the isolate terminated.
    ///
    /// A second call is a no-op; the context is gone either way.
    pub fn destroy(&mut self) -> Result<()> {
        self.state = IsolateState::Terminated;
        match self.context.take() {
            Some(context) => context.destroy(),
            None => Ok(()),
        }
    }
}

/// The set of active isolates, keyed by external id.
#[derive(Default)]
pub struct IsolateRegistry {
    active: HashMap<String, IsolateHandle>,
}

impl IsolateRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly promoted isolate.
    ///
    /// A duplicate id is rejected rather than silently overwriting the
    /// existing entry.
    pub fn insert(&mut self, handle: IsolateHandle) -> std::result::Result<(), RegistryError> {
        if self.active.contains_key(&handle.id) {
            return Err(RegistryError::AlreadyExists(handle.id.clone()));
        }

        info!("Registered isolate: {}", handle.id);
        self.active.insert(handle.id.clone(), handle);
        Ok(())
    }

    /// Remove an isolate, returning the owned handle if it was present.
    pub fn remove(&mut self, id: &str) -> Option<IsolateHandle> {
        let handle = self.active.remove(id);
        if handle.is_some() {
            info!("Unregistered isolate: {}", id);
        }
        handle
    }

    /// Remove every isolate, returning the owned handles.
    pub fn remove_all(&mut self) -> Vec<IsolateHandle> {
        self.active.drain().map(|(_, handle)| handle).collect()
    }

    /// Whether an isolate with the given id is active.
    pub fn contains(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    /// Ids of all active isolates, sorted for deterministic output.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of active isolates.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hatchery_core::transport::control_channel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct TestContext {
        destroyed: Arc<AtomicUsize>,
    }

    impl EngineContext for TestContext {
        fn destroy(self: Box<Self>) -> Result<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn handle(id: &str, destroyed: &Arc<AtomicUsize>) -> IsolateHandle {
        let (control, _endpoint) = control_channel(1);
        IsolateHandle::new(
            id,
            Box::new(TestContext {
                destroyed: destroyed.clone(),
            }),
            control,
        )
    }

    #[test]
    fn test_insert_and_lookup() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut registry = IsolateRegistry::new();

        registry.insert(handle("a", &destroyed)).unwrap();
        assert!(registry.contains("a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut registry = IsolateRegistry::new();

        registry.insert(handle("a", &destroyed)).unwrap();
        let err = registry.insert(handle("a", &destroyed)).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(ref id) if id == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_returns_owned_handle() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut registry = IsolateRegistry::new();
        registry.insert(handle("a", &destroyed)).unwrap();

        let mut removed = registry.remove("a").unwrap();
        assert_eq!(removed.id, "a");
        assert_eq!(removed.state, IsolateState::Active);
        assert!(registry.is_empty());

        removed.destroy().unwrap();
        assert_eq!(removed.state, IsolateState::Terminated);
        assert!(!removed.state.is_live());
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);

        assert!(registry.remove("a").is_none());
    }

    #[test]
    fn test_double_destroy_releases_once() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut h = handle("a", &destroyed);
        assert!(h.state.is_active());

        h.destroy().unwrap();
        h.destroy().unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(h.state, IsolateState::Terminated);
    }

    #[test]
    fn test_remove_all() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut registry = IsolateRegistry::new();
        registry.insert(handle("a", &destroyed)).unwrap();
        registry.insert(handle("b", &destroyed)).unwrap();

        let handles = registry.remove_all();
        assert_eq!(handles.len(), 2);
        assert!(registry.is_empty());

        for mut h in handles {
            h.destroy().unwrap();
        }
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ids_sorted() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut registry = IsolateRegistry::new();
        registry.insert(handle("charlie", &destroyed)).unwrap();
        registry.insert(handle("alpha", &destroyed)).unwrap();
        registry.insert(handle("bravo", &destroyed)).unwrap();

        assert_eq!(registry.ids(), vec!["alpha", "bravo", "charlie"]);
    }
}
