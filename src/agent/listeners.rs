//! "Agents changed" notifications.
//!
//! The host owns an [`AgentListeners`] registry and hands it to whatever sets
//! up or unloads entries. Registering returns a [`ListenerHandle`]; the
//! listener stays registered for as long as the handle is alive.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Registry of callbacks fired when agents are added or removed.
///
/// Cloning shares the registry.
#[derive(Clone, Default)]
pub struct AgentListeners {
    inner: Arc<Mutex<Registry>>,
}

impl AgentListeners {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` until the returned handle is removed or dropped.
    #[must_use = "dropping the handle unregisters the listener"]
    pub fn register(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerHandle {
        let mut registry = self.inner.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));

        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Calls every registered listener once.
    ///
    /// The lock is released before calling out, so a listener may register
    /// or remove listeners itself.
    pub fn notify(&self) {
        let listeners: Vec<Listener> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        debug!(count = listeners.len(), "Notifying agent listeners");
        for listener in listeners {
            listener();
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for AgentListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentListeners")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Registration of one listener.
#[derive(Debug)]
pub struct ListenerHandle {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl ListenerHandle {
    /// Unregisters the listener now.
    pub fn remove(self) {
        drop(self);
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}
