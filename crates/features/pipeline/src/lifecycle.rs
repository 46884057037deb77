//! Safety net that tears a board down once its root leaves the document.

use crate::dom::{BoardDom, NodeId, ObserverId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Called once when the watched root is found detached.
pub type DetachCallback = Arc<dyn Fn() + Send + Sync>;

/// Watches one board root for a bounded window.
///
/// The observer sits on the root's parent (the root itself when it has
/// none). On every structural change it checks whether the root is still
/// connected; when it is not, it disconnects itself and fires the callback.
/// Each [`LifecycleMonitor::watch`] starts a new generation and callbacks of
/// older generations are ignored.
#[derive(Clone)]
pub struct LifecycleMonitor {
    dom: Arc<dyn BoardDom>,
    window: Duration,
    state: Arc<Mutex<MonitorState>>,
}

#[derive(Debug, Default)]
struct MonitorState {
    generation: u64,
    observer: Option<ObserverId>,
    root: Option<NodeId>,
    deadline: Option<Instant>,
}

impl fmt::Debug for LifecycleMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleMonitor")
            .field("window", &self.window)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl LifecycleMonitor {
    pub fn new(dom: Arc<dyn BoardDom>, window: Duration) -> Self {
        Self { dom, window, state: Arc::default() }
    }

    /// Arms the monitor for `root`, replacing any previous watch.
    ///
    /// Returns `false` when the host cannot observe mutations.
    pub fn watch(&self, root: NodeId, on_detached: DetachCallback) -> bool {
        self.unwatch();

        let target = self.dom.parent(root).unwrap_or(root);
        let deadline = Instant::now() + self.window;
        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.root = Some(root);
            state.deadline = Some(deadline);
            state.generation
        };

        let callback = {
            let dom = Arc::clone(&self.dom);
            let state = Arc::downgrade(&self.state);
            Arc::new(move || on_mutation(dom.as_ref(), &state, generation, root, &on_detached))
        };

        let observer = match self.dom.observe(target, callback) {
            Ok(observer) => observer,
            Err(err) => {
                warn!(%root, error = %err, "Detach monitor unavailable");
                let mut state = self.state.lock();
                state.root = None;
                state.deadline = None;
                return false;
            }
        };

        {
            let mut state = self.state.lock();
            if state.generation == generation {
                state.observer = Some(observer);
            } else {
                drop(state);
                self.dom.disconnect_observer(observer);
                return false;
            }
        }

        self.schedule_expiry(generation);
        debug!(%root, %target, window_ms = self.window.as_millis(), "Detach monitor armed");
        true
    }

    /// Disconnects the observer and invalidates pending callbacks.
    pub fn unwatch(&self) {
        let observer = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.root = None;
            state.deadline = None;
            state.observer.take()
        };
        if let Some(observer) = observer {
            self.dom.disconnect_observer(observer);
        }
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.state.lock().observer.is_some()
    }

    /// Root of the current watch.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.state.lock().root
    }

    fn schedule_expiry(&self, generation: u64) {
        let Ok(handle) = Handle::try_current() else { return };
        let dom = Arc::clone(&self.dom);
        let state = Arc::downgrade(&self.state);
        let window = self.window;
        handle.spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(state) = state.upgrade() {
                expire(dom.as_ref(), &state, generation);
            }
        });
    }
}

fn on_mutation(
    dom: &dyn BoardDom,
    state: &Weak<Mutex<MonitorState>>,
    generation: u64,
    root: NodeId,
    on_detached: &DetachCallback,
) {
    let Some(state) = state.upgrade() else { return };

    let observer = {
        let mut guard = state.lock();
        if guard.generation != generation {
            return;
        }
        if guard.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            drop(guard);
            expire(dom, &state, generation);
            return;
        }
        if dom.is_connected(root) {
            return;
        }
        guard.generation += 1;
        guard.root = None;
        guard.deadline = None;
        guard.observer.take()
    };

    if let Some(observer) = observer {
        dom.disconnect_observer(observer);
    }
    info!(%root, "Board root detached");
    on_detached();
}

fn expire(dom: &dyn BoardDom, state: &Mutex<MonitorState>, generation: u64) {
    let observer = {
        let mut guard = state.lock();
        if guard.generation != generation {
            return;
        }
        guard.generation += 1;
        guard.deadline = None;
        guard.observer.take()
    };
    if let Some(observer) = observer {
        dom.disconnect_observer(observer);
        debug!("Detach monitor window elapsed");
    }
}
