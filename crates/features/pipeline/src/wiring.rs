//! Listener lifecycle of one board root.

use crate::dom::{BoardDom, BoardListener, DragEventKind, ListenerId, ListenerOptions, NodeId};
use crate::error::{PipelineError, PipelineErrorExt};
use crate::lifecycle::LifecycleMonitor;
use crate::router::PersistenceRouter;
use crate::session::DragController;
use crate::stage::StageRegistry;
use crm_domain::board::{DetachReason, RootState, WiringMetrics};
use crm_domain::constants::PIPELINE_VIEW;
use crm_kernel::clock::epoch_millis;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// One listener exactly as it was registered, so it can be removed exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerBinding {
    pub root: NodeId,
    pub event: DragEventKind,
    pub listener: ListenerId,
    pub options: ListenerOptions,
}

#[derive(Debug)]
struct WiringRecord {
    root: NodeId,
    bindings: Vec<ListenerBinding>,
    controller: Arc<DragController>,
}

#[derive(Debug, Default)]
struct WiringState {
    record: Option<WiringRecord>,
    attach: u64,
    detach: u64,
    columns: u64,
    root: RootState,
    last_detach_reason: Option<DetachReason>,
}

impl WiringState {
    fn snapshot(&self) -> WiringMetrics {
        WiringMetrics {
            attach: self.attach,
            detach: self.detach,
            active: self.attach - self.detach,
            columns: self.columns,
            root: self.root,
            last_detach_reason: self.last_detach_reason,
            timestamp_ms: epoch_millis(),
        }
    }
}

/// Owns the drag listeners bound to at most one board root.
///
/// `attach - detach == active == listeners bound` holds after every call.
/// Clones share the same wiring.
#[derive(Debug, Clone)]
pub struct BoardWiring {
    inner: Arc<WiringInner>,
}

#[derive(Debug)]
struct WiringInner {
    dom: Arc<dyn BoardDom>,
    registry: Arc<StageRegistry>,
    router: Arc<PersistenceRouter>,
    monitor: LifecycleMonitor,
    options: ListenerOptions,
    state: Mutex<WiringState>,
    metrics: watch::Sender<WiringMetrics>,
}

impl BoardWiring {
    pub fn new(
        dom: Arc<dyn BoardDom>,
        registry: Arc<StageRegistry>,
        router: Arc<PersistenceRouter>,
        observer_window: Duration,
    ) -> Self {
        let monitor = LifecycleMonitor::new(Arc::clone(&dom), observer_window);
        let (metrics, _) = watch::channel(WiringMetrics::default());
        Self {
            inner: Arc::new(WiringInner {
                dom,
                registry,
                router,
                monitor,
                options: ListenerOptions::default(),
                state: Mutex::new(WiringState::default()),
                metrics,
            }),
        }
    }

    /// Binds the three drag listeners on `root`.
    ///
    /// A root already wired is left alone. A different root is torn down
    /// first. Returns `false` when the host cannot bind listeners or `root`
    /// is not in the document; the latter also drops any current wiring.
    pub fn install(&self, root: NodeId) -> bool {
        if !self.inner.dom.is_connected(root) {
            let reason = match self.root() {
                Some(wired) if wired != root && self.inner.dom.is_connected(wired) => DetachReason::RootChanged,
                _ => DetachReason::Disconnect,
            };
            self.teardown(reason);
            self.inner.state.lock().root = RootState::Detached;
            self.publish();
            warn!(%root, "Board root is not in the document");
            return false;
        }

        let current = self.inner.state.lock().record.as_ref().map(|r| (r.root, r.bindings.len()));
        match current {
            Some((wired, listeners)) if wired == root && listeners > 0 => {
                debug!(%root, "Board already wired");
                self.publish();
                return true;
            }
            Some(_) => {
                self.teardown(DetachReason::RootChanged);
            }
            None => {}
        }

        let controller = Arc::new(DragController::new(
            Arc::clone(&self.inner.dom),
            Arc::clone(&self.inner.registry),
            Arc::clone(&self.inner.router),
            root,
        ));
        let bindings = match self.bind(root, &controller) {
            Ok(bindings) => bindings,
            Err(err) => {
                warn!(%root, error = %err, "Drag and drop unavailable");
                return false;
            }
        };

        let listeners = bindings.len();
        {
            let mut state = self.inner.state.lock();
            state.attach += listeners as u64;
            state.root = RootState::Connected;
            state.record = Some(WiringRecord { root, bindings, controller });
        }
        self.publish();

        let wiring = Arc::downgrade(&self.inner);
        self.inner.monitor.watch(root, Arc::new(move || on_detached(&wiring)));

        info!(%root, listeners, "Board wired");
        true
    }

    /// Removes every recorded listener and disarms the detach monitor.
    ///
    /// Returns `false` when nothing was wired.
    pub fn teardown(&self, reason: DetachReason) -> bool {
        let record = {
            let mut state = self.inner.state.lock();
            let Some(record) = state.record.take() else { return false };
            state.detach += record.bindings.len() as u64;
            state.last_detach_reason = Some(reason);
            state.root = if reason == DetachReason::Disconnect { RootState::Detached } else { RootState::None };
            record
        };

        for binding in &record.bindings {
            if let Err(err) =
                self.inner.dom.remove_listener(binding.root, binding.event, binding.listener, binding.options)
            {
                warn!(root = %binding.root, event = %binding.event, error = %err, "Listener already gone");
            }
        }
        record.controller.cancel();
        self.inner.monitor.unwatch();
        self.publish();

        info!(root = %record.root, %reason, listeners = record.bindings.len(), "Board unwired");
        true
    }

    /// Render hook: prepares and wires the board found at `root`.
    ///
    /// Drops a wired root that left the document, tears down when no root
    /// exists, otherwise stamps inferred lane stages, makes cards draggable,
    /// counts lanes with a resolvable stage and installs.
    pub fn wire(&self, root: Option<NodeId>) -> bool {
        if let Some(wired) = self.root()
            && !self.inner.dom.is_connected(wired)
        {
            self.teardown(DetachReason::Disconnect);
        }

        let Some(root) = root else {
            self.teardown(DetachReason::NoRoot);
            self.inner.state.lock().columns = 0;
            self.publish();
            return false;
        };

        let columns = self.prepare(root);
        self.inner.state.lock().columns = columns;
        self.install(root)
    }

    /// Tears down when the application leaves the pipeline view.
    ///
    /// View names are case-insensitive; an empty view is ignored.
    pub fn navigate(&self, view: &str) -> bool {
        let view = view.trim();
        if view.is_empty() || view.eq_ignore_ascii_case(PIPELINE_VIEW) {
            return false;
        }
        self.teardown(DetachReason::Navigate)
    }

    /// Explicit unmount.
    pub fn dispose(&self) -> bool {
        self.teardown(DetachReason::Disposed)
    }

    #[must_use]
    pub fn metrics(&self) -> WiringMetrics {
        self.inner.state.lock().snapshot()
    }

    /// Receives a snapshot after every attach, detach and render pass.
    #[must_use]
    pub fn subscribe_metrics(&self) -> watch::Receiver<WiringMetrics> {
        self.inner.metrics.subscribe()
    }

    /// Currently wired root.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.inner.state.lock().record.as_ref().map(|r| r.root)
    }

    #[must_use]
    pub fn bindings(&self) -> Vec<ListenerBinding> {
        self.inner.state.lock().record.as_ref().map(|r| r.bindings.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn controller(&self) -> Option<Arc<DragController>> {
        self.inner.state.lock().record.as_ref().map(|r| Arc::clone(&r.controller))
    }

    #[must_use]
    pub fn monitor(&self) -> &LifecycleMonitor {
        &self.inner.monitor
    }

    fn bind(&self, root: NodeId, controller: &Arc<DragController>) -> Result<Vec<ListenerBinding>, PipelineError> {
        let dom = &self.inner.dom;
        let options = self.inner.options;
        let mut bindings = Vec::with_capacity(DragEventKind::ALL.len());

        for event in DragEventKind::ALL {
            let listener: Arc<dyn BoardListener> = controller.clone();
            match dom.add_listener(root, event, listener, options) {
                Ok(listener) => bindings.push(ListenerBinding { root, event, listener, options }),
                Err(err) => {
                    for bound in &bindings {
                        let _ = dom.remove_listener(bound.root, bound.event, bound.listener, bound.options);
                    }
                    return Err(err).context(format!("Binding {event} on {root}"));
                }
            }
        }
        Ok(bindings)
    }

    fn prepare(&self, root: NodeId) -> u64 {
        let dom = &self.inner.dom;
        let registry = &self.inner.registry;

        let mut columns = 0;
        for lane in dom.lanes(root) {
            let resolved = match dom.stage_attr(lane) {
                Some(declared) => registry.canonicalize(&declared).is_some(),
                None => match dom.lane_label(lane).and_then(|label| registry.canonical_key(&label).map(str::to_owned)) {
                    Some(key) => {
                        dom.set_stage(lane, &key);
                        true
                    }
                    None => false,
                },
            };
            if resolved {
                columns += 1;
            }
        }

        for card in dom.cards(root) {
            dom.set_draggable(card);
        }
        debug!(%root, columns, "Board prepared");
        columns
    }

    fn publish(&self) {
        let snapshot = self.inner.state.lock().snapshot();
        self.inner.metrics.send_replace(snapshot);
    }
}

fn on_detached(wiring: &Weak<WiringInner>) {
    if let Some(inner) = wiring.upgrade() {
        BoardWiring { inner }.teardown(DetachReason::Disconnect);
    }
}
