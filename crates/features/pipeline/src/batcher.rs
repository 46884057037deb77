//! Coalesced change notifications.

use crm_domain::board::PipelineChanged;
use crm_event_bus::EventBus;
use fxhash::FxHashSet;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

/// Collects ids dirtied during a burst and announces them once.
///
/// The first id of a burst schedules a flush on the current tokio runtime:
/// after one cooperative yield when the window is zero, after the window
/// otherwise. Outside a runtime there is nothing to schedule on, so every
/// call flushes inline and each id is announced in its own event; call
/// [`ChangeBatcher::flush`] from such hosts only to drain. Clones share the
/// pending batch.
#[derive(Debug, Clone)]
pub struct ChangeBatcher {
    inner: Arc<BatcherInner>,
}

#[derive(Debug)]
struct BatcherInner {
    events: EventBus,
    window: Duration,
    pending: Mutex<PendingBatch>,
}

#[derive(Debug, Default)]
struct PendingBatch {
    ids: Vec<String>,
    seen: FxHashSet<String>,
    scheduled: bool,
    /// Bumped by every flush so a stale scheduled task cannot cut a newer burst short.
    epoch: u64,
}

impl ChangeBatcher {
    pub fn new(events: EventBus, window: Duration) -> Self {
        Self {
            inner: Arc::new(BatcherInner { events, window, pending: Mutex::new(PendingBatch::default()) }),
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Records `id` as changed in the current burst.
    pub fn mark_dirty(&self, id: &str) {
        let schedule = {
            let mut pending = self.inner.pending.lock();
            if pending.seen.insert(id.to_owned()) {
                pending.ids.push(id.to_owned());
            }
            if pending.scheduled {
                None
            } else {
                pending.scheduled = true;
                Some(pending.epoch)
            }
        };

        let Some(epoch) = schedule else { return };
        match Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    if inner.window.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(inner.window).await;
                    }
                    inner.flush_epoch(Some(epoch));
                });
                trace!(id, window_ms = self.inner.window.as_millis(), "Flush scheduled");
            }
            Err(_) => {
                trace!(id, "No runtime, flushing inline");
                self.inner.flush_epoch(None);
            }
        }
    }

    /// Publishes the pending batch now. Returns the published event, if any.
    pub fn flush(&self) -> Option<PipelineChanged> {
        self.inner.flush_epoch(None)
    }

    /// Ids waiting for the next flush, in first-dirtied order.
    #[must_use]
    pub fn pending(&self) -> Vec<String> {
        self.inner.pending.lock().ids.clone()
    }
}

impl BatcherInner {
    fn flush_epoch(&self, expected: Option<u64>) -> Option<PipelineChanged> {
        let ids = {
            let mut pending = self.pending.lock();
            if expected.is_some_and(|epoch| epoch != pending.epoch) {
                return None;
            }
            pending.epoch = pending.epoch.wrapping_add(1);
            pending.scheduled = false;
            pending.seen.clear();
            std::mem::take(&mut pending.ids)
        };

        if ids.is_empty() {
            return None;
        }

        let event = PipelineChanged::pipeline(ids);
        match self.events.publish(event.clone()) {
            Ok(receivers) => debug!(ids = ?event.ids, receivers, "Pipeline change published"),
            Err(err) => warn!(error = %err, "Pipeline change not published"),
        }
        Some(event)
    }
}
