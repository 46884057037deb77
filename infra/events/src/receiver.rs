use crate::bus::Event;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Receiving half of an [`EventBus`](crate::EventBus) subscription that
/// tolerates slow consumers.
pub trait EventReceiverExt<T> {
    /// Next event, or `None` once every sender is gone.
    ///
    /// Messages lost to lag are skipped and reported once the receiver
    /// catches up.
    fn recv(&mut self) -> impl Future<Output = Option<Arc<T>>> + Send;
}

impl<T: Event> EventReceiverExt<T> for broadcast::Receiver<Arc<T>> {
    async fn recv(&mut self) -> Option<Arc<T>> {
        let mut skipped = 0u64;

        loop {
            match Self::recv(self).await {
                Ok(event) => {
                    if skipped > 0 {
                        warn!(event = std::any::type_name::<T>(), skipped, "Receiver lagged behind the bus");
                    }
                    return Some(event);
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    skipped = skipped.saturating_add(n);
                    debug!(event = std::any::type_name::<T>(), skipped, "Skipping lagged events");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
