use crate::error::EventBusError;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Buffer size of every broadcast channel; slower receivers lag past it.
const CAPACITY: usize = 128;

/// Marker trait for types that can be sent across the [`EventBus`].
///
/// Any type that is `Send + Sync + 'static` automatically implements this trait.
pub trait Event: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Event for T {}

type Channels = FxHashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// A thread-safe fan-out event bus.
///
/// Holds one broadcast channel per event type, created on first use.
/// Cloning the bus shares the underlying registry.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    channels: Arc<RwLock<Channels>>,
}

impl EventBus {
    /// Creates a new, empty `EventBus`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to events of type `T`.
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the channel registry is corrupted.
    ///
    /// # Examples
    /// ```rust
    /// use crm_event_bus::EventBus;
    ///
    /// #[derive(Clone, Debug, PartialEq)]
    /// struct Moved(u64);
    ///
    /// # fn main() -> Result<(), crm_event_bus::EventBusError> {
    /// let bus = EventBus::new();
    /// let mut rx = bus.subscribe::<Moved>()?;
    /// assert_eq!(bus.publish(Moved(7))?, 1);
    /// assert_eq!(rx.try_recv().map(|m| m.0), Ok(7));
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe<T: Event>(&self) -> Result<broadcast::Receiver<Arc<T>>, EventBusError> {
        Ok(self.sender::<T>()?.subscribe())
    }

    /// Publishes an event. Returns the number of receivers reached.
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the channel registry is corrupted.
    pub fn publish<T: Event>(&self, event: T) -> Result<usize, EventBusError> {
        let count = self.sender::<T>()?.send(Arc::new(event)).unwrap_or_else(|_| {
            trace!(event = std::any::type_name::<T>(), "Event dropped: no active subscribers");
            0
        });
        if count > 0 {
            trace!(event = std::any::type_name::<T>(), count, "Event dispatched");
        }
        Ok(count)
    }

    fn sender<T: Event>(&self) -> Result<broadcast::Sender<Arc<T>>, EventBusError> {
        let id = TypeId::of::<T>();
        if let Some(slot) = self.channels.read().get(&id) {
            return downcast::<T>(&**slot);
        }

        let mut channels = self.channels.write();
        let slot = channels.entry(id).or_insert_with(|| {
            trace!(event = std::any::type_name::<T>(), capacity = CAPACITY, "Initializing broadcast channel");
            let (tx, _) = broadcast::channel::<Arc<T>>(CAPACITY);
            Box::new(tx)
        });
        downcast::<T>(&**slot)
    }
}

fn downcast<T: Event>(slot: &(dyn Any + Send + Sync)) -> Result<broadcast::Sender<Arc<T>>, EventBusError> {
    slot.downcast_ref::<broadcast::Sender<Arc<T>>>().cloned().ok_or_else(|| EventBusError::TypeMismatch {
        message: std::any::type_name::<T>().into(),
        context: Some("Unexpected event type".into()),
    })
}
