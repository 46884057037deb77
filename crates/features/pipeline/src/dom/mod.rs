//! Host document port.
//!
//! The engine never touches a concrete document. Everything it needs (node
//! connectivity, delegated listeners, subtree observers, card and lane
//! lookups, a few attribute writes) goes through [`BoardDom`].
//! [`MemoryDocument`] is the headless implementation used by tests and the
//! replay tool.

mod error;
mod memory;

pub use error::{DomError, DomErrorExt};
pub use memory::{DispatchReport, MemoryDocument};

use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Opaque identity of a node inside one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a registered listener, unique per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Handle of a registered mutation observer, unique per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// The three events the board engine listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragEventKind {
    DragStart,
    DragOver,
    Drop,
}

impl DragEventKind {
    pub const ALL: [Self; 3] = [Self::DragStart, Self::DragOver, Self::Drop];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DragStart => "dragstart",
            Self::DragOver => "dragover",
            Self::Drop => "drop",
        }
    }
}

impl fmt::Display for DragEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags a listener was registered with; removal must repeat them exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ListenerOptions {
    pub capture: bool,
    pub passive: bool,
}

/// Drag data shared by every event of one gesture, keyed by MIME type.
#[derive(Debug, Clone, Default)]
pub struct DataTransfer {
    items: Arc<Mutex<FxHashMap<String, String>>>,
}

impl DataTransfer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_data(&self, mime: &str, data: impl Into<String>) {
        self.items.lock().insert(mime.to_owned(), data.into());
    }

    #[must_use]
    pub fn get_data(&self, mime: &str) -> Option<String> {
        self.items.lock().get(mime).cloned()
    }
}

/// One dispatched drag event.
#[derive(Debug)]
pub struct DragEvent {
    kind: DragEventKind,
    target: NodeId,
    data_transfer: Option<DataTransfer>,
    default_prevented: AtomicBool,
}

impl DragEvent {
    #[must_use]
    pub const fn new(kind: DragEventKind, target: NodeId, data_transfer: Option<DataTransfer>) -> Self {
        Self { kind, target, data_transfer, default_prevented: AtomicBool::new(false) }
    }

    #[must_use]
    pub const fn kind(&self) -> DragEventKind {
        self.kind
    }

    #[must_use]
    pub const fn target(&self) -> NodeId {
        self.target
    }

    #[must_use]
    pub const fn data_transfer(&self) -> Option<&DataTransfer> {
        self.data_transfer.as_ref()
    }

    /// Marks the event as handled; on `dragover` this makes the target droppable.
    pub fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::Acquire)
    }
}

/// Future returned by a [`BoardListener`].
pub type ListenerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Callback bound to a node for one event kind.
pub trait BoardListener: fmt::Debug + Send + Sync {
    fn handle(self: Arc<Self>, event: Arc<DragEvent>) -> ListenerFuture;
}

/// Invoked after a structural change below an observed node.
pub type MutationCallback = Arc<dyn Fn() + Send + Sync>;

/// Everything the engine needs from the host document.
///
/// Implementations must not hold internal locks while invoking listeners or
/// mutation callbacks; callbacks may call back into the port.
pub trait BoardDom: fmt::Debug + Send + Sync {
    /// Whether the node is attached to the document.
    fn is_connected(&self, node: NodeId) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// # Errors
    /// [`DomError::Unsupported`] when the host has no listener API.
    fn add_listener(
        &self,
        node: NodeId,
        kind: DragEventKind,
        listener: Arc<dyn BoardListener>,
        options: ListenerOptions,
    ) -> Result<ListenerId, DomError>;

    /// Removes exactly the listener registered with these arguments.
    ///
    /// # Errors
    /// [`DomError::NodeNotFound`] when no such registration exists.
    fn remove_listener(
        &self,
        node: NodeId,
        kind: DragEventKind,
        listener: ListenerId,
        options: ListenerOptions,
    ) -> Result<(), DomError>;

    /// Observes structural changes of `node`'s subtree.
    ///
    /// # Errors
    /// [`DomError::Unsupported`] when the host has no observer API.
    fn observe(&self, node: NodeId, callback: MutationCallback) -> Result<ObserverId, DomError>;

    fn disconnect_observer(&self, observer: ObserverId);

    /// The card enclosing `node`, `node` included.
    fn closest_card(&self, node: NodeId) -> Option<NodeId>;

    /// The card carrying `id` below `scope`.
    fn find_card(&self, scope: NodeId, id: &str) -> Option<NodeId>;

    fn card_id(&self, card: NodeId) -> Option<String>;

    /// The lane enclosing `node`, `node` included.
    fn closest_lane(&self, node: NodeId) -> Option<NodeId>;

    /// Declared stage attribute of a lane or card.
    fn stage_attr(&self, node: NodeId) -> Option<String>;

    /// Text a lane can be recognised by: aria label first, then header text.
    fn lane_label(&self, lane: NodeId) -> Option<String>;

    /// Writes the stage attribute.
    fn set_stage(&self, node: NodeId, key: &str);

    /// The container cards of a lane live in; the lane itself when it has none.
    fn lane_list(&self, lane: NodeId) -> NodeId;

    /// Moves `card` to the end of `container`.
    ///
    /// # Errors
    /// [`DomError::NodeNotFound`] when either node is unknown.
    fn move_card(&self, card: NodeId, container: NodeId) -> Result<(), DomError>;

    /// Every lane below `root`, in document order.
    fn lanes(&self, root: NodeId) -> Vec<NodeId>;

    /// Every card below `root`, in document order.
    fn cards(&self, root: NodeId) -> Vec<NodeId>;

    fn set_draggable(&self, card: NodeId);
}
