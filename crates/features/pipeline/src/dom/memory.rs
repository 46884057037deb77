use super::{
    BoardDom, BoardListener, DataTransfer, DomError, DragEvent, DragEventKind, ListenerId,
    ListenerOptions, MutationCallback, NodeId, ObserverId,
};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

const DOCUMENT: NodeId = NodeId(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Document,
    Element,
    Lane,
    List,
    Card,
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    stage: Option<String>,
    label: Option<String>,
    record: Option<String>,
    draggable: bool,
}

impl Node {
    const fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            stage: None,
            label: None,
            record: None,
            draggable: false,
        }
    }
}

struct Registration {
    id: ListenerId,
    node: NodeId,
    kind: DragEventKind,
    options: ListenerOptions,
    listener: Arc<dyn BoardListener>,
}

struct Observation {
    id: ObserverId,
    node: NodeId,
    callback: MutationCallback,
}

struct DocumentState {
    next_node: u64,
    next_handle: u64,
    nodes: FxHashMap<NodeId, Node>,
    listeners: Vec<Registration>,
    observers: Vec<Observation>,
    listeners_supported: bool,
    observers_supported: bool,
}

impl fmt::Debug for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentState")
            .field("nodes", &self.nodes.len())
            .field("listeners", &self.listeners.len())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

/// Outcome of [`MemoryDocument::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that received the event.
    pub delivered: usize,
    pub default_prevented: bool,
}

/// Headless document tree implementing [`BoardDom`].
///
/// Node `0` is the document itself; a node is connected when its parent
/// chain reaches it. Structural changes (`append`, `remove`, `move_card`,
/// `touch`) notify every observer registered on an inclusive ancestor of the
/// changed node. Listeners and callbacks run after the internal lock is
/// released. Clones share the same tree.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    state: Arc<Mutex<DocumentState>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = FxHashMap::default();
        nodes.insert(DOCUMENT, Node::new(NodeKind::Document));
        Self {
            state: Arc::new(Mutex::new(DocumentState {
                next_node: 1,
                next_handle: 1,
                nodes,
                listeners: Vec::new(),
                observers: Vec::new(),
                listeners_supported: true,
                observers_supported: true,
            })),
        }
    }

    /// Simulates a host without an event listener API.
    pub fn disable_listeners(&self) {
        self.state.lock().listeners_supported = false;
    }

    /// Simulates a host without a mutation observer API.
    pub fn disable_observers(&self) {
        self.state.lock().observers_supported = false;
    }

    #[must_use]
    pub const fn document(&self) -> NodeId {
        DOCUMENT
    }

    /// A detached generic element (board container, wrapper, header).
    #[must_use]
    pub fn create_element(&self) -> NodeId {
        self.create(Node::new(NodeKind::Element))
    }

    /// A detached lane with its card list. `stage` is the declared stage
    /// attribute, `label` the text the lane shows.
    #[must_use]
    pub fn create_lane(&self, stage: Option<&str>, label: Option<&str>) -> NodeId {
        let mut lane = Node::new(NodeKind::Lane);
        lane.stage = stage.map(str::to_owned);
        lane.label = label.map(str::to_owned);
        let lane = self.create(lane);
        let list = self.create(Node::new(NodeKind::List));

        let mut state = self.state.lock();
        link(&mut state, lane, list);
        lane
    }

    /// A detached card carrying a record id.
    #[must_use]
    pub fn create_card(&self, id: &str) -> NodeId {
        let mut card = Node::new(NodeKind::Card);
        card.record = Some(id.to_owned());
        self.create(card)
    }

    /// Appends `child` to `parent`, detaching it from its previous parent.
    ///
    /// # Errors
    /// [`DomError::NodeNotFound`] for unknown nodes, [`DomError::Unsupported`]
    /// when `child` is an inclusive ancestor of `parent`.
    pub fn append(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let callbacks = {
            let mut state = self.state.lock();
            require(&state, parent)?;
            require(&state, child)?;
            if child == DOCUMENT || ancestors(&state, parent).contains(&child) {
                return Err(DomError::Unsupported {
                    api: "appendChild".into(),
                    context: Some("A node cannot be moved into its own subtree".into()),
                });
            }
            let previous = unlink(&mut state, child);
            link(&mut state, parent, child);

            let mut callbacks = previous.map(|p| observers_of(&state, p)).unwrap_or_default();
            callbacks.extend(observers_of(&state, parent));
            callbacks
        };
        notify(callbacks);
        Ok(())
    }

    /// Detaches `node` (and its subtree) from its parent.
    ///
    /// # Errors
    /// [`DomError::NodeNotFound`] for an unknown node.
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        let callbacks = {
            let mut state = self.state.lock();
            require(&state, node)?;
            unlink(&mut state, node).map(|parent| observers_of(&state, parent)).unwrap_or_default()
        };
        notify(callbacks);
        Ok(())
    }

    /// Reports a structural change below `node` without changing anything.
    pub fn touch(&self, node: NodeId) {
        let callbacks = observers_of(&self.state.lock(), node);
        notify(callbacks);
    }

    /// Dispatches an event at `target`, bubbling through every ancestor's
    /// listeners for `kind` and awaiting each of them in order.
    pub async fn dispatch(
        &self,
        kind: DragEventKind,
        target: NodeId,
        data_transfer: Option<DataTransfer>,
    ) -> DispatchReport {
        let listeners = {
            let state = self.state.lock();
            let path = ancestors(&state, target);
            path.iter()
                .flat_map(|node| {
                    state
                        .listeners
                        .iter()
                        .filter(move |r| r.node == *node && r.kind == kind)
                        .map(|r| Arc::clone(&r.listener))
                })
                .collect::<Vec<_>>()
        };

        let event = Arc::new(DragEvent::new(kind, target, data_transfer));
        for listener in &listeners {
            Arc::clone(listener).handle(Arc::clone(&event)).await;
        }
        trace!(%kind, %target, delivered = listeners.len(), "Event dispatched");

        DispatchReport { delivered: listeners.len(), default_prevented: event.default_prevented() }
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.state.lock().nodes.get(&node).map(|n| n.children.clone()).unwrap_or_default()
    }

    /// Listeners bound directly on `node`.
    #[must_use]
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.state.lock().listeners.iter().filter(|r| r.node == node).count()
    }

    #[must_use]
    pub fn total_listeners(&self) -> usize {
        self.state.lock().listeners.len()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    #[must_use]
    pub fn is_draggable(&self, node: NodeId) -> bool {
        self.state.lock().nodes.get(&node).is_some_and(|n| n.draggable)
    }

    fn create(&self, node: Node) -> NodeId {
        let mut state = self.state.lock();
        let id = NodeId(state.next_node);
        state.next_node += 1;
        state.nodes.insert(id, node);
        id
    }

    fn find_up(&self, node: NodeId, kind: NodeKind) -> Option<NodeId> {
        let state = self.state.lock();
        ancestors(&state, node).into_iter().find(|id| state.nodes.get(id).is_some_and(|n| n.kind == kind))
    }

    fn collect_down(&self, root: NodeId, kind: NodeKind) -> Vec<NodeId> {
        let state = self.state.lock();
        descendants(&state, root)
            .into_iter()
            .filter(|id| state.nodes.get(id).is_some_and(|n| n.kind == kind))
            .collect()
    }
}

impl BoardDom for MemoryDocument {
    fn is_connected(&self, node: NodeId) -> bool {
        let state = self.state.lock();
        state.nodes.contains_key(&node) && ancestors(&state, node).last() == Some(&DOCUMENT)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.state.lock().nodes.get(&node).and_then(|n| n.parent)
    }

    fn add_listener(
        &self,
        node: NodeId,
        kind: DragEventKind,
        listener: Arc<dyn BoardListener>,
        options: ListenerOptions,
    ) -> Result<ListenerId, DomError> {
        let mut state = self.state.lock();
        if !state.listeners_supported {
            return Err(DomError::Unsupported { api: "addEventListener".into(), context: None });
        }
        require(&state, node)?;

        let id = ListenerId(state.next_handle);
        state.next_handle += 1;
        state.listeners.push(Registration { id, node, kind, options, listener });
        Ok(id)
    }

    fn remove_listener(
        &self,
        node: NodeId,
        kind: DragEventKind,
        listener: ListenerId,
        options: ListenerOptions,
    ) -> Result<(), DomError> {
        let mut state = self.state.lock();
        let position = state
            .listeners
            .iter()
            .position(|r| r.id == listener && r.node == node && r.kind == kind && r.options == options);
        match position {
            Some(i) => {
                state.listeners.remove(i);
                Ok(())
            }
            None => Err(DomError::NodeNotFound {
                node,
                context: Some(Cow::Owned(format!("No {kind} listener matches the binding"))),
            }),
        }
    }

    fn observe(&self, node: NodeId, callback: MutationCallback) -> Result<ObserverId, DomError> {
        let mut state = self.state.lock();
        if !state.observers_supported {
            return Err(DomError::Unsupported { api: "MutationObserver".into(), context: None });
        }
        require(&state, node)?;

        let id = ObserverId(state.next_handle);
        state.next_handle += 1;
        state.observers.push(Observation { id, node, callback });
        Ok(id)
    }

    fn disconnect_observer(&self, observer: ObserverId) {
        self.state.lock().observers.retain(|o| o.id != observer);
    }

    fn closest_card(&self, node: NodeId) -> Option<NodeId> {
        self.find_up(node, NodeKind::Card)
    }

    fn find_card(&self, scope: NodeId, id: &str) -> Option<NodeId> {
        let state = self.state.lock();
        descendants(&state, scope).into_iter().find(|node| {
            state.nodes.get(node).is_some_and(|n| n.kind == NodeKind::Card && n.record.as_deref() == Some(id))
        })
    }

    fn card_id(&self, card: NodeId) -> Option<String> {
        self.state.lock().nodes.get(&card).and_then(|n| n.record.clone())
    }

    fn closest_lane(&self, node: NodeId) -> Option<NodeId> {
        self.find_up(node, NodeKind::Lane)
    }

    fn stage_attr(&self, node: NodeId) -> Option<String> {
        self.state.lock().nodes.get(&node).and_then(|n| n.stage.clone())
    }

    fn lane_label(&self, lane: NodeId) -> Option<String> {
        self.state.lock().nodes.get(&lane).and_then(|n| n.label.clone())
    }

    fn set_stage(&self, node: NodeId, key: &str) {
        if let Some(n) = self.state.lock().nodes.get_mut(&node) {
            n.stage = Some(key.to_owned());
        }
    }

    fn lane_list(&self, lane: NodeId) -> NodeId {
        let state = self.state.lock();
        state
            .nodes
            .get(&lane)
            .and_then(|n| {
                n.children
                    .iter()
                    .copied()
                    .find(|c| state.nodes.get(c).is_some_and(|child| child.kind == NodeKind::List))
            })
            .unwrap_or(lane)
    }

    fn move_card(&self, card: NodeId, container: NodeId) -> Result<(), DomError> {
        self.append(container, card)
    }

    fn lanes(&self, root: NodeId) -> Vec<NodeId> {
        self.collect_down(root, NodeKind::Lane)
    }

    fn cards(&self, root: NodeId) -> Vec<NodeId> {
        self.collect_down(root, NodeKind::Card)
    }

    fn set_draggable(&self, card: NodeId) {
        if let Some(n) = self.state.lock().nodes.get_mut(&card) {
            n.draggable = true;
        }
    }
}

fn require(state: &DocumentState, node: NodeId) -> Result<(), DomError> {
    if state.nodes.contains_key(&node) {
        Ok(())
    } else {
        Err(DomError::NodeNotFound { node, context: None })
    }
}

/// `node` followed by its parents, nearest first.
fn ancestors(state: &DocumentState, node: NodeId) -> Vec<NodeId> {
    let mut path = Vec::new();
    let mut cursor = state.nodes.contains_key(&node).then_some(node);
    while let Some(id) = cursor {
        path.push(id);
        cursor = state.nodes.get(&id).and_then(|n| n.parent);
    }
    path
}

/// Strict descendants of `root` in document order.
fn descendants(state: &DocumentState, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> =
        state.nodes.get(&root).map(|n| n.children.iter().rev().copied().collect()).unwrap_or_default();
    while let Some(id) = stack.pop() {
        out.push(id);
        if let Some(node) = state.nodes.get(&id) {
            stack.extend(node.children.iter().rev().copied());
        }
    }
    out
}

fn link(state: &mut DocumentState, parent: NodeId, child: NodeId) {
    if let Some(p) = state.nodes.get_mut(&parent) {
        p.children.push(child);
    }
    if let Some(c) = state.nodes.get_mut(&child) {
        c.parent = Some(parent);
    }
}

/// Detaches `child`, returning its former parent.
fn unlink(state: &mut DocumentState, child: NodeId) -> Option<NodeId> {
    let parent = state.nodes.get_mut(&child).and_then(|c| c.parent.take())?;
    if let Some(p) = state.nodes.get_mut(&parent) {
        p.children.retain(|c| *c != child);
    }
    Some(parent)
}

fn observers_of(state: &DocumentState, changed: NodeId) -> Vec<MutationCallback> {
    let path = ancestors(state, changed);
    state
        .observers
        .iter()
        .filter(|o| path.contains(&o.node))
        .map(|o| Arc::clone(&o.callback))
        .collect()
}

fn notify(callbacks: Vec<MutationCallback>) {
    for callback in callbacks {
        callback();
    }
}
