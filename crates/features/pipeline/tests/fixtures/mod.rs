#![allow(dead_code)]

use crm_domain::board::PipelineChanged;
use crm_domain::config::PipelineConfig;
use crm_event_bus::EventBus;
use crm_pipeline::dom::{BoardDom, DataTransfer, DispatchReport, DragEventKind, MemoryDocument, NodeId};
use crm_pipeline::port::MemoryPort;
use crm_pipeline::{ContactRecord, DropOutcome, PipelineBoard};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Lane declared by stage attribute, label, or both.
#[derive(Debug, Clone, Copy)]
pub struct LaneSpec {
    pub stage: Option<&'static str>,
    pub label: Option<&'static str>,
}

pub const fn labelled(label: &'static str) -> LaneSpec {
    LaneSpec { stage: None, label: Some(label) }
}

pub const fn declared(stage: &'static str) -> LaneSpec {
    LaneSpec { stage: Some(stage), label: None }
}

/// A board mounted in a headless document, backed by one memory port.
#[derive(Debug)]
pub struct Harness {
    pub doc: MemoryDocument,
    pub port: MemoryPort,
    pub events: EventBus,
    pub changes: broadcast::Receiver<Arc<PipelineChanged>>,
    pub board: PipelineBoard,
    pub root: NodeId,
    pub lanes: Vec<NodeId>,
}

impl Harness {
    pub fn new(lanes: &[LaneSpec]) -> Self {
        Self::with_port(lanes, MemoryPort::new("memory"))
    }

    pub fn with_port(lanes: &[LaneSpec], port: MemoryPort) -> Self {
        let doc = MemoryDocument::new();
        let (root, lanes) = mount(&doc, lanes);
        let events = EventBus::new();
        let changes = events.subscribe::<PipelineChanged>().expect("subscribe changes");
        let board = PipelineBoard::builder()
            .config(PipelineConfig::default())
            .events(events.clone())
            .port(Arc::new(port.clone()))
            .dom(Arc::new(doc.clone()))
            .build()
            .expect("board builds");

        Self { doc, port, events, changes, board, root, lanes }
    }

    /// Seeds a record and puts its card in `lane`.
    pub fn card(&self, lane: usize, id: &str, stage: &str) -> NodeId {
        self.port.insert(ContactRecord::new(id).with_stage(stage));
        let card = self.doc.create_card(id);
        self.doc.append(self.doc.lane_list(self.lanes[lane]), card).expect("append card");
        card
    }

    pub fn wire(&self) -> bool {
        self.board.wire(Some(self.root))
    }

    /// `dragstart` on the card, then `dragover` and `drop` on the lane.
    pub async fn drag(&self, card: NodeId, lane: usize) -> Gesture {
        drag(&self.doc, card, self.lanes[lane]).await
    }

    pub fn last_outcome(&self) -> Option<DropOutcome> {
        self.board.wiring().controller().and_then(|c| c.last_outcome())
    }

    pub fn stored_stage(&self, id: &str) -> Option<String> {
        self.port.record(id).and_then(|r| r.stage)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Gesture {
    pub start: DispatchReport,
    pub over: DispatchReport,
    pub drop: DispatchReport,
}

pub async fn drag(doc: &MemoryDocument, card: NodeId, lane: NodeId) -> Gesture {
    let data = DataTransfer::new();
    let target = doc.lane_list(lane);
    let start = doc.dispatch(DragEventKind::DragStart, card, Some(data.clone())).await;
    let over = doc.dispatch(DragEventKind::DragOver, target, Some(data.clone())).await;
    let drop = doc.dispatch(DragEventKind::Drop, target, Some(data)).await;
    Gesture { start, over, drop }
}

/// Mounts a board root with the given lanes under the document.
pub fn mount(doc: &MemoryDocument, lanes: &[LaneSpec]) -> (NodeId, Vec<NodeId>) {
    let shell = doc.create_element();
    let root = doc.create_element();
    doc.append(doc.document(), shell).expect("mount shell");
    doc.append(shell, root).expect("mount root");

    let lanes = lanes
        .iter()
        .map(|spec| {
            let lane = doc.create_lane(spec.stage, spec.label);
            doc.append(root, lane).expect("mount lane");
            lane
        })
        .collect();
    (root, lanes)
}
