//! # Board Replay
//!
//! Mounts a pipeline board in a headless document, seeds the configured
//! record store and replays a scripted sequence of gestures and lifecycle
//! events against it. The resulting [`Report`] lists what every step did,
//! the change notifications published and the final wiring metrics.
//!
//! ## Scenario format
//! ```json
//! {
//!   "lanes": [{ "label": "New" }, { "stage": "qualified", "label": "Pre-Approved" }],
//!   "cards": [{ "id": "42", "lane": 0, "stage": "new", "fields": { "name": "Ada" } }],
//!   "steps": [
//!     { "action": "drag", "card": "42", "lane": 1 },
//!     { "action": "detach" },
//!     { "action": "render" }
//!   ]
//! }
//! ```

use anyhow::{Context, Result, bail};
use crm::domain::board::{PipelineChanged, WiringMetrics};
use crm::domain::config::PipelineConfig;
use crm::events::EventBus;
use crm::pipeline::dom::{BoardDom, DataTransfer, DragEventKind, MemoryDocument, NodeId};
use crm::pipeline::port::RecordPort;
use crm::pipeline::{ContactRecord, DropOutcome, PipelineBoard};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// A scripted board session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub lanes: Vec<LaneSpec>,
    pub cards: Vec<CardSpec>,
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Reads a scenario from a JSON file.
    ///
    /// # Errors
    /// Fails if the file cannot be read or is not a valid scenario.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).with_context(|| format!("Reading scenario {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("Parsing scenario {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        for card in &self.cards {
            if card.lane >= self.lanes.len() {
                bail!("Card '{}' points at lane {} of {}", card.id, card.lane, self.lanes.len());
            }
        }
        for step in &self.steps {
            if let Step::Drag { card, lane } = step
                && *lane >= self.lanes.len()
            {
                bail!("Drag of '{card}' points at lane {lane} of {}", self.lanes.len());
            }
        }
        Ok(())
    }
}

/// One lane: a declared stage attribute, a visible label, or both.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LaneSpec {
    pub stage: Option<String>,
    pub label: Option<String>,
}

/// A card and the record behind it.
#[derive(Debug, Clone, Deserialize)]
pub struct CardSpec {
    pub id: String,
    pub lane: usize,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl CardSpec {
    fn record(&self) -> ContactRecord {
        let mut record = ContactRecord::new(self.id.as_str());
        record.stage.clone_from(&self.stage);
        record.extra.clone_from(&self.fields);
        record
    }
}

/// Something that happens to the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// `dragstart` on the card, then `dragover` and `drop` on the lane.
    Drag { card: String, lane: usize },
    /// The application switches to another view.
    Navigate { view: String },
    /// The board root is removed from the document.
    Detach,
    /// A render pass: the root is re-attached if needed and re-wired.
    Render,
}

/// What one step did.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: Step,
    /// Drop outcome for drags; `None` when no listener received the drop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DropOutcome>,
    pub metrics: WiringMetrics,
}

/// Result of a replay.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub steps: Vec<StepReport>,
    pub changes: Vec<PipelineChanged>,
    /// Wiring metrics after the last step, before the board is disposed.
    pub metrics: WiringMetrics,
    /// Stage of every scenario card as stored after the replay.
    pub stages: Map<String, Value>,
}

impl Report {
    /// Number of drags that moved a card.
    #[must_use]
    pub fn moved(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.as_ref().is_some_and(DropOutcome::is_moved)).count()
    }
}

#[derive(Debug)]
struct Stage {
    doc: MemoryDocument,
    shell: NodeId,
    root: NodeId,
    lanes: Vec<NodeId>,
}

impl Stage {
    fn mount(scenario: &Scenario) -> Result<Self> {
        let doc = MemoryDocument::new();
        let shell = doc.create_element();
        let root = doc.create_element();
        doc.append(doc.document(), shell)?;
        doc.append(shell, root)?;

        let mut lanes = Vec::with_capacity(scenario.lanes.len());
        for spec in &scenario.lanes {
            let lane = doc.create_lane(spec.stage.as_deref(), spec.label.as_deref());
            doc.append(root, lane)?;
            lanes.push(lane);
        }
        for card in &scenario.cards {
            let node = doc.create_card(&card.id);
            doc.append(doc.lane_list(lanes[card.lane]), node)?;
        }
        Ok(Self { doc, shell, root, lanes })
    }

    async fn drag(&self, board: &PipelineBoard, card: &str, lane: usize) -> Option<DropOutcome> {
        let Some(node) = self.doc.find_card(self.root, card) else {
            warn!(card, "Card not on the board");
            return None;
        };
        let data = DataTransfer::new();
        let target = self.doc.lane_list(self.lanes[lane]);
        self.doc.dispatch(DragEventKind::DragStart, node, Some(data.clone())).await;
        self.doc.dispatch(DragEventKind::DragOver, target, Some(data.clone())).await;
        let report = self.doc.dispatch(DragEventKind::Drop, target, Some(data)).await;
        if report.delivered == 0 {
            debug!(card, "Drop reached no listener");
            return None;
        }
        board.wiring().controller().and_then(|controller| controller.last_outcome())
    }

    fn render(&self, board: &PipelineBoard) -> Result<()> {
        if !self.doc.is_connected(self.root) {
            self.doc.append(self.shell, self.root)?;
        }
        board.wire(Some(self.root));
        Ok(())
    }
}

/// Replays `scenario` against a board composed from `config`.
///
/// Records are seeded into the configured store before the board is wired;
/// existing records with the same ids are replaced.
///
/// # Errors
/// Fails if the scenario is inconsistent, the store cannot be seeded or read
/// back, or the board cannot be composed.
pub async fn run(config: &PipelineConfig, scenario: &Scenario) -> Result<Report> {
    scenario.validate()?;

    let store = crm::record_store(config);
    store.open().await.context("Opening record store")?;
    for card in &scenario.cards {
        store.put(card.record()).await.with_context(|| format!("Seeding record '{}'", card.id))?;
    }

    let stage = Stage::mount(scenario)?;
    let events = EventBus::new();
    let mut changes = events.subscribe::<PipelineChanged>()?;
    let board = crm::init(config, Arc::new(stage.doc.clone()), events)?;
    board.wire(Some(stage.root));
    info!(lanes = stage.lanes.len(), cards = scenario.cards.len(), "Board mounted");

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for step in &scenario.steps {
        let outcome = match step {
            Step::Drag { card, lane } => stage.drag(&board, card, *lane).await,
            Step::Navigate { view } => {
                board.navigate(view);
                None
            }
            Step::Detach => {
                stage.doc.remove(stage.root)?;
                None
            }
            Step::Render => {
                stage.render(&board)?;
                None
            }
        };
        steps.push(StepReport { step: step.clone(), outcome, metrics: board.metrics() });
    }

    tokio::task::yield_now().await;
    board.flush();
    let changes = drain(&mut changes);

    let mut stages = Map::new();
    for card in &scenario.cards {
        let stored = store.get(&card.id).await.with_context(|| format!("Reading record '{}'", card.id))?;
        let value = stored.and_then(|record| record.stage).map_or(Value::Null, Value::String);
        stages.insert(card.id.clone(), value);
    }

    let metrics = board.metrics();
    board.dispose();
    let report = Report { steps, changes, metrics, stages };
    info!(steps = report.steps.len(), moved = report.moved(), changes = report.changes.len(), "Replay finished");
    Ok(report)
}

fn drain(changes: &mut broadcast::Receiver<Arc<PipelineChanged>>) -> Vec<PipelineChanged> {
    let mut out = Vec::new();
    loop {
        match changes.try_recv() {
            Ok(event) => out.push(PipelineChanged::clone(&event)),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => warn!(skipped, "Change events dropped"),
            Err(_) => break,
        }
    }
    out
}
