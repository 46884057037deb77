//! One drag gesture: `dragstart`, `dragover`, `drop`.

use crate::dom::{BoardDom, BoardListener, DragEvent, DragEventKind, ListenerFuture, NodeId};
use crate::error::{PipelineError, PipelineErrorExt};
use crate::router::{PersistOutcome, PersistenceRouter};
use crate::stage::StageRegistry;
use crm_domain::board::DragPayload;
use crm_domain::constants::DRAG_MIME;
use crm_domain::stage::StageDef;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Where the current gesture stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    Dragging {
        id: String,
    },
    Dropped,
    Cancelled,
}

/// Why a drop did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InertReason {
    /// The drop target is not inside a lane.
    NoLane,
    /// The lane's stage does not resolve.
    UnresolvedStage,
    /// The event carries no drag data.
    MissingPayload,
    /// The drag data is not a contact reference.
    InvalidPayload,
}

/// What a drop did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DropOutcome {
    /// The stage was persisted (or already current) and the card moved.
    Moved { id: String, stage: String, write: PersistOutcome },
    /// Nothing was persisted and nothing moved.
    Inert { reason: InertReason },
    /// Persistence failed; the card stays where it was.
    Failed { id: String, stage: String, error: String },
}

impl DropOutcome {
    #[must_use]
    pub const fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

impl fmt::Display for DropOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moved { id, stage, write: PersistOutcome::Written } => write!(f, "moved {id} to {stage}"),
            Self::Moved { id, stage, write: PersistOutcome::Unchanged } => {
                write!(f, "kept {id} in {stage}")
            }
            Self::Inert { reason } => write!(f, "inert ({reason:?})"),
            Self::Failed { id, stage, error } => write!(f, "failed to move {id} to {stage}: {error}"),
        }
    }
}

/// Decodes the drag payload; only `contact` references are accepted.
///
/// # Errors
/// [`PipelineError::InvalidPayload`] when the text is not a contact payload.
pub fn decode_payload(raw: &str) -> Result<DragPayload, PipelineError> {
    serde_json::from_str(raw).context("Expected {\"type\":\"contact\",\"id\":\"...\"}")
}

/// Drives drag gestures on one board root.
///
/// Registered as the delegated listener of all three events.
#[derive(Debug)]
pub struct DragController {
    dom: Arc<dyn BoardDom>,
    registry: Arc<StageRegistry>,
    router: Arc<PersistenceRouter>,
    root: NodeId,
    phase: Mutex<GesturePhase>,
    last_outcome: Mutex<Option<DropOutcome>>,
}

impl DragController {
    pub fn new(
        dom: Arc<dyn BoardDom>,
        registry: Arc<StageRegistry>,
        router: Arc<PersistenceRouter>,
        root: NodeId,
    ) -> Self {
        Self {
            dom,
            registry,
            router,
            root,
            phase: Mutex::new(GesturePhase::Idle),
            last_outcome: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn phase(&self) -> GesturePhase {
        self.phase.lock().clone()
    }

    /// Outcome of the most recent drop.
    #[must_use]
    pub fn last_outcome(&self) -> Option<DropOutcome> {
        self.last_outcome.lock().clone()
    }

    /// Canonical stage of a lane: its declared attribute, else its label.
    #[must_use]
    pub fn lane_stage(&self, lane: NodeId) -> Option<&StageDef> {
        self.dom
            .stage_attr(lane)
            .and_then(|declared| self.registry.canonicalize(&declared))
            .or_else(|| self.dom.lane_label(lane).and_then(|label| self.registry.canonicalize(&label)))
    }

    /// Starts a gesture on the card under the event target.
    ///
    /// Returns `false` when the target is not a card with an id.
    pub fn drag_start(&self, event: &DragEvent) -> bool {
        let Some(id) = self.dom.closest_card(event.target()).and_then(|card| self.dom.card_id(card)) else {
            trace!(target = %event.target(), "Drag started outside a card");
            return false;
        };

        self.cancel();
        *self.phase.lock() = GesturePhase::Dragging { id: id.clone() };

        match (event.data_transfer(), serde_json::to_string(&DragPayload::contact(id.as_str()))) {
            (Some(data), Ok(payload)) => data.set_data(DRAG_MIME, payload),
            (None, _) => debug!(id = %id, "Drag event carries no data transfer"),
            (_, Err(err)) => warn!(id = %id, error = %err, "Drag payload not encoded"),
        }
        trace!(id = %id, "Drag started");
        true
    }

    /// Abandons an unfinished gesture. Returns `false` when none was running.
    pub fn cancel(&self) -> bool {
        let mut phase = self.phase.lock();
        let GesturePhase::Dragging { id } = &*phase else { return false };
        debug!(id = %id, "Gesture cancelled");
        *phase = GesturePhase::Cancelled;
        true
    }

    /// Accepts the drag over lanes whose stage resolves.
    pub fn drag_over(&self, event: &DragEvent) -> bool {
        let accepts = self.dom.closest_lane(event.target()).and_then(|lane| self.lane_stage(lane)).is_some();
        if accepts {
            event.prevent_default();
        }
        accepts
    }

    /// Persists the dropped card's new stage and moves it on success.
    ///
    /// Ends the gesture that was dragging when the drop arrived: `Dropped`
    /// once a write was attempted, `Cancelled` for inert drops. A gesture
    /// started while the write was in flight is left alone.
    pub async fn drop_card(&self, event: &DragEvent) -> DropOutcome {
        let gesture = self.phase();
        let outcome = self.resolve_drop(event).await;
        match &outcome {
            DropOutcome::Moved { .. } => info!(%outcome, "Drop handled"),
            DropOutcome::Inert { .. } => debug!(%outcome, "Drop ignored"),
            DropOutcome::Failed { .. } => warn!(%outcome, "Drop rejected"),
        }
        {
            let mut phase = self.phase.lock();
            if matches!(gesture, GesturePhase::Dragging { .. }) && *phase == gesture {
                *phase = match outcome {
                    DropOutcome::Inert { .. } => GesturePhase::Cancelled,
                    DropOutcome::Moved { .. } | DropOutcome::Failed { .. } => GesturePhase::Dropped,
                };
            }
        }
        *self.last_outcome.lock() = Some(outcome.clone());
        outcome
    }

    async fn resolve_drop(&self, event: &DragEvent) -> DropOutcome {
        let inert = |reason| DropOutcome::Inert { reason };

        let Some(lane) = self.dom.closest_lane(event.target()) else {
            return inert(InertReason::NoLane);
        };
        let Some(stage) = self.lane_stage(lane) else {
            return inert(InertReason::UnresolvedStage);
        };
        event.prevent_default();

        let Some(raw) = event.data_transfer().and_then(|data| data.get_data(DRAG_MIME)) else {
            return inert(InertReason::MissingPayload);
        };
        let payload = match decode_payload(&raw) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(error = %err, "Drop payload rejected");
                return inert(InertReason::InvalidPayload);
            }
        };
        let id = payload.id();

        match self.router.try_persist(id, &stage.label).await {
            Ok(write) => {
                self.place_card(id, lane, &stage.key);
                DropOutcome::Moved { id: id.to_owned(), stage: stage.key.clone(), write }
            }
            Err(err) => DropOutcome::Failed { id: id.to_owned(), stage: stage.key.clone(), error: err.to_string() },
        }
    }

    // The card may be gone if the board re-rendered while the write was in flight.
    fn place_card(&self, id: &str, lane: NodeId, key: &str) {
        let Some(card) = self.dom.find_card(self.root, id) else {
            debug!(id, "Card no longer on the board");
            return;
        };
        let list = self.dom.lane_list(lane);
        if let Err(err) = self.dom.move_card(card, list) {
            warn!(id, error = %err, "Card not moved");
            return;
        }
        self.dom.set_stage(card, key);
    }
}

impl BoardListener for DragController {
    fn handle(self: Arc<Self>, event: Arc<DragEvent>) -> ListenerFuture {
        Box::pin(async move {
            match event.kind() {
                DragEventKind::DragStart => {
                    self.drag_start(&event);
                }
                DragEventKind::DragOver => {
                    self.drag_over(&event);
                }
                DragEventKind::Drop => {
                    self.drop_card(&event).await;
                }
            }
        })
    }
}
