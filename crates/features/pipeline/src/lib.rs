//! # Pipeline Board Engine
//!
//! Drag-and-drop synchronization for the CRM's pipeline board.
//!
//! ## Architecture
//!
//! 1.  **Canonicalization ([`stage`]):** maps any lane or stage label onto one
//!     stage of a closed registry.
//! 2.  **Persistence ([`router`], [`port`]):** a single optimistic
//!     read-modify-write through the richest injected record port pair.
//! 3.  **Notification ([`batcher`]):** one [`PipelineChanged`] per burst of
//!     successful writes.
//! 4.  **Wiring ([`wiring`], [`lifecycle`]):** idempotent listener
//!     installation on a board root and teardown once it goes away.
//! 5.  **Gestures ([`session`]):** `dragstart`, `dragover` and `drop`.
//!
//! The host document is reached through [`dom::BoardDom`]; [`board`] composes
//! everything from a [`PipelineConfig`](crm_domain::config::PipelineConfig).
//!
//! [`PipelineChanged`]: crm_domain::board::PipelineChanged

pub mod batcher;
pub mod board;
pub mod dom;
mod error;
pub mod lifecycle;
pub mod port;
pub mod record;
pub mod router;
pub mod session;
pub mod stage;
pub mod wiring;

pub use batcher::ChangeBatcher;
pub use board::{PipelineBoard, PipelineBoardBuilder};
pub use error::{PipelineError, PipelineErrorExt};
pub use record::ContactRecord;
pub use router::{PersistOutcome, PersistenceRouter};
pub use session::{DragController, DropOutcome};
pub use stage::StageRegistry;
pub use wiring::BoardWiring;
