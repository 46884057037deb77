//! Wire-level names shared by the engine, its hosts and its tests.

/// MIME type carrying the drag payload.
pub const DRAG_MIME: &str = "text/plain";

/// Scope of every change notification emitted by the board.
pub const PIPELINE_SCOPE: &str = "pipeline";

/// View name of the pipeline board for navigation checks.
pub const PIPELINE_VIEW: &str = "pipeline";

/// Default collection holding contact records.
pub const CONTACTS: &str = "contacts";
