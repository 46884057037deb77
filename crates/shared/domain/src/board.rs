//! Messages and snapshots that cross the board engine's boundary.

use crate::constants::PIPELINE_SCOPE;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only data crossing the drag boundary: a typed record reference.
///
/// Serialized as `{"type":"contact","id":"<id>"}`; any other `type` fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DragPayload {
    Contact { id: String },
}

impl DragPayload {
    pub fn contact(id: impl Into<String>) -> Self {
        Self::Contact { id: id.into() }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Contact { id } => id,
        }
    }
}

/// Area of the application a change notification refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeScope {
    #[default]
    Pipeline,
}

impl ChangeScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pipeline => PIPELINE_SCOPE,
        }
    }
}

impl fmt::Display for ChangeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One coalesced "data changed" notification for a burst of successful moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineChanged {
    pub scope: ChangeScope,
    pub ids: Vec<String>,
}

impl PipelineChanged {
    #[must_use]
    pub const fn pipeline(ids: Vec<String>) -> Self {
        Self { scope: ChangeScope::Pipeline, ids }
    }
}

/// Connection state of the root a wiring manager is bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootState {
    Connected,
    Detached,
    #[default]
    None,
}

impl RootState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Detached => "detached",
            Self::None => "none",
        }
    }
}

impl fmt::Display for RootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a wiring record was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetachReason {
    /// The board root left the document.
    Disconnect,
    /// `install` was called with a different root.
    RootChanged,
    /// A render pass found no board root at all.
    NoRoot,
    /// The application navigated away from the pipeline view.
    Navigate,
    /// The owning view unmounted the board.
    Disposed,
}

impl DetachReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnect => "disconnect",
            Self::RootChanged => "root_changed",
            Self::NoRoot => "no_root",
            Self::Navigate => "navigate",
            Self::Disposed => "disposed",
        }
    }
}

impl fmt::Display for DetachReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostics snapshot of one wiring manager.
///
/// `attach - detach == active` holds for every published snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringMetrics {
    pub attach: u64,
    pub detach: u64,
    pub active: u64,
    pub columns: u64,
    pub root: RootState,
    pub last_detach_reason: Option<DetachReason>,
    pub timestamp_ms: i64,
}

bitflags! {
    /// Operations a record port can serve.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PortCapabilities: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;

        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}
