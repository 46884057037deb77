use crate::constants::CONTACTS;
use crate::stage::{StageDef, standard_aliases, standard_stages};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a pipeline board needs at composition time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfigInner {
    pub board: BoardConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
    /// Ordered stage registry; replaces the standard pipeline when present.
    pub stages: Vec<StageDef>,
    /// Alias label to stage key; replaces the standard alias table when present.
    pub aliases: BTreeMap<String, String>,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(flatten, default)]
    inner: Arc<PipelineConfigInner>,
}

impl Deref for PipelineConfig {
    type Target = PipelineConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for PipelineConfig {
    fn deref_mut(&mut self) -> &mut PipelineConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// Timing knobs of the drag-and-drop engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Coalescing window of change notifications. `0` means "next scheduler tick".
    pub coalesce_window_ms: u64,
    /// How long the detach observer stays armed after each install.
    pub observer_window_ms: u64,
}

/// Location of the file-backed record store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
    /// Extra `tracing` directives, e.g. `crm_pipeline=debug`.
    pub filter: Option<String>,
    /// Rolling file output directory; console only when absent.
    pub directory: Option<PathBuf>,
    /// Rotated files kept in `directory`.
    pub max_files: usize,
}

// --- Default ---

impl Default for PipelineConfigInner {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            store: StoreConfig::default(),
            log: LogConfig::default(),
            stages: standard_stages(),
            aliases: standard_aliases(),
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self { coalesce_window_ms: 0, observer_window_ms: 15_000 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data"), collection: CONTACTS.to_owned() }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), json: false, filter: None, directory: None, max_files: 7 }
    }
}
