//! Facade crate for the CRM pipeline board.
//! Re-exports the domain, kernel and engine crates and composes a board from
//! one [`PipelineConfig`]. Keep this crate thin: it wires crates together,
//! the engine logic lives in `crm-pipeline`.
//!
//! ## Usage
//! - [`load`] reads the layered configuration.
//! - [`init_logging`] installs the tracing subscriber described by its `log` section.
//! - [`init`] builds a [`PipelineBoard`] over the configured record store.

mod error;

pub use crate::error::{InitError, InitErrorExt};
pub use crm_domain as domain;
pub use crm_event_bus as events;
pub use crm_kernel as kernel;
pub use crm_pipeline as pipeline;
pub use crm_storage as storage;

use crm_domain::config::{LogConfig, PipelineConfig};
use crm_event_bus::EventBus;
use crm_logger::Logger;
use crm_pipeline::PipelineBoard;
use crm_pipeline::dom::BoardDom;
use crm_pipeline::port::StoragePort;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Loads the board configuration from `path` (or `./board.*`) layered with
/// `CRM__` environment overrides.
///
/// # Errors
/// Returns [`InitError::Config`] if the file is missing or malformed.
pub fn load(path: Option<&Path>) -> Result<PipelineConfig, InitError> {
    crm_kernel::config::load_config(path).context("Loading board configuration")
}

/// Installs the global tracing subscriber for `name` from a `log` section.
///
/// # Errors
/// Returns [`InitError::Logger`] for an unknown level or when a subscriber
/// is already installed.
pub fn init_logging(name: &str, log: &LogConfig) -> Result<Logger, InitError> {
    let level = Logger::parse_level(&log.level)?;
    let mut builder = Logger::builder().name(name).level(level).json(log.json).console(true);
    if let Some(filter) = &log.filter {
        builder = builder.env_filter(filter.as_str());
    }
    let logger = match &log.directory {
        Some(directory) => builder.path(directory).max_files(log.max_files).init(),
        None => builder.init(),
    };
    logger.context(format!("Logging for '{name}'"))
}

/// The record port described by the `store` section.
#[must_use]
pub fn record_store(config: &PipelineConfig) -> StoragePort {
    StoragePort::new(&config.store.data_dir, config.store.collection.as_str())
}

/// Composes a board living in `dom` over the configured record store.
///
/// # Errors
/// Returns [`InitError::Pipeline`] if the configured stage registry is invalid.
pub fn init(config: &PipelineConfig, dom: Arc<dyn BoardDom>, events: EventBus) -> Result<PipelineBoard, InitError> {
    let store = record_store(config);
    let board = PipelineBoard::builder()
        .config(config.clone())
        .events(events)
        .port(Arc::new(store))
        .dom(dom)
        .build()
        .context("Composing pipeline board")?;

    info!(
        data_dir = %config.store.data_dir.display(),
        collection = %config.store.collection,
        "Pipeline board ready"
    );
    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_domain::board::PipelineChanged;
    use crm_domain::stage::{StageDef, StageTone};
    use crm_pipeline::ContactRecord;
    use crm_pipeline::dom::MemoryDocument;
    use crm_pipeline::port::RecordPort;
    use serial_test::serial;
    use std::io::Write;

    fn config_in(dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.store.data_dir = dir.join("records");
        config
    }

    #[tokio::test]
    async fn init_persists_through_the_configured_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let store = record_store(&config);
        store.open().await.unwrap();
        store.put(ContactRecord::new("42").with_stage("new")).await.unwrap();

        let events = EventBus::new();
        let mut changes = events.subscribe::<PipelineChanged>().unwrap();
        let board = init(&config, Arc::new(MemoryDocument::new()), events).unwrap();

        assert!(board.persist("42", "Underwriting").await);
        let stored = store.get("42").await.unwrap().unwrap();
        assert_eq!(stored.stage.as_deref(), Some("negotiating"));
        assert_eq!(changes.recv().await.unwrap().ids, vec!["42".to_owned()]);
    }

    #[test]
    fn invalid_registry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.stages = vec![
            StageDef::new("new", "New", StageTone::Progress),
            StageDef::new("new", "Fresh", StageTone::Progress),
        ];

        let err = init(&config, Arc::new(MemoryDocument::new()), EventBus::new()).unwrap_err();
        assert!(matches!(err, InitError::Pipeline { .. }));
    }

    #[test]
    fn load_reads_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[board]\ncoalesce_window_ms = 25\n\n[store]\ncollection = \"leads\"").unwrap();

        let config = load(Some(path.as_path())).unwrap();
        assert_eq!(config.board.coalesce_window_ms, 25);
        assert_eq!(config.store.collection, "leads");
        assert_eq!(config.stages.len(), 6);
    }

    #[test]
    #[serial]
    fn unknown_log_level_is_rejected_before_install() {
        let log = LogConfig { level: "loud".into(), ..LogConfig::default() };
        assert!(matches!(init_logging("board", &log), Err(InitError::Logger { .. })));
    }

    #[test]
    #[serial]
    fn invalid_filter_is_rejected_before_install() {
        let log = LogConfig { filter: Some("crm_pipeline=loudest".into()), ..LogConfig::default() };
        assert!(matches!(init_logging("board", &log), Err(InitError::Logger { .. })));
    }

    #[test]
    #[serial]
    fn logging_installs_once_per_process() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogConfig {
            level: "debug".into(),
            json: true,
            filter: Some("crm_pipeline=trace".into()),
            directory: Some(dir.path().join("logs")),
            max_files: 2,
        };

        let logger = init_logging("board", &log).unwrap();
        assert!(logger.guard().is_some());
        assert!(dir.path().join("logs").is_dir());
        assert!(matches!(init_logging("board", &log), Err(InitError::Logger { .. })));
    }
}
