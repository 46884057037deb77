//! Optimistic stage persistence over injected record ports.

use crate::batcher::ChangeBatcher;
use crate::error::{PipelineError, PipelineErrorExt};
use crate::port::RecordPort;
use crate::stage::{StageRegistry, unresolved};
use crm_domain::board::PortCapabilities;
use crm_kernel::clock::epoch_millis;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a successful [`PersistenceRouter::try_persist`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistOutcome {
    /// The record moved to the new stage.
    Written,
    /// The record already sat in the target stage; nothing was written.
    Unchanged,
}

/// Reader and writer chosen for one read-modify-write.
#[derive(Debug, Clone)]
pub struct RoutedPorts {
    pub reader: Arc<dyn RecordPort>,
    pub writer: Arc<dyn RecordPort>,
}

impl RoutedPorts {
    /// Whether one port serves both directions.
    #[must_use]
    pub fn is_unified(&self) -> bool {
        Arc::ptr_eq(&self.reader, &self.writer)
    }
}

/// Moves records between stages through the richest available port pair.
#[derive(Debug, Clone)]
pub struct PersistenceRouter {
    registry: Arc<StageRegistry>,
    candidates: Vec<Arc<dyn RecordPort>>,
    batcher: ChangeBatcher,
}

impl PersistenceRouter {
    /// `candidates` are in priority order.
    pub fn new(
        registry: Arc<StageRegistry>,
        candidates: Vec<Arc<dyn RecordPort>>,
        batcher: ChangeBatcher,
    ) -> Self {
        Self { registry, candidates, batcher }
    }

    #[must_use]
    pub fn candidates(&self) -> &[Arc<dyn RecordPort>] {
        &self.candidates
    }

    #[must_use]
    pub const fn batcher(&self) -> &ChangeBatcher {
        &self.batcher
    }

    /// Picks the port pair a write goes through.
    ///
    /// The first candidate serving reads and writes wins outright. Otherwise
    /// the first reader is paired with the first writer.
    #[must_use]
    pub fn resolve(&self) -> Option<RoutedPorts> {
        let capable = |wanted: PortCapabilities| {
            self.candidates.iter().find(|port| port.capabilities().contains(wanted)).cloned()
        };

        if let Some(port) = capable(PortCapabilities::READ_WRITE) {
            return Some(RoutedPorts { reader: Arc::clone(&port), writer: port });
        }
        Some(RoutedPorts { reader: capable(PortCapabilities::READ)?, writer: capable(PortCapabilities::WRITE)? })
    }

    /// Moves record `id` to the stage `stage` resolves to.
    ///
    /// # Errors
    /// - [`PipelineError::NormalizationFailure`] if `stage` is not registered.
    /// - [`PipelineError::PersistenceUnavailable`] if no port pair can be
    ///   formed or opened.
    /// - [`PipelineError::RecordNotFound`] if the record is missing or unreadable.
    /// - [`PipelineError::WriteFailure`] if the write is rejected.
    pub async fn try_persist(&self, id: &str, stage: &str) -> Result<PersistOutcome, PipelineError> {
        let key = self.registry.canonical_key(stage).ok_or_else(|| unresolved(stage))?;

        let ports = self.resolve().ok_or_else(|| PipelineError::PersistenceUnavailable {
            message: "no readable and writable candidate".into(),
            context: Some(format!("{} candidate port(s) inspected", self.candidates.len()).into()),
        })?;

        self.open(&ports).await?;

        let mut record = match ports.reader.get(id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(PipelineError::RecordNotFound { id: id.to_owned(), context: None }),
            Err(err) => {
                debug!(id, port = ports.reader.name(), error = %err, "Record read failed");
                return Err(PipelineError::RecordNotFound {
                    id: id.to_owned(),
                    context: Some(format!("Unreadable: {err}").into()),
                });
            }
        };

        if record.is_at(key) {
            debug!(id, stage = key, "Record already in stage, write skipped");
            return Ok(PersistOutcome::Unchanged);
        }

        let from = record.stage.replace(key.to_owned());
        record.updated_at = Some(epoch_millis());
        ports.writer.put(record).await.context(format!("Writing through '{}'", ports.writer.name()))?;

        info!(id, from = from.as_deref().unwrap_or("-"), stage = key, "Record stage persisted");
        self.batcher.mark_dirty(id);
        Ok(PersistOutcome::Written)
    }

    /// [`PersistenceRouter::try_persist`] reduced to success or failure.
    ///
    /// Never fails loudly: every error is logged and reported as `false`.
    pub async fn persist(&self, id: &str, stage: &str) -> bool {
        match self.try_persist(id, stage).await {
            Ok(_) => true,
            Err(err) => {
                warn!(id, stage, error = %err, "Stage change not persisted");
                false
            }
        }
    }

    async fn open(&self, ports: &RoutedPorts) -> Result<(), PipelineError> {
        let mut targets = vec![&ports.reader];
        if !ports.is_unified() {
            targets.push(&ports.writer);
        }

        for port in targets {
            if let Err(err) = port.open().await {
                return Err(PipelineError::PersistenceUnavailable {
                    message: err.to_string().into(),
                    context: Some(format!("Opening port '{}'", port.name()).into()),
                });
            }
        }
        Ok(())
    }
}
