use crate::batcher::ChangeBatcher;
use crate::dom::{BoardDom, NodeId};
use crate::error::PipelineError;
use crate::port::RecordPort;
use crate::router::PersistenceRouter;
use crate::stage::StageRegistry;
use crate::wiring::BoardWiring;
use crm_domain::board::{PipelineChanged, WiringMetrics};
use crm_domain::config::PipelineConfig;
use crm_event_bus::{EventBus, EventBusError};
use private::Sealed;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::info;

#[derive(Debug, Default)]
pub struct NoDom;
#[derive(Debug)]
pub struct WithDom(Arc<dyn BoardDom>);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoDom {}
impl Sealed for WithDom {}

/// Typestate builder of a [`PipelineBoard`]; a host document is required.
#[allow(private_bounds)]
#[derive(Debug)]
pub struct PipelineBoardBuilder<S: Sealed = NoDom> {
    state: S,
    config: PipelineConfig,
    events: Option<EventBus>,
    registry: Option<StageRegistry>,
    ports: Vec<Arc<dyn RecordPort>>,
}

impl Default for PipelineBoardBuilder<NoDom> {
    fn default() -> Self {
        Self { state: NoDom, config: PipelineConfig::default(), events: None, registry: None, ports: Vec::new() }
    }
}

#[allow(private_bounds)]
impl<S: Sealed> PipelineBoardBuilder<S> {
    #[must_use = "Sets the timing knobs and stage registry source"]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "Sets the bus change notifications are published on"]
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Uses `registry` instead of the one declared by the configuration.
    #[must_use = "Overrides the stage registry"]
    pub fn registry(mut self, registry: StageRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Appends a candidate record port; earlier ports take priority.
    #[must_use = "Adds a candidate record port"]
    pub fn port(mut self, port: Arc<dyn RecordPort>) -> Self {
        self.ports.push(port);
        self
    }
}

impl PipelineBoardBuilder<NoDom> {
    #[must_use = "Creates a new board builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the host document the board lives in"]
    pub fn dom(self, dom: Arc<dyn BoardDom>) -> PipelineBoardBuilder<WithDom> {
        PipelineBoardBuilder {
            state: WithDom(dom),
            config: self.config,
            events: self.events,
            registry: self.registry,
            ports: self.ports,
        }
    }
}

impl PipelineBoardBuilder<WithDom> {
    /// Composes registry, batcher, router and wiring.
    ///
    /// # Errors
    /// Returns [`PipelineError::InvalidRegistry`] if the configured stages
    /// or aliases are inconsistent.
    pub fn build(self) -> Result<PipelineBoard, PipelineError> {
        let Self { state: WithDom(dom), config, events, registry, ports } = self;

        let registry = Arc::new(match registry {
            Some(registry) => registry,
            None => StageRegistry::from_config(&config)?,
        });
        let events = events.unwrap_or_default();
        let batcher = ChangeBatcher::new(events.clone(), Duration::from_millis(config.board.coalesce_window_ms));
        let router = Arc::new(PersistenceRouter::new(Arc::clone(&registry), ports, batcher.clone()));
        let wiring = BoardWiring::new(
            dom,
            Arc::clone(&registry),
            Arc::clone(&router),
            Duration::from_millis(config.board.observer_window_ms),
        );

        info!(
            stages = registry.stages().len(),
            ports = router.candidates().len(),
            coalesce_window_ms = config.board.coalesce_window_ms,
            "Pipeline board composed"
        );
        Ok(PipelineBoard { config, registry, batcher, router, wiring, events })
    }
}

/// A fully composed pipeline board.
#[derive(Debug, Clone)]
pub struct PipelineBoard {
    config: PipelineConfig,
    registry: Arc<StageRegistry>,
    batcher: ChangeBatcher,
    router: Arc<PersistenceRouter>,
    wiring: BoardWiring,
    events: EventBus,
}

impl PipelineBoard {
    #[must_use]
    pub fn builder() -> PipelineBoardBuilder {
        PipelineBoardBuilder::new()
    }

    /// Render hook, see [`BoardWiring::wire`].
    pub fn wire(&self, root: Option<NodeId>) -> bool {
        self.wiring.wire(root)
    }

    /// See [`BoardWiring::navigate`].
    pub fn navigate(&self, view: &str) -> bool {
        self.wiring.navigate(view)
    }

    /// See [`BoardWiring::dispose`].
    pub fn dispose(&self) -> bool {
        self.wiring.dispose()
    }

    /// Persists a stage change outside a drag gesture.
    pub async fn persist(&self, id: &str, stage: &str) -> bool {
        self.router.persist(id, stage).await
    }

    /// Publishes pending change notifications now.
    pub fn flush(&self) -> Option<PipelineChanged> {
        self.batcher.flush()
    }

    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the bus registry is corrupted.
    pub fn subscribe_changes(&self) -> Result<broadcast::Receiver<Arc<PipelineChanged>>, EventBusError> {
        self.events.subscribe::<PipelineChanged>()
    }

    #[must_use]
    pub fn metrics(&self) -> WiringMetrics {
        self.wiring.metrics()
    }

    #[must_use]
    pub fn subscribe_metrics(&self) -> watch::Receiver<WiringMetrics> {
        self.wiring.subscribe_metrics()
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    #[must_use]
    pub fn router(&self) -> &PersistenceRouter {
        &self.router
    }

    #[must_use]
    pub const fn batcher(&self) -> &ChangeBatcher {
        &self.batcher
    }

    #[must_use]
    pub const fn wiring(&self) -> &BoardWiring {
        &self.wiring
    }

    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }
}
