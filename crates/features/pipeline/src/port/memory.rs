use super::{PortError, PortFuture, RecordPort};
use crate::record::ContactRecord;
use crm_domain::board::PortCapabilities;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::trace;

/// In-memory record port.
///
/// Clones share the same records and counters. [`MemoryPort::view`] creates a
/// port over the same records with its own name, capabilities and counters,
/// which is how split reader/writer setups are modelled.
#[derive(Debug, Clone)]
pub struct MemoryPort {
    name: Arc<str>,
    capabilities: PortCapabilities,
    records: Arc<RwLock<FxHashMap<String, ContactRecord>>>,
    stats: Arc<PortStats>,
}

#[derive(Debug, Default)]
struct PortStats {
    opens: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    fail_open: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryPort {
    /// A read-write port with no records.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            capabilities: PortCapabilities::READ_WRITE,
            records: Arc::default(),
            stats: Arc::default(),
        }
    }

    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: PortCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Another port over the same records.
    #[must_use]
    pub fn view(&self, name: impl Into<Arc<str>>, capabilities: PortCapabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
            records: Arc::clone(&self.records),
            stats: Arc::default(),
        }
    }

    /// Seeds or replaces a record without counting a write.
    pub fn insert(&self, record: ContactRecord) {
        self.records.write().insert(record.id.clone(), record);
    }

    #[must_use]
    pub fn record(&self, id: &str) -> Option<ContactRecord> {
        self.records.read().get(id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn open_count(&self) -> u64 {
        self.stats.opens.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.stats.reads.load(Ordering::Relaxed)
    }

    /// Number of successful `put` calls.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.stats.writes.load(Ordering::Relaxed)
    }

    pub fn fail_open(&self, fail: bool) {
        self.stats.fail_open.store(fail, Ordering::Relaxed);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.stats.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.stats.fail_writes.store(fail, Ordering::Relaxed);
    }

    fn injected(&self, flag: &AtomicBool, operation: &'static str) -> Result<(), PortError> {
        if flag.load(Ordering::Relaxed) {
            return Err(PortError::Unavailable {
                message: operation.into(),
                context: Some(format!("Failure injected into port '{}'", self.name).into()),
            });
        }
        Ok(())
    }

    fn require(&self, capability: PortCapabilities, operation: &'static str) -> Result<(), PortError> {
        if self.capabilities.contains(capability) {
            return Ok(());
        }
        Err(PortError::Unavailable {
            message: operation.into(),
            context: Some(format!("Port '{}' does not support {operation}", self.name).into()),
        })
    }
}

impl RecordPort for MemoryPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> PortCapabilities {
        self.capabilities
    }

    fn open(&self) -> PortFuture<'_, ()> {
        let result = self.injected(&self.stats.fail_open, "open").map(|()| {
            self.stats.opens.fetch_add(1, Ordering::Relaxed);
        });
        Box::pin(std::future::ready(result))
    }

    fn get<'a>(&'a self, id: &'a str) -> PortFuture<'a, Option<ContactRecord>> {
        let result = self
            .require(PortCapabilities::READ, "get")
            .and_then(|()| self.injected(&self.stats.fail_reads, "get"))
            .map(|()| {
                self.stats.reads.fetch_add(1, Ordering::Relaxed);
                trace!(port = %self.name, id, "Memory read");
                self.record(id)
            });
        Box::pin(std::future::ready(result))
    }

    fn put(&self, record: ContactRecord) -> PortFuture<'_, ()> {
        let result = self
            .require(PortCapabilities::WRITE, "put")
            .and_then(|()| self.injected(&self.stats.fail_writes, "put"))
            .map(|()| {
                trace!(port = %self.name, id = %record.id, "Memory write");
                self.insert(record);
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
            });
        Box::pin(std::future::ready(result))
    }
}
