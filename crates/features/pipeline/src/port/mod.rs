//! Record ports: the typed seam between the board and whatever stores contacts.
//!
//! The router receives an ordered list of candidate ports and pairs a reader
//! with a writer from their advertised [`PortCapabilities`]; nothing is
//! discovered by name at runtime.

mod error;
mod memory;
mod storage;

pub use error::{PortError, PortErrorExt};
pub use memory::MemoryPort;
pub use storage::StoragePort;

use crate::record::ContactRecord;
use crm_domain::board::PortCapabilities;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`RecordPort`] methods.
pub type PortFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PortError>> + Send + 'a>>;

/// An asynchronous contact store.
///
/// Implementations must make [`RecordPort::open`] idempotent; the router
/// calls it before every read-modify-write.
pub trait RecordPort: fmt::Debug + Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn capabilities(&self) -> PortCapabilities;

    fn open(&self) -> PortFuture<'_, ()>;

    /// Reads a record; `Ok(None)` when the id is unknown.
    fn get<'a>(&'a self, id: &'a str) -> PortFuture<'a, Option<ContactRecord>>;

    /// Replaces the record stored under `record.id`.
    fn put(&self, record: ContactRecord) -> PortFuture<'_, ()>;
}

/// Rejects ids that are not a single, plain path component.
pub(crate) fn validate_key(id: &str) -> Result<&str, PortError> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(id)
    } else {
        Err(PortError::InvalidKey {
            key: id.to_owned(),
            context: Some("Record ids must be a single ASCII path component".into()),
        })
    }
}
