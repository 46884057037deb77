use super::{PortError, PortErrorExt, PortFuture, RecordPort, validate_key};
use crate::record::ContactRecord;
use crm_domain::board::PortCapabilities;
use crm_storage::{Collection, Storage, StorageError};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const EXTENSION: &str = "json";

/// Record port over a `crm-storage` collection: one `<id>.json` file per contact.
///
/// The store is connected lazily on the first [`RecordPort::open`]; clones
/// share the connection.
#[derive(Debug, Clone)]
pub struct StoragePort {
    inner: Arc<StoragePortInner>,
}

#[derive(Debug)]
struct StoragePortInner {
    root: PathBuf,
    collection: String,
    handle: OnceCell<Collection>,
}

impl StoragePort {
    pub fn new(root: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StoragePortInner {
                root: root.into(),
                collection: collection.into(),
                handle: OnceCell::new(),
            }),
        }
    }

    /// Wraps an already connected collection.
    #[must_use]
    pub fn from_collection(collection: Collection) -> Self {
        let name = collection.name().to_owned();
        Self {
            inner: Arc::new(StoragePortInner {
                root: PathBuf::new(),
                collection: name,
                handle: OnceCell::new_with(Some(collection)),
            }),
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.handle.initialized()
    }

    /// Ids of every stored record, sorted.
    ///
    /// # Errors
    /// Returns [`PortError::Storage`] if the store cannot be opened or scanned.
    pub async fn ids(&self) -> Result<Vec<String>, PortError> {
        let collection = self.collection().await?;
        collection.keys(EXTENSION).await.context("Listing records")
    }

    async fn collection(&self) -> Result<&Collection, PortError> {
        self.inner
            .handle
            .get_or_try_init(|| async {
                let storage = Storage::builder().root(&self.inner.root).connect().await?;
                let collection = storage.collection(&self.inner.collection)?;
                info!(root = %storage.root().display(), collection = %collection.name(), "Record store connected");
                Ok::<_, StorageError>(collection)
            })
            .await
            .context("Connecting record store")
    }
}

fn file_name(id: &str) -> Result<String, PortError> {
    Ok(format!("{}.{EXTENSION}", validate_key(id)?))
}

impl RecordPort for StoragePort {
    fn name(&self) -> &str {
        &self.inner.collection
    }

    fn capabilities(&self) -> PortCapabilities {
        PortCapabilities::READ_WRITE
    }

    fn open(&self) -> PortFuture<'_, ()> {
        Box::pin(async move { self.collection().await.map(|_| ()) })
    }

    fn get<'a>(&'a self, id: &'a str) -> PortFuture<'a, Option<ContactRecord>> {
        Box::pin(async move {
            let file = file_name(id)?;
            let collection = self.collection().await?;
            let bytes = match collection.read(&file).await {
                Ok(bytes) => bytes,
                Err(StorageError::FileNotFound { .. }) => return Ok(None),
                Err(err) => return Err(err).context("Reading record"),
            };
            let record: ContactRecord = serde_json::from_slice(&bytes).context("Decoding record")?;
            debug!(collection = %collection.name(), id, "Record read");
            Ok(Some(record))
        })
    }

    fn put(&self, record: ContactRecord) -> PortFuture<'_, ()> {
        Box::pin(async move {
            let file = file_name(&record.id)?;
            let collection = self.collection().await?;
            let bytes = serde_json::to_vec_pretty(&record).context("Encoding record")?;
            collection.write(&file, &bytes).await.context("Writing record")?;
            debug!(collection = %collection.name(), id = %record.id, "Record written");
            Ok(())
        })
    }
}
