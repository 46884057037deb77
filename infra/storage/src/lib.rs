//! Sandboxed file storage for board records.
//!
//! Every path is resolved against a canonical root and rejected if it would
//! escape it. Writes go through a unique temporary file, `fsync` and `rename`,
//! so a reader never observes a half-written record. Temporary files orphaned
//! by a crash are purged when the store connects.
//!
//! # Layout
//!
//! 1.  **[`Storage`]**: the thread-safe handle and entry point.
//! 2.  **[`Collection`]**: a named directory of records (`contacts/`, `deals/`).
//! 3.  **[`StorageBuilder`]**: a typestate builder for configuration.
//!
//! # Example
//!
//! ```rust
//! use crm_storage::{Storage, StorageError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("data");
//!     let storage = Storage::builder().root(&root).create(true).connect().await?;
//!
//!     let contacts = storage.collection("contacts")?;
//!     contacts.write("c-1.json", br#"{"id":"c-1"}"#).await?;
//!
//!     assert_eq!(contacts.keys("json").await?, vec!["c-1".to_owned()]);
//!     Ok(())
//! }
//! ```

mod builder;
mod collection;
mod engine;
mod error;
mod maintenance;
mod security;

pub use builder::StorageBuilder;
pub use collection::{Collection, CollectionName};
pub use engine::Storage;
pub use error::{StorageError, StorageErrorExt};
