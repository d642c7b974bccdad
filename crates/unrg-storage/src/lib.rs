//! Local directory storage for unregistry.
//!
//! This crate provides:
//! - Two flat namespaces (`files/`, `images/`) under a data root
//! - Streaming whole-object writes, staged then renamed into place, and chunked reads
//! - Listing and deletion with image suffix handling
//! - Name validation before any path is composed

pub mod error;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use store::{LocalStore, StoredObject, INCOMING_DIR, READ_CHUNK_SIZE};
