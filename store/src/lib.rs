//! Identity keys and blob persistence shared by the facetriage stores.
//!
//! Provides a trait-based blob store interface with an in-memory
//! implementation for testing and a directory-backed implementation that
//! rewrites whole files atomically (write to a temp file, fsync, rename).
//!
//! ```
//! use facetriage_store::{BlobStore, Identity, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.save("patients.json", b"{}").unwrap();
//! assert_eq!(store.load("patients.json").unwrap(), Some(b"{}".to_vec()));
//!
//! let id: Identity = "P1".parse().unwrap();
//! assert_eq!(id.as_str(), "P1");
//! ```

mod error;
mod file;
mod identity;
mod memory;

use std::fmt;

pub use error::{IdentityError, StoreError};
pub use file::{FileStore, DEFAULT_WRITE_ATTEMPTS};
pub use identity::Identity;
pub use memory::MemoryStore;

/// Result type for blob store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Whole-blob persistence keyed by name (e.g. `"patients.json"`).
///
/// `save` replaces the blob atomically: a concurrent or subsequent `load`
/// observes either the previous or the new content, never a mix.
pub trait BlobStore: Send + Sync {
    /// Returns the blob, or `None` if it has never been saved.
    fn load(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replaces the blob.
    fn save(&self, name: &str, data: &[u8]) -> StoreResult<()>;
}

impl fmt::Debug for dyn BlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobStore {{ ... }}")
    }
}
