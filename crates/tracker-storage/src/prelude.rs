//! Commonly used types for convenient import.

pub use crate::cache::{Cache, CacheNamespace};
pub use crate::driver::{InMemoryStorageDriver, StorageDriver};
pub use crate::error::{StorageError, StorageResult};
pub use crate::index::{Index, IndexContext, IndexNaming};
pub use crate::records::{EventTypeMetadata, RuleRecord, SaveResult};
