//! Vector index lifecycle: collection naming, registry, storage backends, and builds.

mod manager;
pub mod memory;
pub mod naming;
pub mod registry;
pub mod store;
pub mod types;

pub use manager::IndexManager;
pub use memory::LocalVectorStore;
pub use naming::collection_name;
pub use registry::{CollectionRegistry, RegistryEntry};
pub use store::{
    CollectionInfo, CollectionSpec, DocumentSummary, IndexedPoint, StoreError, StoredHit,
    VectorStore,
};
pub use types::{CollectionHandle, IndexError};
