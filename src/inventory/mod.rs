//! Product inventory.
//!
//! Products live in a flat list persisted as one JSON array under a fixed
//! storage key. Import merges by barcode; export writes a dated JSON file.

mod product;
mod storage;
mod store;

pub use product::{generate_id, Product, ProductDraft, ValidationError};
pub use storage::{FileStorage, MemoryStorage, StorageBackend, StorageError};
pub use store::{export_file_name, ImportOutcome, InventoryError, ProductStore, STORAGE_KEY};
