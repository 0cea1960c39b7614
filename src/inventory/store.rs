//! Product store with JSON persistence, import and export.

use super::product::{Product, ProductDraft, ValidationError};
use super::storage::{StorageBackend, StorageError};
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage key holding the serialized product list.
pub const STORAGE_KEY: &str = "supermarket_products";

/// Errors from inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The draft failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The import file is unreadable or not a product array.
    #[error("invalid import data: {0}")]
    InvalidImport(String),
    /// Products could not be serialized.
    #[error("failed to serialize products: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The export file could not be written.
    #[error("failed to write export file: {0}")]
    Export(#[from] std::io::Error),
}

/// Result of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// This many new products were merged.
    Added(usize),
    /// Nothing in the file was new.
    NoNewData,
}

/// In-memory product list mirrored to a storage backend.
///
/// Lookups are linear; the list is small and kept in insertion order.
pub struct ProductStore<S: StorageBackend> {
    products: Vec<Product>,
    storage: S,
}

impl<S: StorageBackend> ProductStore<S> {
    /// Loads the product list from storage.
    ///
    /// A missing key gives an empty store. Unreadable or corrupt data is
    /// logged and also gives an empty store.
    pub fn load(storage: S) -> Self {
        let products = match storage.get(STORAGE_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<Product>>(&json) {
                Ok(products) => products,
                Err(e) => {
                    tracing::error!(error = %e, "Stored product data is corrupt, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read product data, starting empty");
                Vec::new()
            }
        };

        tracing::info!(count = products.len(), "Product store loaded");
        Self { products, storage }
    }

    /// All products in insertion order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Returns true if there are no products.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// The backing storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Validates a draft, adds it, and persists the list.
    ///
    /// Nothing changes if persisting fails.
    pub fn add(&mut self, draft: ProductDraft) -> Result<&Product, InventoryError> {
        let product = draft.into_product(Utc::now())?;
        self.products.push(product);
        if let Err(e) = self.save() {
            self.products.pop();
            return Err(e);
        }
        let product = &self.products[self.products.len() - 1];
        tracing::info!(barcode = %product.barcode, name = %product.name, "Product added");
        Ok(product)
    }

    /// Finds a product by exact barcode.
    pub fn find_by_barcode(&self, barcode: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.barcode == barcode)
    }

    /// Removes every product and the storage key.
    ///
    /// The in-memory list is only emptied once storage has been cleared.
    pub fn clear(&mut self) -> Result<(), InventoryError> {
        self.storage.remove(STORAGE_KEY)?;
        self.products.clear();
        tracing::info!("Product store cleared");
        Ok(())
    }

    /// Merges products from a JSON array.
    ///
    /// Records whose barcode is already stored, or that repeat a barcode
    /// earlier in the same file, are dropped without error.
    pub fn import_json(&mut self, json: &str) -> Result<ImportOutcome, InventoryError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| InventoryError::InvalidImport(e.to_string()))?;
        if !value.is_array() {
            return Err(InventoryError::InvalidImport(
                "expected a JSON array of products".into(),
            ));
        }
        let imported: Vec<Product> = serde_json::from_value(value)
            .map_err(|e| InventoryError::InvalidImport(e.to_string()))?;

        let total = imported.len();
        let mut seen: HashSet<String> = self.products.iter().map(|p| p.barcode.clone()).collect();
        let fresh: Vec<Product> = imported
            .into_iter()
            .filter(|p| seen.insert(p.barcode.clone()))
            .collect();

        if fresh.is_empty() {
            tracing::info!(records = total, "Import contained no new products");
            return Ok(ImportOutcome::NoNewData);
        }

        let added = fresh.len();
        let kept = self.products.len();
        self.products.extend(fresh);
        if let Err(e) = self.save() {
            self.products.truncate(kept);
            return Err(e);
        }

        tracing::info!(records = total, added, skipped = total - added, "Products imported");
        Ok(ImportOutcome::Added(added))
    }

    /// Reads and imports a JSON file.
    pub fn import_file(&mut self, path: impl AsRef<Path>) -> Result<ImportOutcome, InventoryError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| InventoryError::InvalidImport(e.to_string()))?;
        self.import_json(&json)
    }

    /// Serializes the full list as pretty-printed JSON.
    pub fn export_json(&self) -> Result<String, InventoryError> {
        Ok(serde_json::to_string_pretty(&self.products)?)
    }

    /// Writes an export file named for today's date into `dir`.
    pub fn export_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, InventoryError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(export_file_name(Utc::now().date_naive()));
        std::fs::write(&path, self.export_json()?)?;
        tracing::info!(path = %path.display(), count = self.products.len(), "Products exported");
        Ok(path)
    }

    fn save(&mut self) -> Result<(), InventoryError> {
        let json = serde_json::to_string(&self.products)?;
        self.storage.set(STORAGE_KEY, &json)?;
        tracing::trace!(count = self.products.len(), "Product store saved");
        Ok(())
    }
}

/// Export file name for a given date: `supermarket_products_YYYY-MM-DD.json`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("{}_{}.json", STORAGE_KEY, date.format("%Y-%m-%d"))
}
