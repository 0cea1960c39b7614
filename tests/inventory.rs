//! Inventory persistence, import and export through the file backend.

use shelfscan::inventory::{
    export_file_name, FileStorage, ImportOutcome, InventoryError, ProductDraft, ProductStore,
};

fn draft(barcode: &str, name: &str, quantity: u32) -> ProductDraft {
    ProductDraft {
        barcode: barcode.into(),
        name: name.into(),
        purchase_price: 0.80,
        selling_price: 1.20,
        quantity,
    }
}

#[test]
fn test_products_survive_reload() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut store = ProductStore::load(FileStorage::new(dir.path()));
        store.add(draft("4001234567890", "Sparkling Water 1L", 24)).unwrap();
        store.add(draft("4009876543210", "Rye Bread", 6)).unwrap();
    }

    let store = ProductStore::load(FileStorage::new(dir.path()));
    assert_eq!(store.len(), 2);
    assert_eq!(
        store.find_by_barcode("4009876543210").unwrap().name,
        "Rye Bread"
    );
    assert!(dir.path().join("supermarket_products.json").exists());
}

#[test]
fn test_export_then_import_into_other_shop() {
    let shop_a = tempfile::tempdir().unwrap();
    let shop_b = tempfile::tempdir().unwrap();
    let exports = tempfile::tempdir().unwrap();

    let mut store_a = ProductStore::load(FileStorage::new(shop_a.path()));
    store_a.add(draft("111", "Apples", 40)).unwrap();
    store_a.add(draft("222", "Pears", 30)).unwrap();
    let path = store_a.export_to_dir(exports.path()).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        export_file_name(chrono::Utc::now().date_naive())
    );

    let mut store_b = ProductStore::load(FileStorage::new(shop_b.path()));
    store_b.add(draft("222", "Pears (local)", 5)).unwrap();

    assert_eq!(store_b.import_file(&path).unwrap(), ImportOutcome::Added(1));
    assert_eq!(store_b.len(), 2);
    // Existing record wins
    assert_eq!(store_b.find_by_barcode("222").unwrap().name, "Pears (local)");

    // Same file again brings nothing new
    assert_eq!(store_b.import_file(&path).unwrap(), ImportOutcome::NoNewData);

    let reloaded = ProductStore::load(FileStorage::new(shop_b.path()));
    assert_eq!(reloaded.len(), 2);
}

#[test]
fn test_empty_import_reports_no_new_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ProductStore::load(FileStorage::new(dir.path()));

    assert_eq!(store.import_json("[]").unwrap(), ImportOutcome::NoNewData);
    assert!(store.is_empty());
}

#[test]
fn test_invalid_import_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ProductStore::load(FileStorage::new(dir.path()));
    store.add(draft("333", "Milk", 12)).unwrap();

    let err = store.import_json(r#"{"barcode": "444"}"#).unwrap_err();
    assert!(matches!(err, InventoryError::InvalidImport(_)));

    let err = store.import_file(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, InventoryError::InvalidImport(_)));

    assert_eq!(store.len(), 1);
}

#[test]
fn test_clear_removes_persisted_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ProductStore::load(FileStorage::new(dir.path()));
    store.add(draft("555", "Eggs", 10)).unwrap();

    store.clear().unwrap();

    assert!(store.is_empty());
    assert!(!dir.path().join("supermarket_products.json").exists());
    assert!(ProductStore::load(FileStorage::new(dir.path())).is_empty());
}

#[test]
fn test_corrupt_store_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("supermarket_products.json"), "{not json").unwrap();

    let mut store = ProductStore::load(FileStorage::new(dir.path()));
    assert!(store.is_empty());

    // Next save overwrites the corrupt file
    store.add(draft("666", "Butter", 3)).unwrap();
    assert_eq!(ProductStore::load(FileStorage::new(dir.path())).len(), 1);
}
