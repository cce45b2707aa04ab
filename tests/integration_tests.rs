use std::sync::Arc;

use rentbook::exchange::{ImportMode, ImportPayload};
use rentbook::manager::RentalManager;
use rentbook::models::{Booking, Expense, Property, Record, Unit};
use rentbook::seed::SeedOutcome;
use rentbook::storage::{
    Collection, Document, Filter, InMemoryStorage, Page, StorageBackend, StorageError, TransactionId,
    INTERNAL_ID_FIELD,
};
use rentbook::SqliteStorage;
use serde_json::{json, Value};

fn memory_store() -> Arc<dyn StorageBackend> {
    Arc::new(InMemoryStorage::new())
}

fn sqlite_store() -> Arc<dyn StorageBackend> {
    Arc::new(SqliteStorage::open(":memory:").expect("Failed to open sqlite"))
}

fn property(id: &str, name: &str) -> Property {
    Property {
        id: id.to_string(),
        name: name.to_string(),
    }
}

fn unit(id: &str, property_id: &str) -> Unit {
    serde_json::from_value(json!({
        "id": id,
        "propertyId": property_id,
        "name": format!("Unit {}", id),
        "monthlyRate": 9000
    }))
    .unwrap()
}

fn booking(id: &str, unit_id: &str) -> Booking {
    serde_json::from_value(json!({
        "id": id,
        "unitId": unit_id,
        "firstName": "Guest",
        "checkIn": "2024-01-01",
        "checkout": "2024-02-01",
        "monthlyRate": 9000,
        "weeklyRate": 3000,
        "dailyRate": 500,
        "payments": [{"date": "2024-01-01", "amount": 9000}],
        "meterReadings": [{"date": "2024-01-01", "reading": 1200.5}]
    }))
    .unwrap()
}

fn expense(id: &str, property_id: Option<&str>, unit_id: Option<&str>) -> Expense {
    Expense {
        id: id.to_string(),
        date: "2024-03-01".to_string(),
        amount: 450.0,
        description: "Repair".to_string(),
        category: "Repairs".to_string(),
        property_id: property_id.map(str::to_string),
        unit_id: unit_id.map(str::to_string),
    }
}

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn ids<R: Record>(manager: &RentalManager) -> Vec<String> {
    manager
        .list::<R>(Page::ALL)
        .expect("Failed to list records")
        .iter()
        .map(|r| r.id().to_string())
        .collect()
}

fn create_then_delete_property(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    let created = manager.create(property("", "Bura Paradise")).unwrap();
    assert!(created.id.starts_with("prop-"));
    assert_eq!(ids::<Property>(&manager), vec![created.id.clone()]);

    manager.delete::<Property>(&created.id).unwrap();
    assert!(ids::<Property>(&manager).is_empty());
}

fn property_cascade(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    manager.create(property("prop-1", "Target")).unwrap();
    manager.create(property("prop-2", "Sibling")).unwrap();
    manager.create(unit("unit-1", "prop-1")).unwrap();
    manager.create(unit("unit-2", "prop-1")).unwrap();
    manager.create(unit("unit-3", "prop-2")).unwrap();
    manager.create(booking("book-1", "unit-1")).unwrap();
    manager.create(booking("book-2", "unit-2")).unwrap();
    manager.create(booking("book-3", "unit-3")).unwrap();
    manager.create(expense("expense-1", Some("prop-1"), None)).unwrap();
    manager.create(expense("expense-2", Some("prop-2"), None)).unwrap();
    manager.create(expense("expense-3", None, Some("unit-3"))).unwrap();

    let report = manager.delete_property_cascade("prop-1").unwrap();
    assert!(report.removed_parent);
    assert_eq!((report.units, report.bookings, report.expenses), (2, 2, 1));

    assert_eq!(ids::<Property>(&manager), vec!["prop-2"]);
    assert_eq!(ids::<Unit>(&manager), vec!["unit-3"]);
    assert_eq!(ids::<Booking>(&manager), vec!["book-3"]);
    assert_eq!(ids::<Expense>(&manager), vec!["expense-2", "expense-3"]);
}

fn unit_cascade(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    manager.create(property("prop-1", "Lily House")).unwrap();
    manager.create(unit("unit-1", "prop-1")).unwrap();
    manager.create(unit("unit-2", "prop-1")).unwrap();
    manager.create(booking("book-1", "unit-1")).unwrap();
    manager.create(booking("book-2", "unit-2")).unwrap();
    manager.create(expense("expense-1", None, Some("unit-1"))).unwrap();
    manager.create(expense("expense-2", None, Some("unit-2"))).unwrap();
    manager.create(expense("expense-3", Some("prop-1"), None)).unwrap();

    manager.delete::<Unit>("unit-1").unwrap();

    assert_eq!(ids::<Property>(&manager), vec!["prop-1"]);
    assert_eq!(ids::<Unit>(&manager), vec!["unit-2"]);
    assert_eq!(ids::<Booking>(&manager), vec!["book-2"]);
    assert_eq!(ids::<Expense>(&manager), vec!["expense-2", "expense-3"]);
}

fn leaf_deletes_do_not_cascade(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    manager.create(unit("unit-1", "prop-1")).unwrap();
    manager.create(booking("book-1", "unit-1")).unwrap();
    manager.create(booking("book-2", "unit-1")).unwrap();
    manager.create(expense("expense-1", Some("prop-1"), Some("unit-1"))).unwrap();

    manager.delete::<Booking>("book-1").unwrap();
    manager.delete::<Expense>("expense-1").unwrap();
    manager.delete::<Booking>("book-404").unwrap();

    assert_eq!(ids::<Unit>(&manager), vec!["unit-1"]);
    assert_eq!(ids::<Booking>(&manager), vec!["book-2"]);
    assert!(ids::<Expense>(&manager).is_empty());
}

fn update_forces_path_id(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    manager.create(unit("unit-42", "prop-1")).unwrap();

    let mut payload = unit("other-id", "prop-1");
    payload.name = "Renamed".to_string();
    payload.monthly_rate = 12000.0;
    let updated = manager.update("unit-42", payload).unwrap();
    assert_eq!(updated.id, "unit-42");

    let units = manager.list::<Unit>(Page::ALL).unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].id, "unit-42");
    assert_eq!(units[0].name, "Renamed");
    assert_eq!(units[0].monthly_rate, 12000.0);
}

fn export_import_round_trip(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    manager.initialize_sample_data().unwrap();
    manager.create(booking("book-1", "unit-2")).unwrap();
    manager.create(expense("expense-1", Some("prop-1"), Some("unit-2"))).unwrap();

    let exported = manager.export_all().unwrap();
    assert_eq!(exported.get(Collection::Properties).len(), 3);
    assert_eq!(exported.get(Collection::Units).len(), 5);
    for collection in Collection::ALL {
        assert!(exported
            .get(collection)
            .iter()
            .all(|d| !d.contains_key(INTERNAL_ID_FIELD)));
    }

    manager.import_all(ImportPayload::from(exported.clone())).unwrap();
    assert_eq!(manager.export_all().unwrap(), exported);
}

fn import_clears_all_collections(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    manager.create(property("prop-9", "Old")).unwrap();
    manager.create(unit("unit-1", "prop-9")).unwrap();

    let payload: ImportPayload =
        serde_json::from_value(json!({"properties": [{"id": "prop-1", "name": "A"}]})).unwrap();
    manager.import_all(payload).unwrap();

    let exported = manager.export_all().unwrap();
    assert_eq!(exported.properties, vec![doc(json!({"id": "prop-1", "name": "A"}))]);
    assert!(exported.units.is_empty(), "Units are cleared even without a units key");
}

fn import_replace_present_keeps_other_collections(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store).with_import_mode(ImportMode::ReplacePresent);
    manager.create(property("prop-9", "Old")).unwrap();
    manager.create(unit("unit-1", "prop-9")).unwrap();

    let payload: ImportPayload =
        serde_json::from_value(json!({"properties": [{"id": "prop-1", "name": "A"}]})).unwrap();
    manager.import_all(payload).unwrap();

    assert_eq!(ids::<Property>(&manager), vec!["prop-1"]);
    assert_eq!(ids::<Unit>(&manager), vec!["unit-1"]);
}

fn import_is_verbatim(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    let payload: ImportPayload = serde_json::from_value(json!({
        "properties": [{"id": "prop-1", "name": "A", "legacyCode": 17, "_id": "abc"}],
        "units": [],
        "expenses": [{"id": "expense-1", "date": "2024-01-01", "amount": 5, "description": "x"}]
    }))
    .unwrap();
    manager.import_all(payload).unwrap();

    let exported = manager.export_all().unwrap();
    assert_eq!(
        exported.properties,
        vec![doc(json!({"id": "prop-1", "name": "A", "legacyCode": 17}))]
    );
    // Defaults are not filled in on import, only when records are read back typed
    assert!(!exported.expenses[0].contains_key("category"));
    assert_eq!(manager.list::<Expense>(Page::ALL).unwrap()[0].category, "Repairs");
}

fn seed_is_idempotent(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    assert_eq!(manager.initialize_sample_data().unwrap(), SeedOutcome::Initialized);
    let properties = manager.storage().count(Collection::Properties).unwrap();
    let units = manager.storage().count(Collection::Units).unwrap();
    assert_eq!((properties, units), (3, 5));

    assert_eq!(manager.initialize_sample_data().unwrap(), SeedOutcome::AlreadyPresent);
    assert_eq!(manager.storage().count(Collection::Properties).unwrap(), properties);
    assert_eq!(manager.storage().count(Collection::Units).unwrap(), units);
}

fn seed_runs_when_only_units_exist(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    manager.create(unit("unit-77", "prop-77")).unwrap();

    assert_eq!(manager.initialize_sample_data().unwrap(), SeedOutcome::Initialized);
    assert_eq!(manager.storage().count(Collection::Units).unwrap(), 6);
}

fn list_pages(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    for i in 1..=5 {
        manager.create(property(&format!("prop-{}", i), "P")).unwrap();
    }
    let page = manager.list::<Property>(Page::new(1, 2)).unwrap();
    let page_ids: Vec<&str> = page.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(page_ids, vec!["prop-2", "prop-3"]);
    assert_eq!(manager.list::<Property>(Page::ALL).unwrap().len(), 5);
}

/// Delegates to a real store but fails every bulk delete on one collection.
struct FailingStore {
    inner: Arc<dyn StorageBackend>,
    fail_on: Collection,
}

impl StorageBackend for FailingStore {
    fn insert(&self, collection: Collection, doc: Document) -> Result<(), StorageError> {
        self.inner.insert(collection, doc)
    }
    fn insert_many(&self, collection: Collection, docs: Vec<Document>) -> Result<(), StorageError> {
        if collection == self.fail_on {
            return Err(StorageError::Other("injected insert failure".to_string()));
        }
        self.inner.insert_many(collection, docs)
    }
    fn replace(&self, collection: Collection, id: &str, doc: Document) -> Result<bool, StorageError> {
        self.inner.replace(collection, id, doc)
    }
    fn delete_by_id(&self, collection: Collection, id: &str) -> Result<bool, StorageError> {
        self.inner.delete_by_id(collection, id)
    }
    fn delete_by_filter(&self, collection: Collection, filter: &Filter) -> Result<usize, StorageError> {
        if collection == self.fail_on && *filter != Filter::All {
            return Err(StorageError::Other("injected delete failure".to_string()));
        }
        self.inner.delete_by_filter(collection, filter)
    }
    fn find(&self, collection: Collection, filter: &Filter, page: Page) -> Result<Vec<Document>, StorageError> {
        self.inner.find(collection, filter, page)
    }
    fn count(&self, collection: Collection) -> Result<usize, StorageError> {
        self.inner.count(collection)
    }
    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        self.inner.begin_transaction()
    }
    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.inner.commit_transaction(tx_id)
    }
    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.inner.rollback_transaction(tx_id)
    }
    fn ping(&self) -> Result<(), StorageError> {
        self.inner.ping()
    }
    fn close(&self) -> Result<(), StorageError> {
        self.inner.close()
    }
}

fn cascade_rolls_back_on_failure(store: Arc<dyn StorageBackend>) {
    let failing: Arc<dyn StorageBackend> = Arc::new(FailingStore {
        inner: store,
        fail_on: Collection::Bookings,
    });
    let manager = RentalManager::new(failing);
    manager.create(property("prop-1", "A")).unwrap();
    manager.create(unit("unit-1", "prop-1")).unwrap();
    manager.create(booking("book-1", "unit-1")).unwrap();

    assert!(manager.delete_property_cascade("prop-1").is_err());
    assert!(manager.delete_unit_cascade("unit-1").is_err());

    assert_eq!(ids::<Property>(&manager), vec!["prop-1"]);
    assert_eq!(ids::<Unit>(&manager), vec!["unit-1"]);
    assert_eq!(ids::<Booking>(&manager), vec!["book-1"]);
}

fn import_rolls_back_on_failure(store: Arc<dyn StorageBackend>) {
    let failing: Arc<dyn StorageBackend> = Arc::new(FailingStore {
        inner: store,
        fail_on: Collection::Units,
    });
    let manager = RentalManager::new(failing);
    manager.create(property("prop-9", "Old")).unwrap();

    let payload: ImportPayload = serde_json::from_value(json!({
        "properties": [{"id": "prop-1", "name": "A"}],
        "units": [{"id": "unit-1", "propertyId": "prop-1", "name": "U"}]
    }))
    .unwrap();
    assert!(manager.import_all(payload).is_err());

    assert_eq!(ids::<Property>(&manager), vec!["prop-9"], "Store is untouched after a failed import");
}

fn closed_store_fails(store: Arc<dyn StorageBackend>) {
    let manager = RentalManager::new(store);
    manager.create(property("prop-1", "A")).unwrap();
    manager.storage().close().unwrap();

    assert!(matches!(manager.list::<Property>(Page::ALL), Err(StorageError::Closed)));
    assert!(manager.delete_property_cascade("prop-1").is_err());
    assert!(manager.export_all().is_err());
    assert!(manager.storage().ping().is_err());
}

macro_rules! backend_tests {
    ($($name:ident),* $(,)?) => {
        paste::paste! {
            $(
                #[test]
                fn [<test_memory_ $name>]() {
                    $name(memory_store());
                }

                #[test]
                fn [<test_sqlite_ $name>]() {
                    $name(sqlite_store());
                }
            )*
        }
    };
}

backend_tests!(
    create_then_delete_property,
    property_cascade,
    unit_cascade,
    leaf_deletes_do_not_cascade,
    update_forces_path_id,
    export_import_round_trip,
    import_clears_all_collections,
    import_replace_present_keeps_other_collections,
    import_is_verbatim,
    seed_is_idempotent,
    seed_runs_when_only_units_exist,
    list_pages,
    cascade_rolls_back_on_failure,
    import_rolls_back_on_failure,
    closed_store_fails,
);
