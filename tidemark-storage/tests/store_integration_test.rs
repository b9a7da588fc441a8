//! Integration tests for `SqliteStore` against file-backed databases.

use chrono::NaiveDate;
use tempfile::TempDir;

use tidemark_core::errors::StorageError;
use tidemark_core::predicate::CompareOp;
use tidemark_core::schema::{Batch, LogicalType, Schema, Value};
use tidemark_core::{Predicate, TabularStore};
use tidemark_storage::SqliteStore;

fn temp_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("test.db").display().to_string()).unwrap();
    (dir, store)
}

fn prices_schema() -> Schema {
    Schema::new([
        ("id", LogicalType::Text),
        ("date", LogicalType::Timestamp),
        ("close", LogicalType::Real),
        ("volume", LogicalType::Integer),
        ("adjusted", LogicalType::Bool),
    ])
    .with_unique_constraint(["id"])
}

fn price_row(id: &str, day: u32, close: f64) -> Vec<Value> {
    vec![
        id.into(),
        NaiveDate::from_ymd_opt(2021, 1, day).unwrap().into(),
        close.into(),
        1_000.into(),
        true.into(),
    ]
}

#[test]
fn append_and_query_round_trip_preserves_types() {
    let (_dir, store) = temp_store();
    let schema = prices_schema();
    store.create_table("prices", &schema, None).unwrap();

    let mut batch = Batch::for_schema(&schema);
    batch.push(price_row("a", 4, 101.5)).unwrap();
    batch.push(price_row("b", 5, 102.25)).unwrap();
    assert_eq!(store.append("prices", &batch).unwrap(), 2);

    let all = store.query("prices", &Predicate::all()).unwrap();
    assert_eq!(all.len(), 2);
    schema.validate(&all).unwrap();
    assert_eq!(all.value(0, "close"), Some(&Value::Real(101.5)));
    assert_eq!(all.value(0, "adjusted"), Some(&Value::Bool(true)));
    assert_eq!(
        all.value(1, "date").and_then(|v| v.as_timestamp()),
        NaiveDate::from_ymd_opt(2021, 1, 5).unwrap().and_hms_opt(0, 0, 0)
    );
}

#[test]
fn predicate_filters_with_bound_parameters() {
    let (_dir, store) = temp_store();
    let schema = prices_schema();
    store.create_table("prices", &schema, None).unwrap();

    let mut batch = Batch::for_schema(&schema);
    for (id, day, close) in [("a", 4, 100.0), ("b", 5, 200.0), ("c", 6, 300.0)] {
        batch.push(price_row(id, day, close)).unwrap();
    }
    store.append("prices", &batch).unwrap();

    let filtered = store
        .query(
            "prices",
            &Predicate::all().and("close", CompareOp::Gt, 150.0),
        )
        .unwrap();
    assert_eq!(filtered.len(), 2);

    let cutoff = NaiveDate::from_ymd_opt(2021, 1, 6).unwrap();
    let deleted = store
        .delete("prices", &Predicate::all().and("date", CompareOp::Ge, cutoff))
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(store.query("prices", &Predicate::all()).unwrap().len(), 2);
}

#[test]
fn unique_violation_rolls_back_whole_append() {
    let (_dir, store) = temp_store();
    let schema = prices_schema();
    store
        .create_table("prices", &schema, Some(&["id".to_string()]))
        .unwrap();

    let mut first = Batch::for_schema(&schema);
    first.push(price_row("a", 4, 100.0)).unwrap();
    store.append("prices", &first).unwrap();

    let mut second = Batch::for_schema(&schema);
    second.push(price_row("b", 5, 200.0)).unwrap();
    second.push(price_row("a", 6, 300.0)).unwrap();
    match store.append("prices", &second) {
        Err(StorageError::UniqueViolation { table, .. }) => assert_eq!(table, "prices"),
        other => panic!("expected unique violation, got {other:?}"),
    }

    // The transaction rolled back: row "b" must not have survived.
    assert_eq!(store.query("prices", &Predicate::all()).unwrap().len(), 1);
}

#[test]
fn replace_substitutes_all_rows() {
    let (_dir, store) = temp_store();
    let schema = Schema::new([
        ("ticker", LogicalType::Text),
        ("domain", LogicalType::Text),
        ("collected_items", LogicalType::Integer),
    ]);
    store
        .create_table("prices_metadata", &schema, Some(&["ticker".to_string()]))
        .unwrap();

    let mut original = Batch::for_schema(&schema);
    original
        .push(vec!["SPY".into(), "/2021-01-01|2021-01-05".into(), 5.into()])
        .unwrap();
    store.replace("prices_metadata", &original).unwrap();

    let mut updated = Batch::for_schema(&schema);
    updated
        .push(vec!["SPY".into(), "/2021-01-01|2021-01-10".into(), 10.into()])
        .unwrap();
    updated
        .push(vec!["QQQ".into(), "/2021-02-01|2021-02-05".into(), 5.into()])
        .unwrap();
    store.replace("prices_metadata", &updated).unwrap();

    let all = store.query("prices_metadata", &Predicate::all()).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(
        all.value(0, "domain"),
        Some(&Value::from("/2021-01-01|2021-01-10"))
    );
}

#[test]
fn append_with_meta_is_atomic() {
    let (_dir, store) = temp_store();
    let schema = prices_schema();
    let meta_schema = Schema::new([
        ("ticker", LogicalType::Text),
        ("domain", LogicalType::Text),
        ("collected_items", LogicalType::Integer),
    ]);
    store.create_table("prices", &schema, None).unwrap();
    store
        .create_table("prices_metadata", &meta_schema, Some(&["ticker".to_string()]))
        .unwrap();

    let mut rows = Batch::for_schema(&schema);
    rows.push(price_row("a", 4, 100.0)).unwrap();

    // Metadata violating its own primary key forces the replace to fail;
    // the data append in the same transaction must roll back with it.
    let mut bad_meta = Batch::for_schema(&meta_schema);
    bad_meta
        .push(vec!["SPY".into(), "/".into(), 0.into()])
        .unwrap();
    bad_meta
        .push(vec!["SPY".into(), "/".into(), 0.into()])
        .unwrap();
    assert!(store
        .append_with_meta("prices", &rows, "prices_metadata", &bad_meta)
        .is_err());
    assert!(store.query("prices", &Predicate::all()).unwrap().is_empty());

    let mut meta = Batch::for_schema(&meta_schema);
    meta.push(vec!["SPY".into(), "/2021-01-04|2021-01-04".into(), 1.into()])
        .unwrap();
    let appended = store
        .append_with_meta("prices", &rows, "prices_metadata", &meta)
        .unwrap();
    assert_eq!(appended, 1);
    assert_eq!(store.query("prices", &Predicate::all()).unwrap().len(), 1);
    assert_eq!(
        store
            .query("prices_metadata", &Predicate::all())
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn missing_table_and_drop_idempotence() {
    let (_dir, store) = temp_store();
    assert!(!store.has_table("absent").unwrap());
    assert!(matches!(
        store.query("absent", &Predicate::all()),
        Err(StorageError::TableMissing { .. })
    ));

    let schema = prices_schema();
    store.create_table("prices", &schema, None).unwrap();
    assert!(store.has_table("prices").unwrap());
    // create is idempotent
    store.create_table("prices", &schema, None).unwrap();

    store.drop_table("prices").unwrap();
    assert!(!store.has_table("prices").unwrap());
    store.drop_table("prices").unwrap();
}

#[test]
fn join_aligns_tables_on_shared_column() {
    let (_dir, store) = temp_store();
    let prices = Schema::new([
        ("date", LogicalType::Timestamp),
        ("close", LogicalType::Real),
    ]);
    let weather = Schema::new([
        ("date", LogicalType::Timestamp),
        ("tavg", LogicalType::Real),
    ]);
    store.create_table("prices", &prices, None).unwrap();
    store.create_table("weather", &weather, None).unwrap();

    let day = |d: u32| Value::from(NaiveDate::from_ymd_opt(2021, 1, d).unwrap());
    let mut price_rows = Batch::for_schema(&prices);
    price_rows.push(vec![day(4), 100.0.into()]).unwrap();
    price_rows.push(vec![day(5), 101.0.into()]).unwrap();
    store.append("prices", &price_rows).unwrap();

    let mut weather_rows = Batch::for_schema(&weather);
    weather_rows.push(vec![day(4), 1.5.into()]).unwrap();
    store.append("weather", &weather_rows).unwrap();

    let joined = store
        .join(
            &["prices".to_string(), "weather".to_string()],
            "date",
            &[Predicate::all(), Predicate::all()],
        )
        .unwrap();
    assert_eq!(joined.columns(), ["date", "close", "tavg"]);
    assert_eq!(joined.len(), 2);
    assert_eq!(joined.value(0, "tavg"), Some(&Value::Real(1.5)));
    // Left-outer: the uncovered day survives with a null temperature.
    assert_eq!(joined.value(1, "tavg"), Some(&Value::Null));
}

#[test]
fn rejects_hostile_identifiers() {
    let (_dir, store) = temp_store();
    assert!(matches!(
        store.query("prices; DROP TABLE prices", &Predicate::all()),
        Err(StorageError::InvalidIdentifier { .. })
    ));
    let schema = prices_schema();
    store.create_table("prices", &schema, None).unwrap();
    assert!(store
        .query(
            "prices",
            &Predicate::all().and("close OR 1=1", CompareOp::Eq, 1i64)
        )
        .is_err());
}
