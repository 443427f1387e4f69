//! PostgreSQL end-to-end tests
//!
//! **Requirements**: Docker. Run with:
//! ```bash
//! cargo test -p tabload-core --test postgres_upload_tests -- --ignored
//! ```

mod common;

use chrono::NaiveDate;
use common::{init_test_tracing, pairs, TestPostgres};
use serde_json::json;
use tabload_common::{Dataset, Value};
use tabload_core::store::{StoreSession, TableStore};
use tabload_core::{
    read_existing, ColumnType, ErrorKind, PgStore, TableSchema, UploadMode, UploadOptions,
    UploadStep, Uploader,
};

fn mixed() -> Dataset {
    let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_micro_opt(9, 30, 0, 123_456))
        .unwrap();
    Dataset::from_columns(vec![
        ("id".to_string(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        ("big".to_string(), vec![Value::Int(2_147_483_648), Value::Null, Value::Int(-1)]),
        ("salary".to_string(), vec![Value::Float(50000.5), Value::Int(60000), Value::Float(f64::NAN)]),
        ("active".to_string(), vec![Value::Bool(true), Value::Bool(false), Value::Null]),
        ("joined".to_string(), vec![Value::Timestamp(ts), Value::Null, Value::Timestamp(ts)]),
        (
            "metadata".to_string(),
            vec![
                Value::from_json(json!({"level": "senior", "tags": ["a", "b"]})),
                Value::from_json(json!({"level": "junior"})),
                Value::Null,
            ],
        ),
        ("Order".to_string(), vec![Value::from("x"), Value::from("y\"z"), Value::Null]),
    ])
    .unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_upload_roundtrip_and_incremental_noop() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let uploader = Uploader::new(PgStore::new(pg.pool_clone()));

    let first = uploader.upload(&mixed(), "Employees").await.unwrap();
    assert_eq!(first.rows_written, 3);

    let second = uploader.upload(&mixed(), "Employees").await.unwrap();
    assert_eq!(second.rows_written, 0);

    let count: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "Employees""#)
        .fetch_one(pg.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 3);

    let types: Vec<(String, String)> = sqlx::query_as(
        "SELECT column_name, data_type FROM information_schema.columns \
         WHERE table_name = 'Employees' ORDER BY ordinal_position",
    )
    .fetch_all(pg.pool())
    .await
    .unwrap();
    let expected: Vec<(String, String)> = TableSchema::infer("Employees", &mixed())
        .columns
        .iter()
        .map(|c| (c.name.clone(), c.column_type.information_schema_name().to_string()))
        .collect();
    assert_eq!(types, expected);
    assert_eq!(
        TableSchema::infer("Employees", &mixed()).column_types(),
        vec![
            ColumnType::Integer32,
            ColumnType::Integer64,
            ColumnType::Float64,
            ColumnType::Boolean,
            ColumnType::Timestamp,
            ColumnType::Json,
            ColumnType::Text,
        ]
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_large_integral_floats_in_json_reupload_as_noop() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let uploader = Uploader::new(PgStore::new(pg.pool_clone()));
    let dataset = Dataset::from_columns(vec![(
        "meta".to_string(),
        vec![
            Value::from_json(json!({"x": 1e16})),
            Value::from_json(json!({"x": 2.0, "y": [1e17, 0.5]})),
        ],
    )])
    .unwrap();

    let first = uploader.upload(&dataset, "measurements").await.unwrap();
    let second = uploader.upload(&dataset, "measurements").await.unwrap();

    assert_eq!(first.rows_written, 2);
    assert_eq!(second.rows_written, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_existing_rows_read_back_in_requested_order() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let store = PgStore::new(pg.pool_clone());
    Uploader::new(store.clone())
        .upload(&pairs(&[("A", 1), ("B", 2)]), "pairs")
        .await
        .unwrap();

    let mut session = store.begin().await.unwrap();
    let existing = read_existing(&mut session, "pairs", &["n".to_string(), "name".to_string()])
        .await
        .unwrap();
    let missing = read_existing(&mut session, "absent", &["n".to_string()]).await.unwrap();
    session.rollback().await.unwrap();

    assert_eq!(existing.column_names(), vec!["n".to_string(), "name".to_string()]);
    assert_eq!(existing.num_rows(), 2);
    assert!(missing.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_incremental_after_partial_overlap() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let uploader = Uploader::new(PgStore::new(pg.pool_clone()));

    uploader.upload(&pairs(&[("A", 1), ("B", 2)]), "t").await.unwrap();
    let summary = uploader
        .upload(&pairs(&[("A", 1), ("B", 2), ("C", 3), ("C", 3)]), "t")
        .await
        .unwrap();

    assert_eq!(summary.rows_written, 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_type_conflict_rolls_back_everything() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    sqlx::query(r#"CREATE TABLE "people" ("meta" INTEGER)"#)
        .execute(pg.pool())
        .await
        .unwrap();

    let incoming = Dataset::from_columns(vec![(
        "meta".to_string(),
        vec![Value::from_json(json!({"level": "senior"}))],
    )])
    .unwrap();
    let err = Uploader::with_options(
        PgStore::new(pg.pool_clone()),
        UploadOptions::default().with_mode(UploadMode::Full),
    )
    .upload(&incoming, "people")
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaConflict);
    assert_eq!(err.step(), Some(UploadStep::WriteRows));

    let count: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "people""#)
        .fetch_one(pg.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_large_upload_spans_several_statements() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let uploader = Uploader::new(PgStore::new(pg.pool_clone()));

    let rows: Vec<Vec<Value>> = (0..40_000)
        .map(|i| vec![Value::Int(i), Value::from(format!("row-{}", i)), Value::Float(i as f64 / 3.0)])
        .collect();
    let dataset = Dataset::from_rows(vec!["id".into(), "label".into(), "ratio".into()], rows).unwrap();

    assert_eq!(uploader.upload(&dataset, "bulk").await.unwrap().rows_written, 40_000);
    assert_eq!(uploader.upload(&dataset, "bulk").await.unwrap().rows_written, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_health_check() {
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    tabload_core::db::health_check(pg.pool()).await.unwrap();
}
