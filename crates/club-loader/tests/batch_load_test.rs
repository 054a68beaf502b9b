//! Integration tests for `BatchLoader` against a real PostgreSQL
//!
//! These tests require Docker. Run with:
//!
//! ```bash
//! cargo test -p club-loader --test batch_load_test -- --ignored --nocapture
//! ```

mod common;

use chrono::NaiveDate;
use club_loader::{
    DataTable, JobOutcome, LoadErrorKind, LoadPlan, LoadRequest, LoadSource, TableRef,
    UpdateColumns,
};
use common::{init_test_tracing, write_csv, TestPostgres};

const TICKETS_CSV: &str = "\
identrada,idsocio,precio,idevento,idpartido,idactividad
20240115001,11,1200,3,,
20240115002,12,1200,3,,
20240115003,13,800,,7,
20240115004,14,500,,,2
";

fn tickets(path: impl Into<std::path::PathBuf>) -> LoadRequest {
    LoadRequest::new(
        LoadSource::file(path),
        TableRef::new("raw", "entrada"),
        "identrada",
    )
}

fn dues(path: impl Into<std::path::PathBuf>) -> LoadRequest {
    LoadRequest::new(
        LoadSource::file(path),
        TableRef::new("raw", "cuota"),
        "idcuota",
    )
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_loading_same_batch_twice_is_idempotent() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "tickets_20240115.csv", TICKETS_CSV);
    let loader = pg.loader();

    let first = loader.batch_load(&tickets(&path)).await;
    assert!(first.success(), "first load failed: {:?}", first.error());
    assert_eq!(first.rows_loaded(), Some(4));
    assert_eq!(first.rows_processed(), Some(4));
    assert_eq!(first.total_rows_in_destination(), Some(4));
    let after_first = pg.tickets().await.unwrap();

    let second = loader.batch_load(&tickets(&path)).await;
    assert!(second.success(), "second load failed: {:?}", second.error());
    assert_eq!(second.rows_loaded(), Some(4));
    assert_eq!(second.total_rows_in_destination(), Some(4));

    assert_eq!(pg.tickets().await.unwrap(), after_first);
    assert_eq!(pg.count("raw.entrada").await.unwrap(), 4);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_partial_overlap_updates_and_inserts() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    sqlx::query(
        "INSERT INTO raw.entrada (identrada, idsocio, precio) VALUES \
         ('20240114001', 1, 900), ('20240115001', 11, 1), ('20240115002', 12, 1)",
    )
    .execute(pg.pool())
    .await
    .unwrap();

    let path = write_csv(dir.path(), "tickets_20240115.csv", TICKETS_CSV);
    let result = pg.loader().batch_load(&tickets(&path)).await;

    assert!(result.success(), "load failed: {:?}", result.error());
    assert_eq!(result.rows_processed(), Some(4));
    assert_eq!(result.rows_merged(), Some(4));
    assert_eq!(result.total_rows_in_destination(), Some(5));

    let rows = pg.tickets().await.unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0], ("20240114001".to_string(), Some(1), Some(900)));
    assert_eq!(rows[1], ("20240115001".to_string(), Some(11), Some(1200)));
    assert_eq!(rows[2], ("20240115002".to_string(), Some(12), Some(1200)));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_missing_source_fails_without_side_effects() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    let result = pg
        .loader()
        .batch_load(&tickets(dir.path().join("tickets_20240101.csv")))
        .await;

    assert!(!result.success());
    assert_eq!(result.error_kind(), Some(LoadErrorKind::SourceNotFound));
    assert!(result.error().unwrap().message.contains("tickets_20240101.csv"));
    assert_eq!(result.rows_loaded(), None);
    assert_eq!(pg.count("raw.entrada").await.unwrap(), 0);
    assert_eq!(pg.staging_tables("entrada").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_failed_merge_leaves_destination_unchanged() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    sqlx::query("INSERT INTO raw.cuota (idcuota, idsocio, precio, estado) VALUES ('C-1', 1, 3000, 0)")
        .execute(pg.pool())
        .await
        .unwrap();
    let before = pg.dues().await.unwrap();

    // The negative fee passes the copy and violates the CHECK during the merge
    let path = write_csv(
        dir.path(),
        "dues_20240115.csv",
        "idcuota,idsocio,precio,estado\nC-1,1,3500,1\nC-2,2,-10,0\nC-3,3,3000,0\n",
    );
    let result = pg.loader().batch_load(&dues(&path)).await;

    assert!(!result.success());
    assert_eq!(result.error_kind(), Some(LoadErrorKind::Upsert));
    assert_eq!(result.rows_loaded(), Some(3));
    assert_eq!(result.rows_merged(), None);
    assert_eq!(pg.dues().await.unwrap(), before);
    assert_eq!(pg.staging_tables("cuota").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_bad_value_fails_transfer() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    let path = write_csv(
        dir.path(),
        "tickets_20240115.csv",
        "identrada,idsocio,precio\n20240115001,11,1200\n20240115002,twelve,1200\n",
    );
    let result = pg.loader().batch_load(&tickets(&path)).await;

    assert!(!result.success());
    assert_eq!(result.error_kind(), Some(LoadErrorKind::Transfer));
    assert_eq!(result.rows_loaded(), None);
    assert_eq!(pg.count("raw.entrada").await.unwrap(), 0);
    assert_eq!(pg.staging_tables("entrada").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_duplicate_keys_in_batch_fail_merge() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    let path = write_csv(
        dir.path(),
        "tickets_20240115.csv",
        "identrada,idsocio,precio\n20240115001,11,1200\n20240115001,11,1300\n",
    );
    let result = pg.loader().batch_load(&tickets(&path)).await;

    assert!(!result.success());
    assert_eq!(result.error_kind(), Some(LoadErrorKind::Upsert));
    assert_eq!(pg.count("raw.entrada").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unknown_header_column_fails_transfer() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    let path = write_csv(
        dir.path(),
        "tickets_20240115.csv",
        "identrada,idsocio,descuento\n20240115001,11,10\n",
    );
    let result = pg.loader().batch_load(&tickets(&path)).await;

    assert!(!result.success());
    assert_eq!(result.error_kind(), Some(LoadErrorKind::Transfer));
    assert!(result.error().unwrap().message.contains("descuento"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_missing_destination_fails_schema_resolution() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "tickets_20240115.csv", TICKETS_CSV);

    let request = LoadRequest::new(
        LoadSource::file(&path),
        TableRef::new("raw", "asistencia"),
        "idasistencia",
    );
    let result = pg.loader().batch_load(&request).await;

    assert!(!result.success());
    assert_eq!(result.error_kind(), Some(LoadErrorKind::SchemaResolution));
    assert_eq!(result.destination(), "raw.asistencia");

    let request = LoadRequest::new(
        LoadSource::file(dir.path().join("attendance_20240115.csv")),
        TableRef::new("raw", "asistencia"),
        "idasistencia",
    );
    let result = pg.loader().batch_load(&request).await;
    assert_eq!(result.error_kind(), Some(LoadErrorKind::SourceNotFound));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unknown_primary_key_fails_before_copy() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "tickets_20240115.csv", TICKETS_CSV);

    let request = LoadRequest::new(
        LoadSource::file(&path),
        TableRef::new("raw", "entrada"),
        "ticket_id",
    );
    let result = pg.loader().batch_load(&request).await;

    assert!(!result.success());
    assert_eq!(result.error_kind(), Some(LoadErrorKind::SchemaResolution));
    assert_eq!(result.rows_loaded(), None);
    assert_eq!(pg.staging_tables("entrada").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_staging_tables_are_released() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "tickets_20240115.csv", TICKETS_CSV);
    let loader = pg.loader();

    for _ in 0..3 {
        let result = loader.batch_load(&tickets(&path)).await;
        assert!(result.success());
    }

    assert_eq!(pg.staging_tables("entrada").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_update_columns_limit_what_changes() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    sqlx::query("INSERT INTO raw.cuota (idcuota, idsocio, precio, estado) VALUES ('C-1', 1, 3000, 0)")
        .execute(pg.pool())
        .await
        .unwrap();

    let path = write_csv(
        dir.path(),
        "dues_20240115.csv",
        "idcuota,idsocio,precio,estado\nC-1,99,3500,1\nC-2,2,3000,0\n",
    );
    let request = dues(&path).with_update_columns(UpdateColumns::only(["precio"]));
    let result = pg.loader().batch_load(&request).await;

    assert!(result.success(), "load failed: {:?}", result.error());
    let rows = pg.dues().await.unwrap();
    assert_eq!(rows[0], ("C-1".to_string(), 1, 3500, 0));
    assert_eq!(rows[1], ("C-2".to_string(), 2, 3000, 0));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_columns_missing_from_source_take_defaults() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    let path = write_csv(
        dir.path(),
        "dues_20240115.csv",
        "precio,idcuota,idsocio\n3000,C-1,1\n",
    );
    let result = pg.loader().batch_load(&dues(&path)).await;

    assert!(result.success(), "load failed: {:?}", result.error());
    assert_eq!(pg.dues().await.unwrap(), vec![("C-1".to_string(), 1, 3000, 0)]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_partial_source_keeps_columns_it_does_not_carry() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    sqlx::query(
        "INSERT INTO raw.cuota (idcuota, idsocio, precio, fechavenc, estado) \
         VALUES ('C-1', 1, 3000, '2024-02-01', 1)",
    )
    .execute(pg.pool())
    .await
    .unwrap();

    let path = write_csv(
        dir.path(),
        "dues_20240115.csv",
        "idcuota,idsocio,precio\nC-1,1,3100\nC-2,2,2800\n",
    );
    let result = pg.loader().batch_load(&dues(&path)).await;

    assert!(result.success(), "load failed: {:?}", result.error());
    let rows: Vec<(String, i32, Option<NaiveDate>, i32)> = sqlx::query_as(
        "SELECT idcuota, precio, fechavenc, estado FROM raw.cuota ORDER BY idcuota",
    )
    .fetch_all(pg.pool())
    .await
    .unwrap();
    assert_eq!(
        rows,
        vec![
            ("C-1".to_string(), 3100, NaiveDate::from_ymd_opt(2024, 2, 1), 1),
            ("C-2".to_string(), 2800, None, 0),
        ]
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_update_column_absent_from_source_fails_before_copy() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    sqlx::query("INSERT INTO raw.cuota (idcuota, idsocio, precio, estado) VALUES ('C-1', 1, 3000, 1)")
        .execute(pg.pool())
        .await
        .unwrap();

    let path = write_csv(dir.path(), "dues_20240115.csv", "idcuota,idsocio,precio\nC-1,1,3100\n");
    let request = dues(&path).with_update_columns(UpdateColumns::only(["precio", "estado"]));
    let result = pg.loader().batch_load(&request).await;

    assert!(!result.success());
    assert_eq!(result.error_kind(), Some(LoadErrorKind::SchemaResolution));
    assert_eq!(result.rows_loaded(), None);
    assert_eq!(pg.dues().await.unwrap(), vec![("C-1".to_string(), 1, 3000, 1)]);
    assert_eq!(pg.staging_tables("cuota").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_concurrent_overlapping_loads_do_not_duplicate() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    let morning = write_csv(
        dir.path(),
        "tickets_20240115_am.csv",
        "identrada,idsocio,precio\n1,11,1000\n2,12,1000\n3,13,1000\n4,14,1000\n",
    );
    let evening = write_csv(
        dir.path(),
        "tickets_20240115_pm.csv",
        "identrada,idsocio,precio\n3,13,1500\n4,14,1500\n5,15,1500\n6,16,1500\n",
    );
    let (morning, evening) = (tickets(&morning), tickets(&evening));
    let loader = pg.loader();

    let (first, second) = tokio::join!(loader.batch_load(&morning), loader.batch_load(&evening));

    assert!(first.success(), "first load failed: {:?}", first.error());
    assert!(second.success(), "second load failed: {:?}", second.error());
    assert_eq!(first.rows_loaded(), Some(4));
    assert_eq!(second.rows_loaded(), Some(4));

    assert_eq!(pg.count("raw.entrada").await.unwrap(), 6);
    let rows = pg.tickets().await.unwrap();
    let keys: Vec<&str> = rows.iter().map(|(key, _, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["1", "2", "3", "4", "5", "6"]);
    for (key, _, precio) in &rows[2..4] {
        assert!(
            matches!(precio, Some(1000) | Some(1500)),
            "ticket {} has mixed price {:?}",
            key,
            precio
        );
    }
    assert_eq!(pg.staging_tables("entrada").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_in_memory_table_keeps_nulls_and_special_characters() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");

    let table = DataTable::new(["identrada", "idsocio", "precio"])
        .unwrap()
        .with_row([Some("tab\there"), None, Some("100")])
        .unwrap()
        .with_row([Some("line\nbreak"), Some("5"), None])
        .unwrap()
        .with_row([Some("back\\slash \\N"), Some("6"), Some("300")])
        .unwrap();

    let request = LoadRequest::new(table, TableRef::new("raw", "entrada"), "identrada");
    let result = pg.loader().batch_load(&request).await;

    assert!(result.success(), "load failed: {:?}", result.error());
    assert_eq!(result.rows_loaded(), Some(3));
    assert_eq!(result.source(), "in-memory table (3 rows)");

    let rows = pg.tickets().await.unwrap();
    assert!(rows.contains(&("tab\there".to_string(), None, Some(100))));
    assert!(rows.contains(&("line\nbreak".to_string(), Some(5), None)));
    assert!(rows.contains(&("back\\slash \\N".to_string(), Some(6), Some(300))));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_semicolon_delimited_file() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();

    let path = write_csv(
        dir.path(),
        "tickets_20240115.csv",
        "identrada;idsocio;precio\n20240115001;11;1200\n",
    );
    let request = LoadRequest::new(
        club_loader::FileSource::new(&path).with_delimiter(b';'),
        TableRef::new("raw", "entrada"),
        "identrada",
    );
    let result = pg.loader().batch_load(&request).await;

    assert!(result.success(), "load failed: {:?}", result.error());
    assert_eq!(
        pg.tickets().await.unwrap(),
        vec![("20240115001".to_string(), Some(11), Some(1200))]
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_daily_plan_skips_missing_feed() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "tickets_20240115.csv", TICKETS_CSV);

    let plan = LoadPlan::club_defaults(dir.path());
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let report = pg.loader().run_plan(&plan, date).await.unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.loaded().count(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert!(matches!(
        &report.outcomes[1],
        JobOutcome::Skipped { job, .. } if job == "dues"
    ));
    assert_eq!(pg.count("raw.entrada").await.unwrap(), 4);
}
