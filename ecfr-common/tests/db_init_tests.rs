//! Tests for database initialization

use ecfr_common::db::init::init_database;
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("ecfr.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("ecfr.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO sections (id, title, chapter, part, section) VALUES ('a', '1', 'I', '1', '1.1')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    // Second open keeps existing rows
    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sections")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_natural_key_is_unique_with_absent_optional_levels() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("ecfr.db")).await.unwrap();

    sqlx::query("INSERT INTO sections (id, title, chapter, part, section) VALUES ('a', '1', 'I', '1', '1.1')")
        .execute(&pool)
        .await
        .unwrap();
    let duplicate = sqlx::query(
        "INSERT INTO sections (id, title, chapter, part, section) VALUES ('b', '1', 'I', '1', '1.1')",
    )
    .execute(&pool)
    .await;

    assert!(duplicate.is_err(), "Duplicate natural key must be rejected");
}
