//! Batch writer and SQLite store integration tests

mod helpers;

use ecfr_ingest::db::PersistenceSink;
use ecfr_ingest::metrics::{StandardTextMetrics, TextMetrics};
use ecfr_ingest::types::{AncestryPath, IdentityPrefix, SectionRecord};
use helpers::*;

fn ancestry(chapter: Option<&str>) -> AncestryPath {
    AncestryPath {
        title: Some("40".into()),
        chapter: chapter.map(String::from),
        subchapter: None,
        part: Some("60".into()),
        subpart: Some("A".into()),
    }
}

fn record(issue_date: &str, section: &str, content: &str) -> SectionRecord {
    let mut record = SectionRecord::new(
        date(issue_date),
        &ancestry(Some("I")),
        section,
        content.to_string(),
    );
    StandardTextMetrics.annotate(&mut record);
    record
}

#[tokio::test]
async fn test_identities_are_shared_across_dates() {
    let store = create_test_store().await;
    let writer = create_test_writer(&store, 2);

    let first: Vec<SectionRecord> = (1..=5)
        .map(|n| record("2023-01-03", &format!("60.{}", n), "The owner shall comply."))
        .collect();
    let second: Vec<SectionRecord> = (1..=5)
        .map(|n| record("2024-01-03", &format!("60.{}", n), "The owner must comply."))
        .collect();

    let report = writer.write(&first).await.unwrap();
    assert_eq!(report.persisted, 5);
    assert_eq!(report.batches, 3);

    writer.write(&second).await.unwrap();

    assert_eq!(store.section_count().await.unwrap(), 5);
    assert_eq!(store.version_count().await.unwrap(), 10);

    let identity = first[0].identity().unwrap();
    let versions = store.versions_of(&identity).await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].issue_date, date("2023-01-03"));
    assert_eq!(versions[0].content, "The owner shall comply.");
    assert_eq!(versions[0].mandate_count, 1);
    assert_eq!(versions[1].issue_date, date("2024-01-03"));
    assert_eq!(versions[0].section_id, versions[1].section_id);
}

#[tokio::test]
async fn test_incomplete_records_are_rejected_not_stored() {
    let store = create_test_store().await;
    let writer = create_test_writer(&store, 50);

    let orphan = SectionRecord::new(
        date("2024-01-03"),
        &ancestry(None),
        "60.9",
        "No chapter here.".to_string(),
    );
    let records = vec![record("2024-01-03", "60.1", "Kept."), orphan];

    let report = writer.write(&records).await.unwrap();

    assert_eq!(report.persisted, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(store.section_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_exists_for_date_matches_title_and_date_only() {
    let store = create_test_store().await;
    let writer = create_test_writer(&store, 50);
    writer
        .write(&[record("2024-01-03", "60.1", "Text.")])
        .await
        .unwrap();

    let title_40 = IdentityPrefix::title("40");
    assert!(store.exists_for_date(&title_40, date("2024-01-03")).await.unwrap());
    assert!(!store.exists_for_date(&title_40, date("2023-01-03")).await.unwrap());
    assert!(!store
        .exists_for_date(&IdentityPrefix::title("4"), date("2024-01-03"))
        .await
        .unwrap());

    let other_part = IdentityPrefix {
        title: "40".into(),
        chapter: Some("I".into()),
        part: Some("61".into()),
    };
    assert!(!store.exists_for_date(&other_part, date("2024-01-03")).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_writers_share_identities() {
    let store = create_test_store().await;
    let writer = create_test_writer(&store, 3);

    let mut handles = Vec::new();
    for year in 2019..=2023 {
        let writer = writer.clone();
        handles.push(tokio::spawn(async move {
            let issue_date = format!("{}-01-03", year);
            let records: Vec<SectionRecord> = (1..=4)
                .map(|n| record(&issue_date, &format!("60.{}", n), "Shared text."))
                .collect();
            writer.write(&records).await.unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().persisted, 4);
    }

    assert_eq!(store.section_count().await.unwrap(), 4);
    assert_eq!(store.version_count().await.unwrap(), 20);
}
