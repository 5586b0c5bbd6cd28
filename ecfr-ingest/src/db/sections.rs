//! SQLite section store
//!
//! Tables come from `ecfr_common::db::create_schema`. Absent optional levels
//! are written as `''` and read back as `None`.

use crate::db::PersistenceSink;
use crate::error::PersistenceError;
use crate::types::{IdentityPrefix, SectionIdentity, SectionVersion};
use async_trait::async_trait;
use chrono::NaiveDate;
use ecfr_common::dates::format_issue_date;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

/// sqlx-backed [`PersistenceSink`]
#[derive(Clone)]
pub struct SqliteSectionStore {
    pool: SqlitePool,
}

impl SqliteSectionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of stored identities
    pub async fn section_count(&self) -> Result<i64, PersistenceError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sections")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Number of stored versions
    pub async fn version_count(&self) -> Result<i64, PersistenceError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM section_versions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Versions of one section, oldest first
    pub async fn versions_of(
        &self,
        identity: &SectionIdentity,
    ) -> Result<Vec<SectionVersion>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT v.section_id, v.issue_date, v.content, v.word_count,
                   v.readability_score, v.mandate_count
            FROM section_versions v
            JOIN sections s ON s.id = v.section_id
            WHERE s.title = ? AND s.chapter = ? AND s.subchapter = ?
              AND s.part = ? AND s.subpart = ? AND s.section = ?
            ORDER BY v.issue_date
            "#,
        )
        .bind(&identity.title)
        .bind(&identity.chapter)
        .bind(stored_optional(&identity.subchapter))
        .bind(&identity.part)
        .bind(stored_optional(&identity.subpart))
        .bind(&identity.section)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(version_from_row).collect()
    }
}

#[async_trait]
impl PersistenceSink for SqliteSectionStore {
    async fn exists_for_date(
        &self,
        prefix: &IdentityPrefix,
        issue_date: NaiveDate,
    ) -> Result<bool, PersistenceError> {
        let exists: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM section_versions v
                JOIN sections s ON s.id = v.section_id
                WHERE s.title = ?
                  AND (? IS NULL OR s.chapter = ?)
                  AND (? IS NULL OR s.part = ?)
                  AND v.issue_date = ?
            )
            "#,
        )
        .bind(&prefix.title)
        .bind(prefix.chapter.as_deref())
        .bind(prefix.chapter.as_deref())
        .bind(prefix.part.as_deref())
        .bind(prefix.part.as_deref())
        .bind(format_issue_date(issue_date))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    async fn upsert_identities(
        &self,
        identities: &[SectionIdentity],
    ) -> Result<HashMap<SectionIdentity, Uuid>, PersistenceError> {
        let mut ids = HashMap::with_capacity(identities.len());
        if identities.is_empty() {
            return Ok(ids);
        }

        let mut tx = self.pool.begin().await?;

        for identity in identities {
            if ids.contains_key(identity) {
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO sections (id, title, chapter, subchapter, part, subpart, section)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(title, chapter, subchapter, part, subpart, section) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&identity.title)
            .bind(&identity.chapter)
            .bind(stored_optional(&identity.subchapter))
            .bind(&identity.part)
            .bind(stored_optional(&identity.subpart))
            .bind(&identity.section)
            .execute(&mut *tx)
            .await?;

            let id: Option<String> = sqlx::query_scalar(
                r#"
                SELECT id FROM sections
                WHERE title = ? AND chapter = ? AND subchapter = ?
                  AND part = ? AND subpart = ? AND section = ?
                "#,
            )
            .bind(&identity.title)
            .bind(&identity.chapter)
            .bind(stored_optional(&identity.subchapter))
            .bind(&identity.part)
            .bind(stored_optional(&identity.subpart))
            .bind(&identity.section)
            .fetch_optional(&mut *tx)
            .await?;

            let id = id.ok_or_else(|| PersistenceError::MissingSectionId(identity.to_string()))?;
            ids.insert(identity.clone(), parse_id(&id)?);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn insert_versions(&self, versions: &[SectionVersion]) -> Result<u64, PersistenceError> {
        if versions.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for version in versions {
            let result = sqlx::query(
                r#"
                INSERT INTO section_versions (
                    id, section_id, issue_date, content,
                    word_count, readability_score, mandate_count
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(version.section_id.to_string())
            .bind(format_issue_date(version.issue_date))
            .bind(&version.content)
            .bind(i64::from(version.word_count))
            .bind(version.readability_score)
            .bind(i64::from(version.mandate_count))
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn title_complete(
        &self,
        title: &str,
        issue_date: NaiveDate,
    ) -> Result<bool, PersistenceError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM ingested_titles WHERE title = ? AND issue_date = ?)",
        )
        .bind(title)
        .bind(format_issue_date(issue_date))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    async fn discard_unfinished(
        &self,
        title: &str,
        issue_date: NaiveDate,
    ) -> Result<u64, PersistenceError> {
        let date = format_issue_date(issue_date);
        let mut tx = self.pool.begin().await?;

        let done: i64 = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM ingested_titles WHERE title = ? AND issue_date = ?)",
        )
        .bind(title)
        .bind(&date)
        .fetch_one(&mut *tx)
        .await?;
        if done != 0 {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM section_versions
            WHERE issue_date = ?
              AND section_id IN (SELECT id FROM sections WHERE title = ?)
            "#,
        )
        .bind(&date)
        .bind(title)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn mark_title_complete(
        &self,
        title: &str,
        issue_date: NaiveDate,
        sections: usize,
    ) -> Result<(), PersistenceError> {
        let sections = i64::try_from(sections)
            .map_err(|_| PersistenceError::InvalidRow(format!("section count {}", sections)))?;

        sqlx::query(
            r#"
            INSERT INTO ingested_titles (title, issue_date, sections)
            VALUES (?, ?, ?)
            ON CONFLICT(title, issue_date) DO UPDATE SET sections = excluded.sections
            "#,
        )
        .bind(title)
        .bind(format_issue_date(issue_date))
        .bind(sections)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn stored_optional(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn parse_id(value: &str) -> Result<Uuid, PersistenceError> {
    Uuid::parse_str(value)
        .map_err(|e| PersistenceError::InvalidRow(format!("section id {}: {}", value, e)))
}

fn version_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SectionVersion, PersistenceError> {
    let section_id: String = row.get("section_id");
    let issue_date: String = row.get("issue_date");
    let word_count: i64 = row.get("word_count");
    let mandate_count: i64 = row.get("mandate_count");

    Ok(SectionVersion {
        section_id: parse_id(&section_id)?,
        issue_date: ecfr_common::dates::parse_issue_date(&issue_date)
            .map_err(|e| PersistenceError::InvalidRow(e.to_string()))?,
        content: row.get("content"),
        word_count: u32::try_from(word_count)
            .map_err(|_| PersistenceError::InvalidRow(format!("word_count {}", word_count)))?,
        readability_score: row.get("readability_score"),
        mandate_count: u32::try_from(mandate_count)
            .map_err(|_| PersistenceError::InvalidRow(format!("mandate_count {}", mandate_count)))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecfr_common::db::init_memory_database;

    fn identity(section: &str, subpart: Option<&str>) -> SectionIdentity {
        SectionIdentity {
            title: "40".into(),
            chapter: "I".into(),
            subchapter: None,
            part: "60".into(),
            subpart: subpart.map(str::to_string),
            section: section.into(),
        }
    }

    fn date(y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, 1, 3).unwrap()
    }

    async fn store() -> SqliteSectionStore {
        SqliteSectionStore::new(init_memory_database().await.unwrap())
    }

    #[tokio::test]
    async fn test_upsert_twice_returns_same_ids() {
        let store = store().await;
        let batch = vec![identity("60.1", Some("A")), identity("60.2", None)];

        let first = store.upsert_identities(&batch).await.unwrap();
        let second = store.upsert_identities(&batch).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.section_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_absent_subpart_deduplicates() {
        let store = store().await;
        let a = store.upsert_identities(&[identity("60.2", None)]).await.unwrap();
        let b = store.upsert_identities(&[identity("60.2", None)]).await.unwrap();

        assert_eq!(a[&identity("60.2", None)], b[&identity("60.2", None)]);
        assert_eq!(store.section_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exists_for_date_after_insert() {
        let store = store().await;
        let ids = store.upsert_identities(&[identity("60.1", None)]).await.unwrap();
        let section_id = ids[&identity("60.1", None)];

        let prefix = IdentityPrefix::title("40");
        assert!(!store.exists_for_date(&prefix, date(2020)).await.unwrap());

        store
            .insert_versions(&[SectionVersion {
                section_id,
                issue_date: date(2020),
                content: "Text.".into(),
                word_count: 1,
                readability_score: Some(36.62),
                mandate_count: 0,
            }])
            .await
            .unwrap();

        assert!(store.exists_for_date(&prefix, date(2020)).await.unwrap());
        assert!(!store.exists_for_date(&prefix, date(2021)).await.unwrap());
        assert!(!store.exists_for_date(&IdentityPrefix::title("41"), date(2020)).await.unwrap());

        let narrowed = IdentityPrefix {
            title: "40".into(),
            chapter: Some("II".into()),
            part: None,
        };
        assert!(!store.exists_for_date(&narrowed, date(2020)).await.unwrap());
    }

    #[tokio::test]
    async fn test_versions_are_appended() {
        let store = store().await;
        let id = identity("60.1", None);
        let ids = store.upsert_identities(&[id.clone()]).await.unwrap();

        for year in [2019, 2020] {
            let version = SectionVersion {
                section_id: ids[&id],
                issue_date: date(year),
                content: format!("Text {}.", year),
                word_count: 2,
                readability_score: None,
                mandate_count: 0,
            };
            store.insert_versions(&[version]).await.unwrap();
        }

        let versions = store.versions_of(&id).await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].issue_date, date(2019));
        assert_eq!(versions[1].readability_score, None);
    }

    #[tokio::test]
    async fn test_discard_unfinished_spares_completed_titles() {
        let store = store().await;
        let id = identity("60.1", None);
        let ids = store.upsert_identities(&[id.clone()]).await.unwrap();
        let version = |year| SectionVersion {
            section_id: ids[&id],
            issue_date: date(year),
            content: "Text.".into(),
            word_count: 1,
            readability_score: None,
            mandate_count: 0,
        };
        store.insert_versions(&[version(2020), version(2021)]).await.unwrap();
        store.mark_title_complete("40", date(2021), 1).await.unwrap();

        assert!(!store.title_complete("40", date(2020)).await.unwrap());
        assert!(store.title_complete("40", date(2021)).await.unwrap());

        assert_eq!(store.discard_unfinished("40", date(2020)).await.unwrap(), 1);
        assert_eq!(store.discard_unfinished("40", date(2021)).await.unwrap(), 0);
        assert_eq!(store.discard_unfinished("41", date(2021)).await.unwrap(), 0);

        let versions = store.versions_of(&id).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].issue_date, date(2021));
    }

    #[tokio::test]
    async fn test_version_for_unknown_section_is_rejected() {
        let store = store().await;
        let version = SectionVersion {
            section_id: Uuid::new_v4(),
            issue_date: date(2020),
            content: String::new(),
            word_count: 0,
            readability_score: None,
            mandate_count: 0,
        };

        let result = store.insert_versions(&[version]).await;

        assert!(matches!(result, Err(PersistenceError::Database(_))));
        assert_eq!(store.version_count().await.unwrap(), 0);
    }
}
