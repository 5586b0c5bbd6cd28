//! JSON staging files
//!
//! Snapshot and change-history runs write `{ "processed": [ ... ] }` files
//! that a later `load` run persists. Snapshot files are named
//! `title-{N}.json`, change files `title-{N}-changes.json`.

use crate::error::{IngestResult, StagingError};
use crate::services::batch_writer::{BatchWriter, PersistReport};
use crate::types::SectionRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "title-";
const CHANGES_MARKER: &str = "changes";

pub fn snapshot_file_name(title: u32) -> String {
    format!("{}{}.json", FILE_PREFIX, title)
}

pub fn changes_file_name(title: u32) -> String {
    format!("{}{}-{}.json", FILE_PREFIX, title, CHANGES_MARKER)
}

#[derive(Serialize)]
struct StagingOut<'a> {
    processed: &'a [SectionRecord],
}

#[derive(Deserialize)]
struct StagingIn {
    processed: Vec<SectionRecord>,
}

/// Write records as pretty JSON, replacing any existing file atomically
///
/// The data goes to a temporary sibling first and is renamed into place, so
/// readers never observe a partial file.
pub fn write_staging(
    dir: &Path,
    file_name: &str,
    records: &[SectionRecord],
) -> Result<PathBuf, StagingError> {
    fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

    let target = dir.join(file_name);
    let temp = dir.join(format!(".{}.tmp", file_name));

    let json = serde_json::to_vec_pretty(&StagingOut { processed: records }).map_err(|e| {
        StagingError::Json {
            path: target.display().to_string(),
            source: e,
        }
    })?;

    fs::write(&temp, json).map_err(|e| io_error(&temp, e))?;
    if let Err(e) = fs::rename(&temp, &target) {
        let _ = fs::remove_file(&temp);
        return Err(io_error(&target, e));
    }

    tracing::info!(path = %target.display(), records = records.len(), "Wrote staging file");
    Ok(target)
}

pub fn read_staging(path: &Path) -> Result<Vec<SectionRecord>, StagingError> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    let file: StagingIn = serde_json::from_slice(&bytes).map_err(|e| StagingError::Json {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(file.processed)
}

/// Snapshot staging files in `dir`, sorted by name
///
/// Change-history files are excluded.
pub fn list_snapshot_files(dir: &Path) -> Result<Vec<PathBuf>, StagingError> {
    let entries = fs::read_dir(dir).map_err(|e| io_error(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if name.starts_with(FILE_PREFIX) && name.ends_with(".json") && !name.contains(CHANGES_MARKER)
        {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Outcome of [`load_snapshot_file`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub stored: PersistReport,
    /// Title dates written
    pub loaded: usize,
    /// Title dates already complete in storage
    pub skipped: usize,
}

impl LoadReport {
    pub fn merge(&mut self, other: LoadReport) {
        self.stored.merge(other.stored);
        self.loaded += other.loaded;
        self.skipped += other.skipped;
    }
}

/// Persist one staging file, one title date at a time
///
/// Title dates already marked complete are left alone, so loading the same
/// file twice stores its versions once.
pub async fn load_snapshot_file(writer: &BatchWriter, path: &Path) -> IngestResult<LoadReport> {
    let mut groups: BTreeMap<(String, NaiveDate), Vec<SectionRecord>> = BTreeMap::new();
    for record in read_staging(path)? {
        groups
            .entry((record.title.clone(), record.issue_date))
            .or_default()
            .push(record);
    }

    let mut report = LoadReport::default();
    for ((title, issue_date), records) in groups {
        if writer.sink().title_complete(&title, issue_date).await? {
            tracing::info!(title = %title, issue_date = %issue_date, "Already stored, skipping");
            report.skipped += 1;
            continue;
        }

        let stored = writer.write_title(&title, issue_date, &records).await?;
        report.stored.merge(stored);
        report.loaded += 1;
    }

    tracing::info!(
        path = %path.display(),
        loaded = report.loaded,
        skipped = report.skipped,
        persisted = report.stored.persisted,
        "Loaded staging file"
    );
    Ok(report)
}

fn io_error(path: &Path, source: std::io::Error) -> StagingError {
    StagingError::Io {
        path: path.display().to_string(),
        source,
    }
}
