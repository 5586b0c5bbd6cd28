//! In-memory storage and context builders

use ecfr_common::db::init_memory_database;
use ecfr_ingest::config::IngestConfig;
use ecfr_ingest::db::{PersistenceSink, SqliteSectionStore};
use ecfr_ingest::services::batch_writer::BatchWriter;
use std::sync::Arc;

pub async fn create_test_store() -> SqliteSectionStore {
    let pool = init_memory_database().await.unwrap();
    SqliteSectionStore::new(pool)
}

pub fn create_test_writer(store: &SqliteSectionStore, batch_size: usize) -> BatchWriter {
    let sink: Arc<dyn PersistenceSink> = Arc::new(store.clone());
    BatchWriter::new(sink, batch_size).unwrap()
}

/// Fast, unpaced config over `titles`
pub fn test_config(titles: &[u32]) -> IngestConfig {
    let mut config = IngestConfig::default();
    config.source.base_url = "https://source.test/v1".to_string();
    config.rate_limit.requests_per_second = 1000.0;
    config.rate_limit.burst = 1000;
    config.retry.initial_delay_ms = 0;
    config.pipeline.inter_title_pause_ms = 0;
    config.pipeline.workers = 4;
    config.pipeline.first_title = titles.iter().copied().min().unwrap_or(1);
    config.pipeline.last_title = titles.iter().copied().max().unwrap_or(1);
    config.pipeline.excluded_titles = (config.pipeline.first_title..=config.pipeline.last_title)
        .filter(|t| !titles.contains(t))
        .collect();
    config
}
