//! Fetching, pacing and pipeline services

pub mod batch_writer;
pub mod changes;
pub mod ecfr_client;
pub mod fetcher;
pub mod pipeline;
pub mod rate_limiter;
pub mod start_date;

pub use batch_writer::{BatchWriter, PersistReport};
pub use changes::{ChangeHistoryPipeline, ChangeReport};
pub use ecfr_client::{ContentVersion, ResolvedAncestry, SourceClient};
pub use fetcher::{HttpTransport, ReqwestTransport, RetryPolicy, RetryingFetcher};
pub use pipeline::{DateTitlePipeline, PipelineSettings};
pub use rate_limiter::RateLimiter;
pub use start_date::StartDateFinder;
