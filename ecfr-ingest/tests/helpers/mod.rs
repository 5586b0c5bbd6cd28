//! Test Helper Utilities
//!
//! Shared utilities for testing ecfr-ingest

#![allow(dead_code)]

pub mod db_utils;
pub mod failing_sink;
pub mod fake_source;
pub mod fixtures;

pub use db_utils::{create_test_store, create_test_writer, test_config};
pub use failing_sink::FailingSink;
pub use fake_source::{FakeSource, Reply};
pub use fixtures::{ancestry_json, date, section_document, title_document, versions_json};
