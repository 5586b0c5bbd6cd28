//! Tests for configuration loading and root folder resolution
//!
//! Uses serial_test to prevent ENV variable race conditions: tests that
//! touch ECFR_ROOT_FOLDER or ECFR_CONFIG are marked #[serial].

use ecfr_common::config::{
    default_root_folder, load_toml, resolve_config_path, LoggingConfig, RootFolderInitializer,
    RootFolderResolver, CONFIG_PATH_ENV, ROOT_FOLDER_ENV,
};
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
struct SampleConfig {
    root_folder: Option<PathBuf>,
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new().resolve();

    assert!(!root_folder.as_os_str().is_empty());
    assert_eq!(root_folder, default_root_folder());
}

#[test]
#[serial]
fn test_resolver_cli_arg_beats_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/ecfr-env-folder");

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/ecfr-cli-folder")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/ecfr-cli-folder"));
    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/ecfr-env-folder");

    let root_folder = RootFolderResolver::new()
        .with_toml_value(Some(PathBuf::from("/tmp/ecfr-toml-folder")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/ecfr-env-folder"));
    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_toml_value_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new()
        .with_toml_value(Some(PathBuf::from("/tmp/ecfr-toml-folder")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/ecfr-toml-folder"));
}

#[test]
fn test_missing_toml_is_not_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist.toml");

    let loaded: Option<SampleConfig> = load_toml(&missing).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_load_toml_with_logging_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ecfr-ingest.toml");
    std::fs::write(&path, "root_folder = \"/srv/ecfr\"\n").unwrap();

    let loaded: SampleConfig = load_toml(&path).unwrap().unwrap();

    assert_eq!(loaded.root_folder, Some(PathBuf::from("/srv/ecfr")));
    assert_eq!(loaded.logging, LoggingConfig::default());
    assert_eq!(loaded.logging.level, "info");
}

#[test]
fn test_load_toml_rejects_invalid_syntax() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "root_folder = [unterminated").unwrap();

    let result: ecfr_common::Result<Option<SampleConfig>> = load_toml(&path);
    assert!(matches!(result, Err(ecfr_common::Error::Toml(_))));
}

#[test]
#[serial]
fn test_config_path_priority() {
    env::set_var(CONFIG_PATH_ENV, "/tmp/from-env.toml");
    assert_eq!(
        resolve_config_path(Some(std::path::Path::new("/tmp/from-cli.toml")), "ecfr-ingest"),
        PathBuf::from("/tmp/from-cli.toml")
    );
    assert_eq!(
        resolve_config_path(None, "ecfr-ingest"),
        PathBuf::from("/tmp/from-env.toml")
    );

    env::remove_var(CONFIG_PATH_ENV);
    let default_path = resolve_config_path(None, "ecfr-ingest");
    assert!(default_path.ends_with("ecfr-ingest.toml"));
}

#[test]
fn test_initializer_creates_layout() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    let initializer = RootFolderInitializer::new(root.clone());

    initializer.ensure_directory_exists().unwrap();

    assert!(initializer.staging_dir().is_dir());
    assert_eq!(initializer.database_path(), root.join("ecfr.db"));
    assert_eq!(initializer.root_folder(), root.as_path());
}
