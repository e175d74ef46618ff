//! Integration tests for configuration resolution and graceful degradation
//!
//! Tests that manipulate SAFELIGHT_CONFIG are marked with #[serial] so they
//! do not race each other.

use safelight_common::config::{default_config_path, resolve_config_path, CONFIG_ENV_VAR};
use safelight_common::SafelightConfig;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path
}

#[test]
#[serial]
fn test_env_var_used_without_cli_path() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "env.toml", "num_threads = 3\n");
    env::set_var(CONFIG_ENV_VAR, &path);

    assert_eq!(resolve_config_path(None), Some(path.clone()));
    let config = SafelightConfig::load(None).unwrap();
    assert_eq!(config.num_threads, 3);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_path_beats_env_var() {
    let dir = TempDir::new().unwrap();
    let env_path = write_config(&dir, "env.toml", "num_threads = 3\n");
    let cli_path = write_config(&dir, "cli.toml", "num_threads = 8\n");
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let config = SafelightConfig::load(Some(&cli_path)).unwrap();
    assert_eq!(config.num_threads, 8);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_platform_default_without_overrides() {
    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(resolve_config_path(None), default_config_path());
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist.toml");

    let config = SafelightConfig::load(Some(&missing)).unwrap();
    assert_eq!(config, SafelightConfig::default());
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "bad.toml", "server_url = [unterminated\n");

    assert!(SafelightConfig::load(Some(&path)).is_err());
}

#[test]
fn test_full_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "full.toml",
        r#"
server_url = "http://build.local:9000"
module_dir = "/srv/modules"
default_buffer_side_length = 128
num_threads = 2
http_timeout_ms = 5000

[logging]
level = "warn"
"#,
    );

    let config = SafelightConfig::from_file(&path).unwrap();
    assert_eq!(config.server_url, "http://build.local:9000");
    assert_eq!(config.module_dir, PathBuf::from("/srv/modules"));
    assert_eq!(config.default_buffer_side_length, 128);
    assert_eq!(config.num_threads, 2);
    assert_eq!(config.http_timeout_ms, 5000);
    assert_eq!(config.logging.level, "warn");
}
