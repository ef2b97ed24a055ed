//! Tests for configuration loading and root folder resolution
//!
//! Tests that touch UNICAT_ROOT_FOLDER are marked #[serial] so they do not
//! race each other on the process environment.

use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use unicat_common::config::{
    config_source, database_path, load_toml_config, resolve_root_folder, DatabaseConfig, ExchangeConfig, TomlConfig,
};
use unicat_common::Error;

const ENV_VAR: &str = "UNICAT_ROOT_FOLDER";

#[test]
fn test_empty_toml_uses_defaults() {
    let config = TomlConfig::from_toml_str("").unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.port, 5780);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.exchange.home_country_code, "ES");
    assert_eq!(config.exchange.page_size, 60);
    assert_eq!(config.database.max_connections, 10);
}

#[test]
fn test_partial_toml_keeps_other_defaults() {
    let config = TomlConfig::from_toml_str(
        r#"
        root_folder = "/srv/unicat"
        port = 8080

        [exchange]
        home_country_code = "PT"
        "#,
    )
    .unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/unicat")));
    assert_eq!(config.port, 8080);
    assert_eq!(
        config.exchange,
        ExchangeConfig {
            home_country_code: "PT".to_string(),
            page_size: 60,
        }
    );
    assert_eq!(config.database, DatabaseConfig::default());
}

#[test]
fn test_invalid_toml_is_config_error() {
    let result = TomlConfig::from_toml_str("port = \"not a number\"");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_validation_rejects_bad_values() {
    let result = TomlConfig::from_toml_str("[exchange]\npage_size = 0");
    assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("page_size")));

    let result = TomlConfig::from_toml_str("[database]\nmax_connections = 0");
    assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("max_connections")));
}

#[test]
fn test_load_explicit_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_explicit_config_file_is_reported_as_source() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = 6000\n").unwrap();

    assert_eq!(config_source(Some(&path)), Some(path.clone()));
    assert_eq!(load_toml_config(Some(&path)).unwrap().port, 6000);
}

#[test]
fn test_missing_explicit_config_file_is_error() {
    let dir = TempDir::new().unwrap();
    let result = load_toml_config(Some(&dir.path().join("absent.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ENV_VAR, "/from/env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/from/cli")), ENV_VAR, &config);
    assert_eq!(resolved, PathBuf::from("/from/cli"));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ENV_VAR, "/from/env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, ENV_VAR, &config), PathBuf::from("/from/env"));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_empty_env_var_is_ignored() {
    env::set_var(ENV_VAR, "");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, ENV_VAR, &config), PathBuf::from("/from/toml"));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_compiled_default_when_nothing_set() {
    env::remove_var(ENV_VAR);

    let resolved = resolve_root_folder(None, ENV_VAR, &TomlConfig::default());
    assert!(!resolved.as_os_str().is_empty());
    assert!(resolved.to_string_lossy().contains("unicat"));
}

#[test]
fn test_database_path_inside_root_folder() {
    let path = database_path(Path::new("/srv/unicat"));
    assert_eq!(path, PathBuf::from("/srv/unicat/unicat.db"));
}
