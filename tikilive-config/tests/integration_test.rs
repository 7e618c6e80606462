//! Integration tests for tikilive-config

use std::env;
use std::fs;
use tempfile::TempDir;
use tikilive_config::settings::ENV_PREFIX;
use tikilive_config::*;

fn write(dir: &TempDir, name: &str, content: &str) {
    fs::write(dir.path().join(name), content).unwrap();
}

#[test]
fn test_from_dirs_sections_by_file_stem() {
    let dir = TempDir::new().unwrap();
    write(&dir, "application.toml", "debug = true\n[request]\nhttp_port = 8000\n");
    write(&dir, "database.json", r#"{"dsn": "mysql://localhost/tikilive"}"#);
    write(&dir, "notes.txt", "ignored");

    let config = ConfigService::from_dirs([dir.path()]).unwrap();

    assert_eq!(config.sections(), vec!["application".to_string(), "database".to_string()]);
    assert!(config.section_get::<bool>("application", "debug").unwrap());
    assert_eq!(config.section_get::<u16>("application", "request.http_port").unwrap(), 8000);
    assert_eq!(
        config.section_get::<String>("database", "dsn").unwrap(),
        "mysql://localhost/tikilive"
    );
}

#[test]
fn test_later_dirs_override_earlier_ones() {
    let defaults = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    write(
        &defaults,
        "application.toml",
        "debug = false\n[request]\nhttp_port = 80\nhttps_port = 443\n",
    );
    write(&local, "application.toml", "debug = true\n[request]\nhttp_port = 8080\n");

    let config = ConfigService::from_dirs([defaults.path(), local.path()]).unwrap();

    assert!(config.section_get::<bool>("application", "debug").unwrap());
    assert_eq!(config.section_get::<u16>("application", "request.http_port").unwrap(), 8080);
    assert_eq!(config.section_get::<u16>("application", "request.https_port").unwrap(), 443);
}

#[test]
fn test_missing_dir_is_skipped() {
    let dir = TempDir::new().unwrap();
    write(&dir, "application.json", r#"{"debug": true}"#);
    let missing = dir.path().join("does-not-exist");

    let config = ConfigService::from_dirs([missing.as_path(), dir.path()]).unwrap();
    assert!(config.section_get::<bool>("application", "debug").unwrap());
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    write(&dir, "application.toml", "debug = = true");

    let result = ConfigService::from_dirs([dir.path()]);
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_builder_files_after_dirs() {
    let dir = TempDir::new().unwrap();
    write(&dir, "application.toml", "server = { address = \"127.0.0.1:9000\" }\n");
    let extra = TempDir::new().unwrap();
    write(&extra, "application.json", r#"{"server": {"address": "127.0.0.1:9100"}}"#);

    let config = ConfigService::builder()
        .add_dir(dir.path())
        .add_file(extra.path().join("application.json"))
        .build()
        .unwrap();

    assert_eq!(
        config.section_get::<String>("application", "server.address").unwrap(),
        "127.0.0.1:9100"
    );
}

#[test]
fn test_builder_loads_prefixed_env() {
    unsafe {
        env::set_var("TIKILIVE_IT_BUILDER_FLAG", "on");
    }

    let config = ConfigService::builder()
        .with_prefix("TIKILIVE_IT")
        .load_env()
        .build()
        .unwrap();
    assert_eq!(config.get_string("builder_flag").unwrap(), "on");

    unsafe {
        env::remove_var("TIKILIVE_IT_BUILDER_FLAG");
    }
}

#[test]
fn test_builder_loads_dotenv_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, ".env", "TIKILIVE_DOTENV_CHECK=from-dotenv\n");

    let config = ConfigService::builder()
        .with_prefix("TIKILIVE_DOTENV")
        .load_dotenv(Some(dir.path().join(".env")))
        .build()
        .unwrap();
    assert_eq!(config.get_string("check").unwrap(), "from-dotenv");

    unsafe {
        env::remove_var("TIKILIVE_DOTENV_CHECK");
    }
}

#[test]
fn test_settings_from_files() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "application.toml",
        r#"
debug = true

[request]
trust_proxy = true

[collection]
default_limit = 10
max_limit = 50
default_order_by = "created"

[response]
message_field = "reason"
"#,
    );

    let config = ConfigService::from_dirs([dir.path()]).unwrap();
    let settings = Settings::from_config(&config).unwrap();

    assert!(settings.debug);
    assert!(settings.trust_proxy);
    assert_eq!(settings.default_limit, 10);
    assert_eq!(settings.max_limit, 50);
    assert_eq!(settings.default_order_by, "created");
    assert_eq!(settings.message_field, "reason");
    assert_eq!(settings.namespace_prefix, "api.");
    assert!(settings.validate().is_ok());
}

#[test]
fn test_settings_env_overrides() {
    let env = EnvLoader::new(Some("TIKILIVE_IT_SETTINGS".to_string()));
    unsafe {
        env::set_var("TIKILIVE_IT_SETTINGS_DEBUG", "1");
        env::set_var("TIKILIVE_IT_SETTINGS_SERVER_ADDRESS", "127.0.0.1:3000");
    }

    let mut settings = Settings::default();
    settings.apply_env(&env).unwrap();
    assert!(settings.debug);
    assert_eq!(settings.server_address, "127.0.0.1:3000");

    unsafe {
        env::set_var("TIKILIVE_IT_SETTINGS_DEBUG", "perhaps");
    }
    assert!(settings.apply_env(&env).is_err());

    unsafe {
        env::remove_var("TIKILIVE_IT_SETTINGS_DEBUG");
        env::remove_var("TIKILIVE_IT_SETTINGS_SERVER_ADDRESS");
    }
}

#[test]
fn test_settings_load_rejects_invalid_values() {
    let dir = TempDir::new().unwrap();
    write(&dir, "application.toml", "[collection]\ndefault_limit = 500\nmax_limit = 100\n");

    let result = Settings::load([dir.path()]);
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    assert_eq!(ENV_PREFIX, "TIKILIVE");
}

#[test]
fn test_load_unvalidated_allows_overrides_before_validation() {
    let dir = TempDir::new().unwrap();
    write(&dir, "application.toml", "[server]\naddress = \"not an address\"\n");

    assert!(matches!(
        Settings::load([dir.path()]),
        Err(ConfigError::ValidationError(_))
    ));

    let mut settings = Settings::load_unvalidated([dir.path()]).unwrap();
    assert_eq!(settings.server_address, "not an address");
    assert!(settings.validate().is_err());

    settings.server_address = "127.0.0.1:9000".to_string();
    assert!(settings.validate().is_ok());
}

#[test]
fn test_config_error_into_core_error() {
    let err: tikilive_core::Error = ConfigError::ValidationError("bad port".to_string()).into();
    assert_eq!(err.kind(), tikilive_core::ErrorKind::Config);
    assert!(!err.is_categorized());
}
