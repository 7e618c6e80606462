// Configuration management for the TikiLIVE REST API

pub mod config_service;
pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use config_service::{ConfigService, ConfigServiceBuilder};
pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::Settings;
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Main configuration manager
///
/// Keys may be dotted paths. A lookup of `request.http_port` finds either a
/// flat `"request.http_port"` entry or the `http_port` field of a nested
/// `request` table, whichever the source file used.
#[derive(Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Map<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(Map::new())),
            env_prefix: None,
        }
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(Map::new())),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Create holding the entries of `map`
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            config: Arc::new(RwLock::new(map)),
            env_prefix: None,
        }
    }

    pub fn env_prefix(&self) -> Option<&str> {
        self.env_prefix.as_deref()
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let env_vars = loader.load()?;

        let mut config = self.config.write();
        for (key, value) in env_vars {
            config.insert(key, Value::String(value));
        }

        Ok(())
    }

    /// Load configuration from .env file
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        if let Some(path) = path {
            dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
        } else {
            dotenvy::dotenv().ok(); // Ignore if .env doesn't exist
        }
        self.load_env()
    }

    /// Load configuration from file, deep-merging over what is already there
    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let loader = ConfigLoader::new(format);
        let data = loader.load_file(path.as_ref())?;

        match data {
            Value::Object(map) => {
                merge_maps(&mut self.config.write(), map);
                Ok(())
            }
            _ => Err(ConfigError::ParseError(format!(
                "{} does not contain a table at the top level",
                path.as_ref().display()
            ))),
        }
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value =
            serde_json::to_value(value).map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        let mut config = self.config.write();
        config.insert(key.to_string(), json_value);

        Ok(())
    }

    /// Raw value at `key`
    pub fn value(&self, key: &str) -> Option<Value> {
        let config = self.config.read();
        lookup(&config, key).cloned()
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .value(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Get a string value
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Get an integer value
    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    /// Get a boolean value
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    /// Get a float value
    pub fn get_float(&self, key: &str) -> Result<f64> {
        self.get(key)
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        let config = self.config.read();
        lookup(&config, key).is_some()
    }

    /// Top-level keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let config = self.config.read();
        let mut keys: Vec<String> = config.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Deep-merge another manager's values over this one's
    pub fn merge(&self, other: &ConfigManager) -> Result<()> {
        if Arc::ptr_eq(&self.config, &other.config) {
            return Ok(());
        }

        let incoming = other.config.read().clone();
        merge_maps(&mut self.config.write(), incoming);

        Ok(())
    }

    /// Copy of every value as one JSON object
    pub fn snapshot(&self) -> Value {
        Value::Object(self.config.read().clone())
    }

    /// Load and validate configuration
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let validated: T = serde_json::from_value(self.snapshot())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("keys", &self.keys())
            .field("env_prefix", &self.env_prefix)
            .finish()
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }

    let (head, rest) = key.split_once('.')?;
    match map.get(head)? {
        Value::Object(nested) => lookup(nested, rest),
        _ => None,
    }
}

fn merge_maps(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match value {
            Value::Object(nested) => {
                if let Some(Value::Object(existing)) = target.get_mut(&key) {
                    merge_maps(existing, nested);
                } else {
                    target.insert(key, Value::Object(nested));
                }
            }
            value => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("test_key", "test_value").unwrap();

        let value: String = manager.get("test_key").unwrap();
        assert_eq!(value, "test_value");
    }

    #[test]
    fn test_get_or_default() {
        let manager = ConfigManager::new();

        let value: String = manager.get_or("missing_key", "default_value".to_string());
        assert_eq!(value, "default_value");
    }

    #[test]
    fn test_has_key() {
        let manager = ConfigManager::new();
        manager.set("existing_key", "value").unwrap();

        assert!(manager.has("existing_key"));
        assert!(!manager.has("missing_key"));
    }

    #[test]
    fn test_type_conversions() {
        let manager = ConfigManager::new();

        manager.set("string_key", "hello").unwrap();
        manager.set("int_key", 42i64).unwrap();
        manager.set("bool_key", true).unwrap();
        manager.set("float_key", 2.5).unwrap();

        assert_eq!(manager.get_string("string_key").unwrap(), "hello");
        assert_eq!(manager.get_int("int_key").unwrap(), 42);
        assert!(manager.get_bool("bool_key").unwrap());
        assert_eq!(manager.get_float("float_key").unwrap(), 2.5);
    }

    #[test]
    fn test_wrong_type_is_invalid_value() {
        let manager = ConfigManager::new();
        manager.set("port", "eighty").unwrap();

        let err = manager.get_int("port").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "port"));
    }

    #[test]
    fn test_dotted_lookup_flat_and_nested() {
        let manager = ConfigManager::new();
        manager.set("request.trust_proxy", true).unwrap();
        manager.set("collection", json!({"default_limit": 25})).unwrap();

        assert!(manager.get_bool("request.trust_proxy").unwrap());
        assert_eq!(manager.get_int("collection.default_limit").unwrap(), 25);
        assert!(!manager.has("collection.max_limit"));
        assert!(!manager.has("request.trust_proxy.deeper"));
    }

    #[test]
    fn test_merge_is_deep() {
        let base = ConfigManager::new();
        base.set("request", json!({"http_port": 80, "https_port": 443})).unwrap();

        let overrides = ConfigManager::new();
        overrides.set("request", json!({"http_port": 8080})).unwrap();

        base.merge(&overrides).unwrap();
        assert_eq!(base.get_int("request.http_port").unwrap(), 8080);
        assert_eq!(base.get_int("request.https_port").unwrap(), 443);
    }

    #[test]
    fn test_merge_with_clone_of_self() {
        let manager = ConfigManager::new();
        manager.set("debug", true).unwrap();
        manager.merge(&manager.clone()).unwrap();
        assert_eq!(manager.keys(), vec!["debug".to_string()]);
    }
}
