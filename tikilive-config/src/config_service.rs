// ConfigService - sectioned, directory-layered configuration

use crate::loader::{ConfigLoader, FileFormat};
use crate::{ConfigError, ConfigManager, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// High-level configuration service.
///
/// Every configuration file becomes a section named after its file stem:
/// `config/application.toml` fills the `application` section,
/// `config/database.json` the `database` section. Loading the same section
/// from several directories merges the tables, later directories winning.
#[derive(Clone, Debug)]
pub struct ConfigService {
    manager: ConfigManager,
}

impl ConfigService {
    /// Create a new configuration service
    pub fn new() -> Self {
        Self {
            manager: ConfigManager::new(),
        }
    }

    /// Create from an existing manager
    pub fn from_manager(manager: ConfigManager) -> Self {
        Self { manager }
    }

    /// Builder for creating configured service
    pub fn builder() -> ConfigServiceBuilder {
        ConfigServiceBuilder::new()
    }

    /// Load every `*.toml` / `*.json` file of each directory, in order.
    ///
    /// Directories that do not exist are skipped.
    pub fn from_dirs<I, P>(dirs: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let service = Self::new();
        for dir in dirs {
            service.load_dir(dir)?;
        }
        Ok(service)
    }

    /// Merge the sections found in `dir` over the current ones
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Ok(());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && matches!(
                        FileFormat::from_path(path),
                        Some(FileFormat::Toml) | Some(FileFormat::Json)
                    )
            })
            .collect();
        files.sort();

        for file in files {
            self.load_section_file(&file)?;
        }

        Ok(())
    }

    /// Merge one file into the section named after its stem
    pub fn load_section_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let section = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| ConfigError::LoadError(format!("Bad file name: {}", path.display())))?;

        let data = ConfigLoader::auto(path)?.load_file(path)?;
        let Value::Object(table) = data else {
            return Err(ConfigError::ParseError(format!(
                "{} does not contain a table at the top level",
                path.display()
            )));
        };

        let mut wrapped = Map::new();
        wrapped.insert(section.to_string(), Value::Object(table));
        self.manager.merge(&ConfigManager::from_map(wrapped))
    }

    /// Get configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.manager.get(key)
    }

    /// Get configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.manager.get_or(key, default)
    }

    /// Value of `key` inside `section`
    pub fn section_get<T: DeserializeOwned>(&self, section: &str, key: &str) -> Result<T> {
        self.manager.get(&format!("{}.{}", section, key))
    }

    /// Like [`section_get`](Self::section_get), `None` when the key is absent.
    /// A present value of the wrong type is still an error.
    pub fn section_get_opt<T: DeserializeOwned>(&self, section: &str, key: &str) -> Result<Option<T>> {
        match self.section_get(section, key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Names of the loaded sections
    pub fn sections(&self) -> Vec<String> {
        self.manager
            .keys()
            .into_iter()
            .filter(|key| matches!(self.manager.value(key), Some(Value::Object(_))))
            .collect()
    }

    /// Get string value
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.manager.get_string(key)
    }

    /// Get integer value
    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.manager.get_int(key)
    }

    /// Get boolean value
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.manager.get_bool(key)
    }

    /// Check if key exists
    pub fn has(&self, key: &str) -> bool {
        self.manager.has(key)
    }

    /// Get underlying manager
    pub fn manager(&self) -> &ConfigManager {
        &self.manager
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for ConfigService
pub struct ConfigServiceBuilder {
    manager: ConfigManager,
    load_env: bool,
    load_dotenv: bool,
    dotenv_path: Option<PathBuf>,
    config_dirs: Vec<PathBuf>,
    config_files: Vec<PathBuf>,
}

impl ConfigServiceBuilder {
    pub fn new() -> Self {
        Self {
            manager: ConfigManager::new(),
            load_env: false,
            load_dotenv: false,
            dotenv_path: None,
            config_dirs: Vec::new(),
            config_files: Vec::new(),
        }
    }

    /// Set environment variable prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.manager = ConfigManager::with_prefix(prefix);
        self
    }

    /// Enable loading from environment variables
    pub fn load_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Enable loading from .env file
    pub fn load_dotenv(mut self, path: Option<PathBuf>) -> Self {
        self.load_dotenv = true;
        self.dotenv_path = path;
        self
    }

    /// Add a directory of section files; later directories win
    pub fn add_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_dirs.push(path.into());
        self
    }

    /// Add a single section file, loaded after the directories
    pub fn add_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_files.push(path.into());
        self
    }

    /// Build the configuration service
    pub fn build(self) -> Result<ConfigService> {
        let service = ConfigService::from_manager(self.manager);

        for dir in &self.config_dirs {
            service.load_dir(dir)?;
        }

        for file in &self.config_files {
            service.load_section_file(file)?;
        }

        // A missing default .env is not an error; an explicit path must exist
        if self.load_dotenv {
            match self.dotenv_path.as_deref() {
                Some(path) => service.manager.load_dotenv(Some(path))?,
                None => {
                    let _ = service.manager.load_dotenv(None);
                }
            }
        }

        if self.load_env {
            service.manager.load_env()?;
        }

        Ok(service)
    }
}

impl Default for ConfigServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
