// Typed application settings

use crate::env::{EnvLoader, parse_bool};
use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigError, ConfigService, Result};
use serde::{Deserialize, Serialize};
use tikilive_core::{EnvelopeFormat, ExceptionTranslator, UrlOptions};

/// Section holding the application settings (`application.toml`)
pub const APPLICATION_SECTION: &str = "application";

/// Prefix of the environment variables read by [`Settings::apply_env`]
pub const ENV_PREFIX: &str = "TIKILIVE";

/// Everything the API reads from configuration.
///
/// Missing keys keep their defaults; see [`Settings::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Expose exception details in error envelopes
    pub debug: bool,
    pub trust_proxy: bool,
    pub http_port: u16,
    pub https_port: u16,
    /// Prepended to `<Name>Controller` when resolving handlers
    pub namespace_prefix: String,
    pub server_address: String,
    pub default_limit: usize,
    pub max_limit: usize,
    pub default_order_by: String,
    pub default_direction: String,
    /// Envelope key carrying the human-readable message
    pub message_field: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            trust_proxy: false,
            http_port: 80,
            https_port: 443,
            namespace_prefix: "api.".to_string(),
            server_address: "0.0.0.0:8080".to_string(),
            default_limit: 30,
            max_limit: 100,
            default_order_by: "id".to_string(),
            default_direction: "ASC".to_string(),
            message_field: "message".to_string(),
        }
    }
}

impl Settings {
    /// Read the `application` section, keeping defaults for absent keys.
    pub fn from_config(config: &ConfigService) -> Result<Self> {
        let mut settings = Self::default();

        macro_rules! read {
            ($field:ident, $key:literal) => {
                if let Some(value) = config.section_get_opt(APPLICATION_SECTION, $key)? {
                    settings.$field = value;
                }
            };
        }

        read!(debug, "debug");
        read!(trust_proxy, "request.trust_proxy");
        read!(http_port, "request.http_port");
        read!(https_port, "request.https_port");
        read!(namespace_prefix, "controller.namespace_prefix");
        read!(server_address, "server.address");
        read!(default_limit, "collection.default_limit");
        read!(max_limit, "collection.max_limit");
        read!(default_order_by, "collection.default_order_by");
        read!(default_direction, "collection.default_direction");
        read!(message_field, "response.message_field");

        Ok(settings)
    }

    /// Apply `TIKILIVE_DEBUG` and `TIKILIVE_SERVER_ADDRESS` over file values.
    pub fn apply_env(&mut self, env: &EnvLoader) -> Result<()> {
        if let Some(value) = env.load_var_opt("DEBUG") {
            self.debug = parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue {
                key: format!("{}_DEBUG", ENV_PREFIX),
                reason: format!("'{}' is not a boolean", value),
            })?;
        }

        if let Some(value) = env.load_var_opt("SERVER_ADDRESS") {
            self.server_address = value;
        }

        Ok(())
    }

    /// Defaults, then the config directories in order, then the environment.
    pub fn load<I, P>(dirs: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<std::path::Path>,
    {
        let settings = Self::load_unvalidated(dirs)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Like [`Settings::load`], leaving validation to the caller so further
    /// overrides can be applied first.
    pub fn load_unvalidated<I, P>(dirs: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<std::path::Path>,
    {
        let config = ConfigService::from_dirs(dirs)?;
        let mut settings = Self::from_config(&config)?;
        settings.apply_env(&EnvLoader::new(Some(ENV_PREFIX.to_string())))?;
        Ok(settings)
    }

    pub fn url_options(&self) -> UrlOptions {
        UrlOptions {
            trust_proxy: self.trust_proxy,
            http_port: self.http_port,
            https_port: self.https_port,
        }
    }

    pub fn envelope_format(&self) -> EnvelopeFormat {
        EnvelopeFormat::new(self.message_field.clone())
    }

    pub fn translator(&self) -> ExceptionTranslator {
        ExceptionTranslator::new(self.debug)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_port(self.http_port, "request.http_port")?;
        ConfigValidator::is_port(self.https_port, "request.https_port")?;
        ConfigValidator::not_empty(&self.message_field, "response.message_field")?;
        ConfigValidator::not_empty(&self.default_order_by, "collection.default_order_by")?;
        ConfigValidator::one_of(
            &self.default_direction.to_uppercase().as_str(),
            &["ASC", "DESC"],
            "collection.default_direction",
        )?;
        ConfigValidator::in_range(self.default_limit, 1, self.max_limit, "collection.default_limit")
            .map_err(|_| {
                ConfigError::ValidationError(format!(
                    "collection.default_limit ({}) must be between 1 and collection.max_limit ({})",
                    self.default_limit, self.max_limit
                ))
            })?;
        ConfigValidator::is_socket_addr(&self.server_address, "server.address")?;
        Ok(())
    }
}
