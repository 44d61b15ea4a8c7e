use std::env;
use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

use crate::client::DEFAULT_BASE_URL;
use crate::types::Credentials;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[derive(Clone, PartialEq)]
pub struct Config {
    // Remote API
    pub base_url: String,
    pub organization_id: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub verbose: bool,

    // Logging
    pub log_level: String,

    // Listener
    pub listen_addr: String,
    pub legacy_empty_error_body: bool,

    // Secret store
    pub secret_project_id: Option<String>,
    pub secret_manager_url: String,
    pub secret_manager_token: Option<String>,
    pub secret_name_key: String,
    pub secret_name_secret: String,
    pub secret_name_org: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            organization_id: None,
            api_key: None,
            api_secret: None,
            verbose: false,

            log_level: "info".to_string(),

            listen_addr: "127.0.0.1:8080".to_string(),
            legacy_empty_error_body: false,

            secret_project_id: None,
            secret_manager_url: "https://secretmanager.googleapis.com".to_string(),
            secret_manager_token: None,
            secret_name_key: "nicehash-api-key".to_string(),
            secret_name_secret: "nicehash-api-secret".to_string(),
            secret_name_org: "nicehash-org-id".to_string(),
        }
    }
}

// api_key / api_secret / token are never printed.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("organization_id", &self.organization_id)
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .field("verbose", &self.verbose)
            .field("log_level", &self.log_level)
            .field("listen_addr", &self.listen_addr)
            .field("legacy_empty_error_body", &self.legacy_empty_error_body)
            .field("secret_project_id", &self.secret_project_id)
            .field("secret_manager_url", &self.secret_manager_url)
            .field("secret_manager_token", &redact(&self.secret_manager_token))
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(val) = lookup("NICEHASH_BASE_URL") {
            config.base_url = val;
        }
        config.organization_id = lookup("NICEHASH_ORG_ID");
        config.api_key = lookup("NICEHASH_API_KEY");
        config.api_secret = lookup("NICEHASH_API_SECRET");

        if let Some(val) = lookup("RIG_SWITCH_VERBOSE") {
            config.verbose = parse_flag("RIG_SWITCH_VERBOSE", &val)?;
        }

        if let Some(val) = lookup("LOG_LEVEL") {
            config.log_level = val;
        }

        if let Some(val) = lookup("LISTEN_ADDR") {
            config.listen_addr = val;
        }

        if let Some(val) = lookup("LEGACY_EMPTY_ERROR_BODY") {
            config.legacy_empty_error_body = parse_flag("LEGACY_EMPTY_ERROR_BODY", &val)?;
        }

        // Secret store
        config.secret_project_id = lookup("SECRET_PROJECT_ID");
        if let Some(val) = lookup("SECRET_MANAGER_URL") {
            config.secret_manager_url = val;
        }
        config.secret_manager_token = lookup("SECRET_MANAGER_TOKEN");
        if let Some(val) = lookup("SECRET_NAME_KEY") {
            config.secret_name_key = val;
        }
        if let Some(val) = lookup("SECRET_NAME_SECRET") {
            config.secret_name_secret = val;
        }
        if let Some(val) = lookup("SECRET_NAME_ORG") {
            config.secret_name_org = val;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http") {
            return Err(ConfigError::ValidationError("NICEHASH_BASE_URL must be a valid HTTP URL".to_string()));
        }

        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "LISTEN_ADDR must be host:port, got {}",
                self.listen_addr
            )));
        }

        if self.secret_project_id.is_some() && !self.secret_manager_url.starts_with("http") {
            return Err(ConfigError::ValidationError("SECRET_MANAGER_URL must be a valid HTTP URL".to_string()));
        }

        Ok(())
    }

    /// Credentials supplied directly through flags or environment.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let api_key = self.api_key.clone().ok_or_else(|| ConfigError::Missing("api key".to_string()))?;
        let api_secret = self
            .api_secret
            .clone()
            .ok_or_else(|| ConfigError::Missing("api secret".to_string()))?;
        let organization_id = self
            .organization_id
            .clone()
            .ok_or_else(|| ConfigError::Missing("organization id".to_string()))?;
        Ok(Credentials::new(api_key, api_secret, organization_id))
    }
}

fn parse_flag(name: &str, val: &str) -> Result<bool, ConfigError> {
    match val {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnvVar(name.to_string(), val.to_string())),
    }
}
