use std::future::Future;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::types::Credentials;

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("missing credential: {0}")]
    Missing(String),
    #[error("failed to fetch secret {name}: {reason}")]
    Fetch { name: String, reason: String },
    #[error("failed to decode secret {name}: {reason}")]
    Decode { name: String, reason: String },
}

/// Where the signing credentials come from. Resolved once at startup.
pub trait CredentialsProvider {
    fn load(&self) -> impl Future<Output = Result<Credentials, CredentialsError>> + Send;
}

/// Credentials handed in directly, e.g. from command line flags.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }

    pub fn from_config(config: &Config) -> Result<Self, CredentialsError> {
        config
            .credentials()
            .map(Self)
            .map_err(|e| CredentialsError::Missing(e.to_string()))
    }
}

impl CredentialsProvider for StaticCredentials {
    async fn load(&self) -> Result<Credentials, CredentialsError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

/// Reads the key, secret and organization id from a Secret Manager style
/// REST endpoint, keyed by project.
#[derive(Debug, Clone)]
pub struct SecretManagerCredentials {
    http: Client,
    endpoint: String,
    project_id: String,
    token: Option<String>,
    key_name: String,
    secret_name: String,
    org_name: String,
}

impl SecretManagerCredentials {
    pub fn new(endpoint: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            token: None,
            key_name: "nicehash-api-key".to_string(),
            secret_name: "nicehash-api-secret".to_string(),
            org_name: "nicehash-org-id".to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, CredentialsError> {
        let project_id = config
            .secret_project_id
            .clone()
            .ok_or_else(|| CredentialsError::Missing("secret project id".to_string()))?;

        Ok(Self::new(config.secret_manager_url.clone(), project_id)
            .with_token(config.secret_manager_token.clone())
            .with_names(
                config.secret_name_key.clone(),
                config.secret_name_secret.clone(),
                config.secret_name_org.clone(),
            ))
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_names(mut self, key_name: String, secret_name: String, org_name: String) -> Self {
        self.key_name = key_name;
        self.secret_name = secret_name;
        self.org_name = org_name;
        self
    }

    fn secret_url(&self, name: &str) -> String {
        format!(
            "{}/v1/projects/{}/secrets/{}/versions/latest:access",
            self.endpoint, self.project_id, name
        )
    }

    async fn access(&self, name: &str) -> Result<String, CredentialsError> {
        let fetch_err = |reason: String| CredentialsError::Fetch { name: name.to_string(), reason };
        let decode_err = |reason: String| CredentialsError::Decode { name: name.to_string(), reason };

        debug!(secret = name, project = %self.project_id, "Fetching secret");

        let mut req = self.http.get(self.secret_url(name));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| fetch_err(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {}", status)));
        }

        let body: AccessSecretVersionResponse = resp.json().await.map_err(|e| decode_err(e.to_string()))?;
        let bytes = BASE64.decode(body.payload.data.as_bytes()).map_err(|e| decode_err(e.to_string()))?;
        let value = String::from_utf8(bytes).map_err(|e| decode_err(e.to_string()))?;

        // Secrets pasted into the console often carry a trailing newline
        Ok(value.trim_end().to_string())
    }
}

impl CredentialsProvider for SecretManagerCredentials {
    async fn load(&self) -> Result<Credentials, CredentialsError> {
        let api_key = self.access(&self.key_name).await?;
        let api_secret = self.access(&self.secret_name).await?;
        let organization_id = self.access(&self.org_name).await?;
        info!(project = %self.project_id, "Loaded API credentials from secret store");
        Ok(Credentials::new(api_key, api_secret, organization_id))
    }
}
