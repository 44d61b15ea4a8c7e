use std::future::Future;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ApiClientError;
use crate::signing::RequestSigner;
use crate::types::{Credentials, RigAction, RigStatus, UpdateRigStatusRequest};

pub const DEFAULT_BASE_URL: &str = "https://api2.nicehash.com";

pub const RIG_STATUS_PATH: &str = "/main/api/v2/mining/rig2";
pub const RIG_ACTION_PATH: &str = "/main/api/v2/mining/rigs/status2";

/// The two remote calls reconciliation needs.
pub trait RigApi {
    /// `Ok(None)` when the remote returns an empty status document.
    fn get_rig_status(
        &self,
        rig_id: &str,
    ) -> impl Future<Output = Result<Option<RigStatus>, ApiClientError>> + Send;

    fn update_rig_status(
        &self,
        rig_id: &str,
        action: RigAction,
    ) -> impl Future<Output = Result<Value, ApiClientError>> + Send;
}

/// Signed client for the mining management API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    signer: RequestSigner,
    http: Client,
    verbose: bool,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self::with_http_client(base_url, credentials, Client::new())
    }

    pub fn with_http_client(base_url: impl Into<String>, credentials: Credentials, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            signer: RequestSigner::new(credentials),
            http,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        }
    }

    /// Sends one signed request and returns the parsed JSON of a 200 response.
    ///
    /// The body is serialized exactly once; the same text is signed and sent.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: &str,
        path: &str,
        query: &str,
        body: Option<&B>,
    ) -> Result<Value, ApiClientError> {
        let body_json = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(ApiClientError::Encoding)?;

        let http_method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ApiClientError::InvalidRequest(format!("bad HTTP method {:?}", method)))?;

        let signed = self.signer.sign(method, path, query, body_json.as_deref());
        let url = self.url_for(path, query);

        if self.verbose {
            info!("{} {}", method, url);
        } else {
            debug!("{} {}", method, url);
        }

        let mut builder = self.http.request(http_method, &url);
        for (name, value) in signed.headers() {
            builder = builder.header(name, value);
        }
        if let Some(body_json) = body_json {
            builder = builder.body(body_json);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                ApiClientError::InvalidRequest(e.to_string())
            } else {
                ApiClientError::Transport(e)
            }
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(ApiClientError::Transport)?;

        if status == StatusCode::OK {
            return serde_json::from_slice(&bytes).map_err(ApiClientError::Decoding);
        }

        let reason = status.canonical_reason().unwrap_or("").to_string();
        let body = if bytes.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&bytes).into_owned())
        };
        Err(ApiClientError::Api {
            status: status.as_u16(),
            reason,
            body,
        })
    }
}

impl RigApi for ApiClient {
    async fn get_rig_status(&self, rig_id: &str) -> Result<Option<RigStatus>, ApiClientError> {
        let path = format!("{}/{}", RIG_STATUS_PATH, rig_id);
        let raw = self.request::<Value>("GET", &path, "", None).await?;
        Ok(RigStatus::from_json(rig_id, raw))
    }

    async fn update_rig_status(&self, rig_id: &str, action: RigAction) -> Result<Value, ApiClientError> {
        let body = UpdateRigStatusRequest {
            rig_id: rig_id.to_string(),
            action,
        };
        self.request("POST", RIG_ACTION_PATH, "", Some(&body)).await
    }
}
