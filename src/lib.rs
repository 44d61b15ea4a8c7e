pub mod types;
pub mod signing;
pub mod error;
pub mod client;
pub mod reconciler;
pub mod credentials;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod prometheus_metrics;
pub mod health;
pub mod server;

pub use client::{ApiClient, RigApi};
pub use error::ApiClientError;
pub use reconciler::RigStateReconciler;
pub use signing::{RequestSigner, SignedRequest};
pub use types::{ActionResult, ActionTaken, Credentials, MinerStatus, RigAction, RigStatus};
