//! Execution-network RPC seam.
//!
//! Three remote surfaces back the reconcilers: spawning processes and sending
//! messages (messenger endpoint), fetching message evaluation results
//! (compute endpoint), and uploading content-addressed bundles (upload
//! service). Each surface is a trait so the reconcilers can be exercised
//! against recording fakes.

use crate::error::Result;
use crate::tags::Tag;
use crate::wallet::JwkWallet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Request to spawn a new process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnRequest {
    pub module: String,
    pub scheduler: String,
    pub signer: String,
    pub tags: Vec<Tag>,
    /// Inline boot code, if the process is not booting from a bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Message sent to a live process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRequest {
    pub process: String,
    pub signer: String,
    pub tags: Vec<Tag>,
    pub data: String,
}

/// Outcome of evaluating a message, as reported by the compute endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvalResult {
    /// Remote-reported evaluation error. Fatal to the caller; never retried.
    #[serde(rename = "Error", default)]
    pub error: Option<String>,
}

/// Receipt for an uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    pub id: String,
    pub owner: String,
}

/// Mutating RPC surface of the execution network.
pub trait AoNetwork {
    /// Spawn a new process; returns its permanent id.
    fn spawn(&self, request: &SpawnRequest) -> Result<String>;

    /// Send a message to a live process; returns the message id.
    fn message(&self, request: &MessageRequest) -> Result<String>;

    /// Fetch the evaluation result of a message.
    fn result(&self, process: &str, message: &str) -> Result<EvalResult>;
}

/// Content-addressed upload store.
pub trait CodeStore {
    /// Upload content with the given tags; returns the assigned id and the
    /// uploading identity.
    fn upload(&self, content: &str, tags: &[Tag]) -> Result<UploadReceipt>;
}

// =============================================================================
// HTTP implementations
// =============================================================================

/// HTTP client for the messenger and compute endpoints.
pub struct HttpAoClient {
    agent: ureq::Agent,
    mu_url: String,
    cu_url: String,
}

impl HttpAoClient {
    pub fn new(mu_url: impl Into<String>, cu_url: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            mu_url: mu_url.into().trim_end_matches('/').to_string(),
            cu_url: cu_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn spawn_url(&self) -> String {
        format!("{}/spawn", self.mu_url)
    }

    fn message_url(&self) -> String {
        format!("{}/message", self.mu_url)
    }

    fn result_url(&self, process: &str, message: &str) -> String {
        format!("{}/result/{message}?process-id={process}", self.cu_url)
    }
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

impl AoNetwork for HttpAoClient {
    fn spawn(&self, request: &SpawnRequest) -> Result<String> {
        let response: IdResponse = self
            .agent
            .post(&self.spawn_url())
            .send_json(request)?
            .body_mut()
            .read_json()?;
        Ok(response.id)
    }

    fn message(&self, request: &MessageRequest) -> Result<String> {
        let response: IdResponse = self
            .agent
            .post(&self.message_url())
            .send_json(request)?
            .body_mut()
            .read_json()?;
        Ok(response.id)
    }

    fn result(&self, process: &str, message: &str) -> Result<EvalResult> {
        let result: EvalResult = self
            .agent
            .get(&self.result_url(process, message))
            .call()?
            .body_mut()
            .read_json()?;
        Ok(result)
    }
}

/// HTTP upload client, authenticated with the configured wallet.
pub struct HttpCodeStore {
    agent: ureq::Agent,
    upload_url: String,
    wallet_path: PathBuf,
}

impl HttpCodeStore {
    pub fn new(upload_url: impl Into<String>, wallet_path: PathBuf) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
            wallet_path,
        }
    }

    fn tx_url(&self) -> String {
        format!("{}/tx", self.upload_url)
    }
}

impl CodeStore for HttpCodeStore {
    fn upload(&self, content: &str, tags: &[Tag]) -> Result<UploadReceipt> {
        let wallet = JwkWallet::load(&self.wallet_path)?;
        let signer = wallet.address()?;

        let response: UploadReceipt = self
            .agent
            .post(&self.tx_url())
            .send_json(serde_json::json!({
                "owner": signer,
                "data": content,
                "size": content.len(),
                "tags": tags,
            }))?
            .body_mut()
            .read_json()?;
        Ok(response)
    }
}
