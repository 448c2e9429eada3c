//! Read-only access to on-chain transaction records.
//!
//! The gateway exposes a GraphQL endpoint for transaction metadata and plain
//! content URLs for transaction data. A record without an owner is treated as
//! not found: the transaction exists but has not been confirmed or indexed
//! yet, which callers on the create path mask with retries.

use crate::error::{Error, Result};
use crate::tags::Tag;
use serde::Deserialize;
use serde_json::json;

/// A confirmed on-chain transaction record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    pub id: String,
    /// Address of the signing identity
    pub owner: String,
    /// Ordered tag set as stored on chain
    pub tags: Vec<Tag>,
}

/// Read access to the content-addressed ledger.
pub trait GatewayReader {
    /// Fetch the transaction record for `id`. Fails with
    /// [`Error::TxNotFound`] when the transaction is missing or not yet
    /// confirmed (no owner).
    fn load_tx(&self, id: &str) -> Result<TxRecord>;

    /// Fetch raw transaction content as text.
    fn load_code(&self, id: &str) -> Result<String>;
}

/// HTTP gateway client.
pub struct GatewayClient {
    agent: ureq::Agent,
    gateway_url: String,
}

impl GatewayClient {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            gateway_url: gateway_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Gateway base URL, without a trailing slash.
    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    fn graphql_url(&self) -> String {
        format!("{}/graphql", self.gateway_url)
    }

    fn content_url(&self, id: &str) -> String {
        format!("{}/{}", self.gateway_url, id)
    }

    fn not_found(&self, id: &str) -> Error {
        Error::TxNotFound {
            gateway: self.gateway_url.clone(),
            id: id.to_string(),
        }
    }
}

impl GatewayReader for GatewayClient {
    fn load_tx(&self, id: &str) -> Result<TxRecord> {
        let query = format!(
            "{{ transaction(id: \"{id}\") {{ id owner {{address}} tags {{name value}} }} }}"
        );

        let response: GraphqlResponse = self
            .agent
            .post(&self.graphql_url())
            .send_json(json!({ "query": query }))?
            .body_mut()
            .read_json()?;

        let tx = response
            .data
            .and_then(|d| d.transaction)
            .ok_or_else(|| self.not_found(id))?;

        // owner is assigned asynchronously after submission; its absence
        // means the record is not confirmed yet
        let owner = tx.owner.ok_or_else(|| self.not_found(id))?;

        Ok(TxRecord {
            id: tx.id,
            owner: owner.address,
            tags: tx.tags,
        })
    }

    fn load_code(&self, id: &str) -> Result<String> {
        let mut response = self.agent.get(&self.content_url(id)).call()?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::Network {
                message: format!("could not read content of {id}: {e}"),
            })
    }
}

// =============================================================================
// GraphQL response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    transaction: Option<GraphqlTx>,
}

#[derive(Debug, Deserialize)]
struct GraphqlTx {
    id: String,
    owner: Option<GraphqlOwner>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct GraphqlOwner {
    address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_strip_trailing_slash() {
        let client = GatewayClient::new("https://arweave.net/");
        assert_eq!(client.gateway_url(), "https://arweave.net");
        assert_eq!(client.graphql_url(), "https://arweave.net/graphql");
        assert_eq!(
            client.content_url("abc123"),
            "https://arweave.net/abc123"
        );
    }

    #[test]
    fn test_graphql_response_parses_full_record() {
        let body = r#"{
            "data": {
                "transaction": {
                    "id": "tx1",
                    "owner": {"address": "owner1"},
                    "tags": [{"name": "Name", "value": "demo"}]
                }
            }
        }"#;
        let response: GraphqlResponse = serde_json::from_str(body).unwrap();
        let tx = response.data.unwrap().transaction.unwrap();
        assert_eq!(tx.id, "tx1");
        assert_eq!(tx.owner.unwrap().address, "owner1");
        assert_eq!(tx.tags, vec![Tag::new("Name", "demo")]);
    }

    #[test]
    fn test_graphql_response_missing_transaction_is_none() {
        let body = r#"{"data": {"transaction": null}}"#;
        let response: GraphqlResponse = serde_json::from_str(body).unwrap();
        assert!(response.data.unwrap().transaction.is_none());
    }

    #[test]
    fn test_graphql_response_owner_may_be_absent() {
        let body = r#"{"data": {"transaction": {"id": "tx1", "owner": null, "tags": []}}}"#;
        let response: GraphqlResponse = serde_json::from_str(body).unwrap();
        let tx = response.data.unwrap().transaction.unwrap();
        assert!(tx.owner.is_none());
    }
}
