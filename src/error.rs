//! Error types for aoform operations.
//!
//! Remote failures fall into two camps with opposite handling: transport
//! failures (network, not-yet-indexed reads) are safe to retry, while a
//! remote-reported Eval error is always fatal because re-sending a failed
//! code mutation risks double application.

use thiserror::Error;

/// Errors that can occur while reconciling resources against the network.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure talking to the gateway or network endpoints
    #[error("network error: {message}")]
    Network {
        /// Detailed error message from the failed call
        message: String,
    },

    /// Transaction missing from the gateway, or present but not yet
    /// confirmed (no owner)
    #[error("transaction {id} not found on gateway {gateway}")]
    TxNotFound {
        /// Gateway URL the lookup went to
        gateway: String,
        /// Transaction id that could not be resolved
        id: String,
    },

    /// The process reported an error evaluating an Eval message
    #[error("remote eval failed: {message}")]
    RemoteEval {
        /// Error text as reported by the process
        message: String,
    },

    /// Wallet key file could not be read or parsed
    #[error("wallet error: {message}")]
    Wallet {
        /// What went wrong with the key file
        message: String,
    },

    /// Lua source could not be loaded or bundled
    #[error("bundle error: {message}")]
    Bundle {
        /// What went wrong while preparing content
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        Error::Network {
            message: e.to_string(),
        }
    }
}

/// Result type for aoform operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_not_found_names_gateway_and_id() {
        let err = Error::TxNotFound {
            gateway: "https://arweave.net".to_string(),
            id: "abc".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("https://arweave.net"));
        assert!(message.contains("abc"));
    }

    #[test]
    fn test_remote_eval_carries_remote_message() {
        let err = Error::RemoteEval {
            message: "attempt to index a nil value".to_string(),
        };
        assert!(err.to_string().contains("attempt to index a nil value"));
    }
}
