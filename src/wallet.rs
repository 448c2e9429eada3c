//! Wallet key file loading and signer identity.
//!
//! Every mutating call is signed by the identity in a JSON key file (an RSA
//! JWK). Only the public modulus is needed here: the owner address is the
//! base64url sha-256 of the decoded modulus.

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// RSA JWK as stored in a ledger key file.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkWallet {
    /// Key type, "RSA" for ledger wallets
    pub kty: String,
    /// Public modulus, base64url
    pub n: String,
    /// Private exponent, present in signing wallets
    #[serde(default)]
    pub d: Option<String>,
}

impl JwkWallet {
    /// Read and parse a key file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Wallet {
            message: format!("could not read {}: {e}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::Wallet {
            message: format!("invalid key file {}: {e}", path.display()),
        })
    }

    /// Owner address derived from the public modulus.
    pub fn address(&self) -> Result<String> {
        let modulus = URL_SAFE_NO_PAD
            .decode(self.n.as_bytes())
            .map_err(|e| Error::Wallet {
                message: format!("invalid key modulus: {e}"),
            })?;
        Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(&modulus)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEST_JWK: &str = r#"{"kty":"RSA","n":"AQAB","e":"AQAB"}"#;

    #[test]
    fn test_load_and_derive_address() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEST_JWK.as_bytes()).unwrap();

        let wallet = JwkWallet::load(file.path()).unwrap();
        assert_eq!(wallet.kty, "RSA");
        assert!(wallet.d.is_none());

        let address = wallet.address().unwrap();
        // sha-256 is 32 bytes, base64url without padding is 43 chars
        assert_eq!(address.len(), 43);
        // deterministic for a fixed modulus
        assert_eq!(address, wallet.address().unwrap());
    }

    #[test]
    fn test_load_missing_file_is_wallet_error() {
        let err = JwkWallet::load(Path::new("/nonexistent/wallet.json")).unwrap_err();
        assert!(matches!(err, Error::Wallet { .. }));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        let err = JwkWallet::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Wallet { .. }));
    }
}
