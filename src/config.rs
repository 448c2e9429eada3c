//! Declared stack configuration.
//!
//! A stack file (`aoform.toml` by default) declares network settings plus the
//! desired code bundles and processes. Declarations are converted into
//! provider specs at apply time so cross-resource references can be resolved
//! against local state.

use crate::ids::TxRef;
use crate::provider::{CodeBundleSpec, ProcessSpec};
use crate::state::StackState;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level stack file.
#[derive(Debug, Deserialize)]
pub struct StackConfig {
    pub settings: Settings,
    #[serde(default, rename = "code")]
    pub code_bundles: Vec<CodeBundleDecl>,
    #[serde(default, rename = "process")]
    pub processes: Vec<ProcessDecl>,
}

/// Network endpoints and the signing wallet.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Path to the JSON wallet key file, tilde-expanded
    pub wallet_path: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    /// Messenger endpoint (spawn, message)
    #[serde(default = "default_mu_url")]
    pub mu_url: String,
    /// Compute endpoint (message results)
    #[serde(default = "default_cu_url")]
    pub cu_url: String,
    /// Upload service for code bundles
    #[serde(default = "default_upload_url")]
    pub upload_url: String,
}

fn default_gateway_url() -> String {
    "https://arweave.net".to_string()
}

fn default_mu_url() -> String {
    "https://mu.ao-testnet.xyz".to_string()
}

fn default_cu_url() -> String {
    "https://cu.ao-testnet.xyz".to_string()
}

fn default_upload_url() -> String {
    "https://upload.ardrive.io".to_string()
}

/// A declared code bundle upload.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeBundleDecl {
    pub name: String,
    pub file_path: String,
    /// Statically bundle transitive requires before upload
    #[serde(default)]
    pub bundle_lua_code: bool,
}

/// A declared process.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessDecl {
    pub name: String,
    /// Inline boot code
    #[serde(default)]
    pub code: Option<String>,
    /// Concrete id of an already-uploaded bundle
    #[serde(default)]
    pub code_id: Option<String>,
    /// Name of a `[[code]]` bundle declared in this stack
    #[serde(default)]
    pub code_ref: Option<String>,
    pub module_id: String,
    pub scheduler_id: String,
    pub authority_id: String,
    #[serde(default)]
    pub custom_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl StackConfig {
    /// Load a stack file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read stack file: {}", path.display()))?;
        let config: StackConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid stack file: {}", path.display()))?;

        log::debug!(
            "loaded stack with {} bundles and {} processes",
            config.code_bundles.len(),
            config.processes.len()
        );
        Ok(config)
    }

    /// Expanded wallet path.
    pub fn wallet_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.settings.wallet_path).as_ref())
    }
}

impl CodeBundleDecl {
    /// Build the declared spec. Output fields stay empty until resolved.
    pub fn to_spec(&self) -> CodeBundleSpec {
        CodeBundleSpec {
            name: self.name.clone(),
            owner: String::new(),
            file_path: PathBuf::from(shellexpand::tilde(&self.file_path).as_ref()),
            bundle_lua_code: self.bundle_lua_code,
            sha256: String::new(),
        }
    }
}

impl ProcessDecl {
    /// Build the declared spec, resolving `code_ref` against ids assigned in
    /// local state. A reference to a bundle that has not been applied yet
    /// becomes a deferred id, which validation accepts.
    pub fn to_spec(&self, state: &StackState) -> Result<ProcessSpec> {
        let code_id = match (&self.code_id, &self.code_ref) {
            (Some(_), Some(_)) => bail!(
                "process '{}': only one of 'code_id' or 'code_ref' can be set",
                self.name
            ),
            (Some(id), None) => Some(TxRef::parse(id)),
            (None, Some(reference)) => Some(
                state
                    .code_bundle_id(reference)
                    .map(|id| TxRef::Id(id.to_string()))
                    .unwrap_or(TxRef::Deferred),
            ),
            (None, None) => None,
        };

        Ok(ProcessSpec {
            name: self.name.clone(),
            owner: String::new(),
            code: self.code.clone(),
            code_id,
            module_id: TxRef::parse(&self.module_id),
            scheduler_id: TxRef::parse(&self.scheduler_id),
            authority_id: TxRef::parse(&self.authority_id),
            custom_tags: self.custom_tags.clone(),
            environment: self.environment.clone(),
            tags: BTreeMap::new(),
        })
    }
}
