//! Local stack state.
//!
//! Tracks, per declared resource, the network id assigned at create time and
//! the inputs that were last applied. The diff step compares these recorded
//! inputs against the current declaration. Removing an entry is all "destroy"
//! amounts to: ledger entries are immutable and stay on the network.

use crate::provider::{CodeBundleSpec, ProcessSpec};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Recorded state for the whole stack.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StackState {
    #[serde(default)]
    pub code_bundles: BTreeMap<String, CodeBundleState>,
    #[serde(default)]
    pub processes: BTreeMap<String, ProcessState>,
}

/// A tracked code bundle upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBundleState {
    pub id: String,
    pub inputs: CodeBundleSpec,
}

/// A tracked process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessState {
    pub id: String,
    pub inputs: ProcessSpec,
}

impl StackState {
    /// Default state file location (~/.local/state/aoform/state.toml).
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home
            .join(".local")
            .join("state")
            .join("aoform")
            .join("state.toml"))
    }

    /// Load state from disk, or return default if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("state file does not exist, starting empty");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: StackState = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            toml::to_string_pretty(self).context("Failed to serialize state to TOML")?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("saved state to {}", path.display());
        Ok(())
    }

    /// Network id assigned to a tracked code bundle, if applied.
    pub fn code_bundle_id(&self, name: &str) -> Option<&str> {
        self.code_bundles.get(name).map(|s| s.id.as_str())
    }

    /// Record a created or replaced code bundle.
    pub fn record_code_bundle(&mut self, name: &str, id: &str, inputs: &CodeBundleSpec) {
        self.code_bundles.insert(
            name.to_string(),
            CodeBundleState {
                id: id.to_string(),
                inputs: inputs.clone(),
            },
        );
    }

    /// Record a created, replaced, or updated process.
    pub fn record_process(&mut self, name: &str, id: &str, inputs: &ProcessSpec) {
        self.processes.insert(
            name.to_string(),
            ProcessState {
                id: id.to_string(),
                inputs: inputs.clone(),
            },
        );
    }

    /// Forget a tracked resource by name; returns whether anything was
    /// removed.
    pub fn forget(&mut self, name: &str) -> bool {
        self.code_bundles.remove(name).is_some() | self.processes.remove(name).is_some()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.code_bundles.clear();
        self.processes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.code_bundles.is_empty() && self.processes.is_empty()
    }
}
