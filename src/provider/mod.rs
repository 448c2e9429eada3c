//! Lifecycle interface implemented by resource reconcilers.
//!
//! Each resource kind implements five named operations driven by the engine:
//! check (validate), diff (replace-vs-update-vs-noop), create, update, and
//! read. Field names in failures and replace lists use the wire spelling
//! (`codeId`, `moduleId`, ...) so plan output matches what is stored.

use crate::error::Result;
use std::fmt;

pub mod code;
pub mod process;

pub use code::{CodeBundleProvider, CodeBundleSpec};
pub use process::{ProcessProvider, ProcessSpec};

/// A single validation failure on a declared input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    /// Wire name of the failing field
    pub property: &'static str,
    pub reason: String,
}

impl CheckFailure {
    pub fn new(property: &'static str, reason: impl Into<String>) -> Self {
        Self {
            property,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.reason)
    }
}

/// Verdict of comparing old and new declared inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Whether anything differs at all
    pub changes: bool,
    /// Fields whose change forces a destroy-and-recreate; empty means any
    /// change can be applied in place
    pub replaces: Vec<String>,
}

impl DiffResult {
    /// No differences.
    pub fn unchanged() -> Self {
        Self::default()
    }

    /// Whether the resource must be destroyed and recreated.
    pub fn requires_replacement(&self) -> bool {
        !self.replaces.is_empty()
    }
}

/// Result of creating a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResult<T> {
    /// Permanent network id assigned to the resource
    pub id: String,
    /// Declared inputs merged with resolved output fields
    pub outputs: T,
}

/// Five-operation lifecycle implemented by each reconciler.
pub trait ResourceProvider {
    /// Declared input type for this resource kind.
    type Inputs;

    /// Validate new inputs. Every failing field is reported together; an
    /// empty list means valid. Never mutates the network.
    fn check(&self, olds: Option<&Self::Inputs>, news: &Self::Inputs) -> Vec<CheckFailure>;

    /// Decide replace-vs-update-vs-noop between old and new inputs.
    fn diff(&self, id: &str, olds: &Self::Inputs, news: &Self::Inputs) -> Result<DiffResult>;

    /// Create the resource; returns its permanent id and resolved outputs.
    fn create(&self, news: &Self::Inputs) -> Result<CreateResult<Self::Inputs>>;

    /// Apply an in-place update. Only invoked when `diff` reported changes
    /// with no replacements.
    fn update(&self, id: &str, olds: &Self::Inputs, news: &Self::Inputs)
    -> Result<Self::Inputs>;

    /// Refresh inputs from the live network. Purely observational.
    fn read(&self, id: &str) -> Result<Self::Inputs>;
}
