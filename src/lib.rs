//! # aoform
//!
//! Declarative management of AO processes and code bundles.
//!
//! A stack file declares the desired state of processes running on the AO
//! execution network and of the content-addressed Lua bundles they boot from.
//! The engine reconciles declared state against the live network:
//!
//! - **Check**: pre-flight validation of declared inputs
//! - **Diff**: decide replace-vs-update-vs-noop per resource
//! - **Create**: spawn a process or upload a bundle
//! - **Update**: mutate a live process in place via an Eval message
//! - **Read**: refresh cached fields from the gateway
//!
//! Processes and bundles are ledger entries and therefore immutable:
//! replacement creates a new entry and forgets the old id, and "destroy" only
//! removes local bookkeeping.

pub mod bundle;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod network;
pub mod provider;
pub mod retry;
pub mod state;
pub mod tags;
pub mod wallet;
