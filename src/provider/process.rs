//! Process reconciler: the replace-vs-update state machine and the remote
//! mutations that apply its verdicts.
//!
//! A process is spawned once and then only mutable through Eval messages:
//! the environment table and the installed code can change in place, while
//! name, module, scheduler, authority and spawn-time tags are frozen into the
//! ledger entry and force a replacement.
//!
//! The create path retries its Eval and its confirming transaction read (a
//! fresh process is often not reachable or indexed yet). The update path
//! deliberately does not retry: re-sending a failed code mutation could apply
//! side effects twice, so a failure there surfaces immediately.

use crate::error::{Error, Result};
use crate::gateway::GatewayReader;
use crate::ids::TxRef;
use crate::network::{AoNetwork, MessageRequest, SpawnRequest};
use crate::provider::{CheckFailure, CreateResult, DiffResult, ResourceProvider};
use crate::retry;
use crate::tags::{self, Tag};
use crate::wallet::JwkWallet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// On-Boot marker for processes booting from inline spawn data instead of a
/// content-addressed bundle.
const ON_BOOT_DATA: &str = "Data";

/// Boot hook invoked after installing environment or code, when defined.
const INIT_INVOCATION: &str = "if type(Init) == \"function\" then Init() end";

/// Declared state of a process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSpec {
    /// Human label, frozen into the Name tag at spawn time
    pub name: String,
    /// Output-only: address of the controlling identity
    #[serde(default)]
    pub owner: String,
    /// Inline boot code; mutually exclusive with `code_id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Reference to an uploaded code bundle; mutually exclusive with `code`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_id: Option<TxRef>,
    pub module_id: TxRef,
    pub scheduler_id: TxRef,
    pub authority_id: TxRef,
    /// Arbitrary metadata attached at spawn time; immutable on a live process
    #[serde(default)]
    pub custom_tags: BTreeMap<String, String>,
    /// Mutable at runtime via an Eval message
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Output-only: resolved on-chain tag set
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ProcessSpec {
    /// Copy of the declared inputs with resolved output fields attached.
    fn with_outputs(&self, owner: String, tags: BTreeMap<String, String>) -> Self {
        Self {
            name: self.name.clone(),
            owner,
            code: self.code.clone(),
            code_id: self.code_id.clone(),
            module_id: self.module_id.clone(),
            scheduler_id: self.scheduler_id.clone(),
            authority_id: self.authority_id.clone(),
            custom_tags: self.custom_tags.clone(),
            environment: self.environment.clone(),
            tags,
        }
    }
}

/// Render the environment map as a Lua global table assignment. Ends with a
/// newline so further code can follow in the same Eval body.
fn environment_statement(environment: &BTreeMap<String, String>) -> String {
    let entries = environment
        .iter()
        .map(|(name, value)| format!("[\"{name}\"]=\"{value}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Environment = {{ {entries} }}\n")
}

/// Environment maps are compared through their JSON rendering, not semantic
/// map equality. BTreeMap keeps the rendering deterministic.
fn environment_differs(
    olds: &BTreeMap<String, String>,
    news: &BTreeMap<String, String>,
) -> Result<bool> {
    Ok(serde_json::to_string(olds)? != serde_json::to_string(news)?)
}

/// Two-way unordered comparison, short-circuited at the first mismatch.
fn custom_tags_differ(
    olds: &BTreeMap<String, String>,
    news: &BTreeMap<String, String>,
) -> bool {
    for (name, value) in news {
        if olds.get(name) != Some(value) {
            return true;
        }
    }
    for (name, value) in olds {
        if news.get(name) != Some(value) {
            return true;
        }
    }
    false
}

/// A reference must be concrete by the time it is sent to the network.
fn resolved(reference: &TxRef, field: &str) -> Result<String> {
    reference
        .as_id()
        .map(str::to_string)
        .ok_or_else(|| Error::Other(format!("{field} is still unresolved at apply time")))
}

/// Reconciler for process resources.
pub struct ProcessProvider<N, G> {
    network: N,
    gateway: G,
    wallet_path: PathBuf,
    retry_delay: Duration,
}

impl<N, G> ProcessProvider<N, G> {
    pub fn new(network: N, gateway: G, wallet_path: PathBuf) -> Self {
        Self {
            network,
            gateway,
            wallet_path,
            retry_delay: retry::DEFAULT_DELAY,
        }
    }

    /// Replace the fixed delay between create-path retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

impl<N: AoNetwork, G: GatewayReader> ResourceProvider for ProcessProvider<N, G> {
    type Inputs = ProcessSpec;

    fn check(&self, _olds: Option<&ProcessSpec>, news: &ProcessSpec) -> Vec<CheckFailure> {
        let mut failures = Vec::new();

        if news.code.is_some() && news.code_id.is_some() {
            failures.push(CheckFailure::new(
                "codeId",
                "Only one of 'code' or 'codeId' can be set",
            ));
            failures.push(CheckFailure::new(
                "code",
                "Only one of 'code' or 'codeId' can be set",
            ));
        }

        if news.code.is_none() && news.code_id.is_none() {
            failures.push(CheckFailure::new(
                "codeId",
                "One of 'code' or 'codeId' must be set",
            ));
            failures.push(CheckFailure::new(
                "code",
                "One of 'code' or 'codeId' must be set",
            ));
        }

        if let Some(code_id) = &news.code_id {
            if !code_id.is_valid_tx_id() {
                failures.push(CheckFailure::new("codeId", format!("ID invalid: {code_id}")));
            }
        }

        if !news.module_id.is_valid_tx_id() {
            failures.push(CheckFailure::new(
                "moduleId",
                format!("ID invalid: {}", news.module_id),
            ));
        }

        if !news.scheduler_id.is_valid_tx_id() {
            failures.push(CheckFailure::new(
                "schedulerId",
                format!("ID invalid: {}", news.scheduler_id),
            ));
        }

        if !news.authority_id.is_valid_tx_id() {
            failures.push(CheckFailure::new(
                "authorityId",
                format!("ID invalid: {}", news.authority_id),
            ));
        }

        failures
    }

    fn diff(&self, _id: &str, olds: &ProcessSpec, news: &ProcessSpec) -> Result<DiffResult> {
        let mut replaces = Vec::new();
        if olds.name != news.name {
            replaces.push("name".to_string());
        }
        if olds.module_id != news.module_id {
            replaces.push("moduleId".to_string());
        }
        if olds.scheduler_id != news.scheduler_id {
            replaces.push("schedulerId".to_string());
        }
        if olds.authority_id != news.authority_id {
            replaces.push("authorityId".to_string());
        }
        if custom_tags_differ(&olds.custom_tags, &news.custom_tags) {
            replaces.push("customTags".to_string());
        }

        let updates = olds.code_id != news.code_id
            || olds.code != news.code
            || environment_differs(&olds.environment, &news.environment)?;

        let changes = !replaces.is_empty() || updates;
        Ok(DiffResult { changes, replaces })
    }

    /// Spawn a new process, install its environment, and confirm the
    /// on-chain record to resolve owner and tags.
    fn create(&self, news: &ProcessSpec) -> Result<CreateResult<ProcessSpec>> {
        let wallet = JwkWallet::load(&self.wallet_path)?;
        let signer = wallet.address()?;

        let boot = match &news.code_id {
            Some(code_id) => resolved(code_id, "codeId")?,
            None => ON_BOOT_DATA.to_string(),
        };

        // custom tags first, system tags last so they win the network's
        // tag-resolution rule on collision
        let mut all_tags = tags::tags_from_map(&news.custom_tags);
        all_tags.push(Tag::new("Name", news.name.clone()));
        all_tags.push(Tag::new("On-Boot", boot));
        all_tags.push(Tag::new("Authority", resolved(&news.authority_id, "authorityId")?));

        let process_id = self.network.spawn(&SpawnRequest {
            module: resolved(&news.module_id, "moduleId")?,
            scheduler: resolved(&news.scheduler_id, "schedulerId")?,
            signer: signer.clone(),
            tags: all_tags,
            data: news.code.clone(),
        })?;
        log::info!("spawned process {process_id} ({})", news.name);

        // The fresh process may not be reachable yet; the generated code is
        // idempotent, so re-sending the same Eval is safe.
        let eval = format!(
            "{}{INIT_INVOCATION}\n",
            environment_statement(&news.environment)
        );
        retry::retry_with_delay(retry::DEFAULT_ATTEMPTS, self.retry_delay, || {
            self.network.message(&MessageRequest {
                process: process_id.clone(),
                signer: signer.clone(),
                tags: vec![Tag::new("Action", "Eval")],
                data: eval.clone(),
            })
        })?;

        // owner and the final tag set are assigned asynchronously after spawn
        let tx = retry::retry_with_delay(retry::DEFAULT_ATTEMPTS, self.retry_delay, || {
            self.gateway.load_tx(&process_id)
        })?;

        let outputs = news.with_outputs(tx.owner, tags::tags_to_map(&tx.tags));
        Ok(CreateResult {
            id: process_id,
            outputs,
        })
    }

    /// Apply environment and code changes to a live process through a single
    /// Eval message. Not retried; a remote-reported error is fatal.
    fn update(&self, id: &str, olds: &ProcessSpec, news: &ProcessSpec) -> Result<ProcessSpec> {
        let mut code_update = String::new();

        if environment_differs(&olds.environment, &news.environment)? {
            code_update.push_str(&environment_statement(&news.environment));
        }

        let mut code_changed = false;
        if let Some(code) = &news.code {
            if news.code_id.is_none() && olds.code.as_deref() != Some(code) {
                code_update.push_str(code);
                code_changed = true;
            }
        }
        if let Some(code_id) = &news.code_id {
            if news.code.is_none() && olds.code_id.as_ref() != Some(code_id) {
                let bundle_id = resolved(code_id, "codeId")?;
                code_update.push_str(&self.gateway.load_code(&bundle_id)?);
                code_changed = true;
            }
        }

        // Init is only re-invoked when installed code actually changed
        if code_changed {
            code_update.push('\n');
            code_update.push_str(INIT_INVOCATION);
        }

        let wallet = JwkWallet::load(&self.wallet_path)?;
        let message_id = self.network.message(&MessageRequest {
            process: id.to_string(),
            signer: wallet.address()?,
            tags: vec![Tag::new("Action", "Eval")],
            data: code_update,
        })?;

        let result = self.network.result(id, &message_id)?;
        if let Some(message) = result.error {
            return Err(Error::RemoteEval { message });
        }
        log::info!("updated process {id} ({})", news.name);

        // owner and tags are not re-resolved on update
        Ok(news.with_outputs(olds.owner.clone(), olds.tags.clone()))
    }

    /// Rebuild declared fields from the on-chain record.
    fn read(&self, id: &str) -> Result<ProcessSpec> {
        let tx = self.gateway.load_tx(id)?;
        let tag = |name: &str| tags::tag_value(&tx.tags, name).unwrap_or_default().to_string();

        let boot = tag("On-Boot");
        let code_id = if boot.is_empty() || boot == ON_BOOT_DATA {
            None
        } else {
            Some(TxRef::parse(&boot))
        };

        Ok(ProcessSpec {
            name: tag("Name"),
            owner: tx.owner.clone(),
            code: None,
            code_id,
            module_id: TxRef::parse(&tag("Module")),
            scheduler_id: TxRef::parse(&tag("Scheduler")),
            authority_id: TxRef::parse(&tag("Authority")),
            custom_tags: BTreeMap::new(),
            environment: BTreeMap::new(),
            tags: tags::tags_to_map(&tx.tags),
        })
    }
}
