//! Reconciliation engine driving the resource lifecycle.
//!
//! Plan and apply walk the declared stack in dependency order: code bundles
//! first, processes second, so a process referencing a bundle by name picks
//! up the id assigned moments earlier. Apply validates every resource before
//! mutating anything; a single invalid declaration aborts the whole run.

use crate::config::StackConfig;
use crate::gateway::GatewayClient;
use crate::network::{HttpAoClient, HttpCodeStore};
use crate::provider::{
    CheckFailure, CodeBundleProvider, DiffResult, ProcessProvider, ProcessSpec, ResourceProvider,
};
use crate::state::StackState;
use anyhow::{Result, bail};
use colored::Colorize;
use std::path::PathBuf;

/// What an apply would do to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Create,
    /// Destroy and recreate, keyed by the fields that force it
    Replace(Vec<String>),
    Update,
    NoChange,
}

/// Map a diff outcome to the action apply would take.
pub fn verdict(diff: &DiffResult) -> Verdict {
    if !diff.changes {
        Verdict::NoChange
    } else if diff.requires_replacement() {
        Verdict::Replace(diff.replaces.clone())
    } else {
        Verdict::Update
    }
}

/// Counts of actions taken (or planned) per kind.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub created: usize,
    pub replaced: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl Summary {
    pub fn count(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Create => self.created += 1,
            Verdict::Replace(_) => self.replaced += 1,
            Verdict::Update => self.updated += 1,
            Verdict::NoChange => self.unchanged += 1,
        }
    }

    pub fn total_changes(&self) -> usize {
        self.created + self.replaced + self.updated
    }
}

/// Merge a live record into the locally tracked inputs. Spawn-frozen fields
/// and the owner come from the network; inline code and the environment table
/// are not readable remotely, so the recorded values are carried over.
fn merge_refreshed(recorded: &ProcessSpec, live: ProcessSpec) -> ProcessSpec {
    let code = if live.code_id.is_none() {
        recorded.code.clone()
    } else {
        None
    };
    ProcessSpec {
        code,
        environment: recorded.environment.clone(),
        ..live
    }
}

/// Drives the declared stack against the network.
pub struct Engine {
    config: StackConfig,
    state: StackState,
    state_path: PathBuf,
    bundles: CodeBundleProvider<HttpCodeStore>,
    processes: ProcessProvider<HttpAoClient, GatewayClient>,
}

impl Engine {
    pub fn new(config: StackConfig, state: StackState, state_path: PathBuf) -> Self {
        let settings = &config.settings;
        let wallet_path = config.wallet_path();

        let bundles = CodeBundleProvider::new(HttpCodeStore::new(
            &settings.upload_url,
            wallet_path.clone(),
        ));
        let processes = ProcessProvider::new(
            HttpAoClient::new(&settings.mu_url, &settings.cu_url),
            GatewayClient::new(&settings.gateway_url),
            wallet_path,
        );

        Self {
            config,
            state,
            state_path,
            bundles,
            processes,
        }
    }

    /// Show what an apply would change. Never mutates the network or state.
    pub fn plan(&self) -> Result<()> {
        let mut summary = Summary::default();
        let mut failures = 0;

        println!();
        for decl in &self.config.code_bundles {
            let news = decl.to_spec();
            let tracked = self.state.code_bundles.get(&decl.name);
            let problems = self.bundles.check(tracked.map(|t| &t.inputs), &news);
            if !problems.is_empty() {
                print_failures("code", &decl.name, &problems);
                failures += problems.len();
                continue;
            }

            let action = match tracked {
                None => Verdict::Create,
                Some(t) => verdict(&self.bundles.diff(&t.id, &t.inputs, &news)?),
            };
            print_verdict("code", &decl.name, &action);
            summary.count(&action);
        }

        for decl in &self.config.processes {
            let news = decl.to_spec(&self.state)?;
            let tracked = self.state.processes.get(&decl.name);
            let problems = self.processes.check(tracked.map(|t| &t.inputs), &news);
            if !problems.is_empty() {
                print_failures("process", &decl.name, &problems);
                failures += problems.len();
                continue;
            }

            let action = match tracked {
                None => Verdict::Create,
                Some(t) => verdict(&self.processes.diff(&t.id, &t.inputs, &news)?),
            };
            print_verdict("process", &decl.name, &action);
            summary.count(&action);
        }

        println!();
        if failures > 0 {
            bail!("{failures} validation failures");
        }
        if summary.total_changes() == 0 {
            println!("  {} No changes", "✓".green());
        } else {
            println!(
                "  {} to create, {} to replace, {} to update, {} unchanged",
                summary.created, summary.replaced, summary.updated, summary.unchanged
            );
        }
        Ok(())
    }

    /// Apply the declared stack, saving state after every successful step so
    /// an aborted run never forgets an id that was already assigned.
    pub fn up(&mut self) -> Result<()> {
        self.validate_all()?;

        let Self {
            config,
            state,
            state_path,
            bundles,
            processes,
        } = self;
        let mut summary = Summary::default();

        println!();
        for decl in &config.code_bundles {
            let news = decl.to_spec();
            let tracked = state.code_bundles.get(&decl.name).cloned();

            let action = match &tracked {
                None => Verdict::Create,
                Some(t) => verdict(&bundles.diff(&t.id, &t.inputs, &news)?),
            };
            summary.count(&action);
            match action {
                Verdict::NoChange => {
                    println!("  {} code/{} unchanged", "○".dimmed(), decl.name);
                }
                // bundles have no in-place update path
                _ => {
                    let result = bundles.create(&news)?;
                    println!("  {} code/{} {}", "✓".green(), decl.name, result.id);
                    state.record_code_bundle(&decl.name, &result.id, &result.outputs);
                    state.save(state_path)?;
                }
            }
        }

        // re-resolve after bundle uploads so code refs point at fresh ids
        for decl in &config.processes {
            let news = decl.to_spec(state)?;
            let tracked = state.processes.get(&decl.name).cloned();

            let action = match &tracked {
                None => Verdict::Create,
                Some(t) => verdict(&processes.diff(&t.id, &t.inputs, &news)?),
            };
            summary.count(&action);
            match (action, tracked) {
                (Verdict::NoChange, _) => {
                    println!("  {} process/{} unchanged", "○".dimmed(), decl.name);
                }
                (Verdict::Update, Some(t)) => {
                    let outputs = processes.update(&t.id, &t.inputs, &news)?;
                    println!("  {} process/{} updated", "✓".green(), decl.name);
                    state.record_process(&decl.name, &t.id, &outputs);
                    state.save(state_path)?;
                }
                (Verdict::Replace(fields), _) => {
                    println!(
                        "  {} process/{} replaced ({})",
                        "±".yellow(),
                        decl.name,
                        fields.join(", ")
                    );
                    let result = processes.create(&news)?;
                    println!("  {} process/{} {}", "✓".green(), decl.name, result.id);
                    state.record_process(&decl.name, &result.id, &result.outputs);
                    state.save(state_path)?;
                }
                _ => {
                    let result = processes.create(&news)?;
                    println!("  {} process/{} {}", "✓".green(), decl.name, result.id);
                    state.record_process(&decl.name, &result.id, &result.outputs);
                    state.save(state_path)?;
                }
            }
        }

        println!();
        if summary.total_changes() == 0 {
            println!("  {} Nothing to do", "✓".green());
        } else {
            println!(
                "  {} Applied: {} created, {} replaced, {} updated, {} unchanged",
                "✓".green().bold(),
                summary.created,
                summary.replaced,
                summary.updated,
                summary.unchanged
            );
        }
        Ok(())
    }

    /// Check every declared resource before anything is applied.
    fn validate_all(&self) -> Result<()> {
        let mut failures = 0;

        for decl in &self.config.code_bundles {
            let news = decl.to_spec();
            let tracked = self.state.code_bundles.get(&decl.name);
            let problems = self.bundles.check(tracked.map(|t| &t.inputs), &news);
            print_failures("code", &decl.name, &problems);
            failures += problems.len();
        }

        for decl in &self.config.processes {
            let news = decl.to_spec(&self.state)?;
            let tracked = self.state.processes.get(&decl.name);
            let problems = self.processes.check(tracked.map(|t| &t.inputs), &news);
            print_failures("process", &decl.name, &problems);
            failures += problems.len();
        }

        if failures > 0 {
            bail!("refusing to apply: {failures} validation failures");
        }
        Ok(())
    }

    /// Re-read every tracked process from the network and fold the live
    /// record back into local state.
    pub fn refresh(&mut self) -> Result<()> {
        let Self {
            state,
            state_path,
            processes,
            ..
        } = self;

        let tracked: Vec<_> = state
            .processes
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();
        if tracked.is_empty() {
            println!("  {} No tracked processes", "○".dimmed());
            return Ok(());
        }

        let mut failed = 0;
        println!();
        for (name, entry) in tracked {
            match processes.read(&entry.id) {
                Ok(live) => {
                    println!("  {} process/{} refreshed", "✓".green(), name);
                    let merged = merge_refreshed(&entry.inputs, live);
                    state.record_process(&name, &entry.id, &merged);
                }
                Err(e) => {
                    println!("  {} process/{}: {}", "✗".red(), name, e);
                    failed += 1;
                }
            }
        }
        state.save(state_path)?;

        if failed > 0 {
            bail!("{failed} processes could not be refreshed");
        }
        Ok(())
    }

    /// Drop resources from local tracking. The network is untouched: ledger
    /// entries are immutable and a spawned process cannot be unspawned.
    pub fn destroy(&mut self, name: Option<&str>) -> Result<()> {
        println!();
        match name {
            Some(name) => {
                if !self.state.forget(name) {
                    bail!("'{name}' is not tracked");
                }
                println!("  {} {} removed from local state", "✓".green(), name);
            }
            None => {
                if self.state.is_empty() {
                    println!("  {} Nothing is tracked", "○".dimmed());
                    return Ok(());
                }
                self.state.clear();
                println!("  {} All resources removed from local state", "✓".green());
            }
        }
        self.state.save(&self.state_path)?;

        println!(
            "  {} Ledger entries are immutable; spawned processes stay live on the network",
            "⚠".yellow()
        );
        Ok(())
    }
}

fn print_failures(kind: &str, name: &str, failures: &[CheckFailure]) {
    for failure in failures {
        println!("  {} {kind}/{name} {failure}", "✗".red());
    }
}

fn print_verdict(kind: &str, name: &str, action: &Verdict) {
    match action {
        Verdict::Create => println!("  {} {kind}/{name} will be created", "+".green()),
        Verdict::Replace(fields) => println!(
            "  {} {kind}/{name} will be replaced ({})",
            "±".yellow(),
            fields.join(", ")
        ),
        Verdict::Update => println!("  {} {kind}/{name} will be updated", "~".yellow()),
        Verdict::NoChange => println!("  {} {kind}/{name} unchanged", "○".dimmed()),
    }
}
