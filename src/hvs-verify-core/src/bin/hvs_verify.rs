//! hvs-verify CLI - flavor policy evaluation and verification dispatch.
//!
//! Evaluates collected evidence against a flavor match policy, or runs a
//! dispatch + verification pass over an inventory snapshot.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hvs_flavor::{evaluate_raw, FlavorMatchPolicyCollection, FlavorPart, TrustVerdict};
use hvs_verify_core::{
    Collaborators, DispatchOutcome, InMemoryInventory, ServiceConfig, TrustReport,
    VerificationService, VerifyError,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// hvs-verify - host trust evaluation against flavor match policies.
#[derive(Parser)]
#[command(name = "hvs-verify")]
#[command(version = VERSION)]
#[command(about = "Evaluate host evidence against flavor match policies")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an evidence file against a policy file
    Evaluate {
        /// Policy collection (JSON, `flavor_match_policies` array)
        #[arg(long)]
        policy: PathBuf,

        /// Evidence (JSON array of collected flavors)
        #[arg(long)]
        evidence: PathBuf,

        /// Parts the flavorgroup has ever defined (for REQUIRED_IF_DEFINED)
        #[arg(long = "defined", value_delimiter = ',')]
        defined: Vec<String>,
    },

    /// Dispatch a flavorgroup from an inventory snapshot and verify its hosts
    Dispatch {
        /// Inventory snapshot (JSON)
        #[arg(long)]
        inventory: PathBuf,

        /// Flavorgroup to dispatch
        #[arg(long)]
        flavorgroup: String,

        /// Re-queue hosts that are already queued
        #[arg(long)]
        force: bool,

        /// Service configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn read_file(path: &Path) -> Result<String, VerifyError> {
    std::fs::read_to_string(path).map_err(|e| VerifyError::Config {
        message: format!("cannot read {}: {}", path.display(), e),
    })
}

fn run_evaluate(
    policy_path: &Path,
    evidence_path: &Path,
    defined: &[String],
) -> Result<TrustVerdict, VerifyError> {
    let policy = FlavorMatchPolicyCollection::from_json(&read_file(policy_path)?)?;
    let raw: Vec<serde_json::Value> = serde_json::from_str(&read_file(evidence_path)?)?;
    let ever_defined = defined
        .iter()
        .map(|name| name.parse::<FlavorPart>())
        .collect::<Result<BTreeSet<_>, _>>()?;

    Ok(evaluate_raw(&raw, &policy, &ever_defined))
}

async fn run_dispatch(
    inventory_path: &Path,
    flavorgroup: &str,
    force: bool,
    config_path: Option<&Path>,
) -> Result<(DispatchOutcome, Vec<TrustReport>), VerifyError> {
    let config = match config_path {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::default(),
    };
    let inventory = Arc::new(InMemoryInventory::from_json(&read_file(inventory_path)?)?);
    let collaborators = Collaborators {
        membership: inventory.clone(),
        queue_state: inventory.clone(),
        status_store: inventory.clone(),
        policies: inventory.clone(),
        evidence: inventory.clone(),
        sink: inventory.clone(),
    };

    let (service, worker) = VerificationService::start(&config, collaborators)?;
    let outcome = service.dispatch(flavorgroup, force).await?;
    drop(service);
    worker.wait().await?;

    Ok((outcome, inventory.reports()))
}

fn print_verdict(verdict: &TrustVerdict) {
    println!("\nTRUST VERDICT");
    println!("=============\n");
    if verdict.trusted {
        println!("  Trusted: \x1b[32mYES\x1b[0m");
    } else {
        println!("  Trusted: \x1b[31mNO\x1b[0m");
    }
    if verdict.faults.is_empty() {
        println!("  Faults:  none");
        return;
    }
    println!("  Faults:");
    for fault in &verdict.faults {
        println!("    - [{:?}] {}", fault.kind, fault.message);
        if !fault.flavor_ids.is_empty() {
            println!("      flavors: {}", fault.flavor_ids.join(", "));
        }
    }
}

fn print_dispatch(outcome: &DispatchOutcome, reports: &[TrustReport]) {
    println!("\nDISPATCH");
    println!("========\n");
    println!("  Flavorgroup:  {}", outcome.flavorgroup_id);
    println!("  Force update: {}", outcome.force_update);
    println!("  Members:      {}", outcome.resolved);
    println!("  Queued:       {}", outcome.queued.len());
    for failure in &outcome.failed {
        println!("  \x1b[33mFAILED\x1b[0m {}: {}", failure.host_id, failure.reason);
    }

    println!("\nTRUST REPORTS");
    println!("-------------\n");
    if reports.is_empty() {
        println!("  (none)");
    }
    for report in reports {
        let status = if report.trusted {
            "\x1b[32mTRUSTED\x1b[0m"
        } else {
            "\x1b[31mUNTRUSTED\x1b[0m"
        };
        println!("  {} {}", report.host_id, status);
        for result in &report.results {
            for fault in &result.verdict.faults {
                println!("      {}: {}", result.flavorgroup_id, fault.message);
            }
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), VerifyError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let json_output = cli.format == "json";

    // Keep stdout clean for JSON consumers
    if json_output {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_target(false)
            .init();
    }

    let result = match cli.command {
        Commands::Evaluate {
            policy,
            evidence,
            defined,
        } => run_evaluate(&policy, &evidence, &defined).and_then(|verdict| {
            if json_output {
                print_json(&verdict)?;
            } else {
                print_verdict(&verdict);
            }
            Ok(verdict.trusted)
        }),
        Commands::Dispatch {
            inventory,
            flavorgroup,
            force,
            config,
        } => match run_dispatch(&inventory, &flavorgroup, force, config.as_deref()).await {
            Ok((outcome, reports)) => {
                let all_trusted = reports.iter().all(|r| r.trusted);
                if json_output {
                    print_json(&serde_json::json!({
                        "dispatch": outcome,
                        "reports": reports,
                    }))
                    .map(|()| all_trusted)
                } else {
                    print_dispatch(&outcome, &reports);
                    Ok(all_trusted)
                }
            },
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(true) => {},
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        },
    }
}
