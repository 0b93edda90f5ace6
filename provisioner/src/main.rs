//! Image build provisioner CLI.
//!
//! `provisioner run` executes the whole procedure once; the other commands
//! expose its pieces for inspection while authoring an image.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use provisioner::core::steps::Step;
use provisioner::io::config::{DEFAULT_CONFIG_PATH, ProvisionConfig, load_config, write_config};
use provisioner::io::git::GitFetcher;
use provisioner::io::http::ReqwestFetcher;
use provisioner::io::kubectl::{resolve_from_manifest, resolve_version};
use provisioner::io::process::SystemCommandRunner;
use provisioner::provision::{ProvisionReport, Provisioner};
use provisioner::{exit_codes, logging};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "provisioner",
    version,
    about = "Provision a container image: man pages, completion, pinned kubectl"
)]
struct Cli {
    /// Configuration file (defaults apply when it does not exist).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every provisioning step in order, stopping at the first failure.
    Run {
        /// Install root (overrides `root` from the config).
        #[arg(long)]
        root: Option<PathBuf>,
        /// Source tree holding man page sources and the doc lock file.
        #[arg(long, default_value = ".")]
        source: PathBuf,
        /// Print the run report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Resolve and print the kubectl version without installing anything.
    ResolveVersion {
        /// Read this manifest instead of cloning the version-source repository.
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Print the ordered provisioning steps.
    Plan {
        #[arg(long)]
        json: bool,
    },
    /// Write the default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::for_error(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { root, source, json } => cmd_run(&cli.config, root, &source, json),
        Command::ResolveVersion { manifest } => cmd_resolve_version(&cli.config, manifest),
        Command::Plan { json } => cmd_plan(json),
        Command::InitConfig { force } => cmd_init_config(&cli.config, force),
    }
}

fn cmd_run(config_path: &Path, root: Option<PathBuf>, source: &Path, json: bool) -> Result<()> {
    let mut cfg = load_config(config_path)?;
    if let Some(root) = root {
        cfg.root = root;
    }
    let runner = command_runner(&cfg);
    let http = http_client(&cfg)?;
    let fetcher = GitFetcher::new(&runner);
    let report = Provisioner::new(&cfg, source, &runner, &fetcher, &http).run()?;
    if json {
        print_json(&report)?;
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn cmd_resolve_version(config_path: &Path, manifest: Option<PathBuf>) -> Result<()> {
    let cfg = load_config(config_path)?;
    let http = http_client(&cfg)?;
    let resolved = match manifest {
        Some(path) => resolve_from_manifest(&path, &http, &cfg.kubectl)?,
        None => {
            let runner = command_runner(&cfg);
            resolve_version(&GitFetcher::new(&runner), &http, &cfg.kubectl)?
        }
    };
    println!("{}", resolved.version);
    Ok(())
}

#[derive(Serialize)]
struct PlannedStep {
    position: usize,
    step: Step,
    description: &'static str,
}

fn cmd_plan(json: bool) -> Result<()> {
    let plan: Vec<PlannedStep> = Step::ALL
        .into_iter()
        .map(|step| PlannedStep {
            position: step.position(),
            step,
            description: step.description(),
        })
        .collect();
    if json {
        return print_json(&plan);
    }
    for entry in plan {
        println!("{} {} - {}", entry.position, entry.step, entry.description);
    }
    Ok(())
}

fn cmd_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    write_config(path, &ProvisionConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

fn command_runner(cfg: &ProvisionConfig) -> SystemCommandRunner {
    SystemCommandRunner::new(
        Duration::from_secs(cfg.command_timeout_secs),
        cfg.output_limit_bytes,
    )
}

fn http_client(cfg: &ProvisionConfig) -> Result<ReqwestFetcher> {
    ReqwestFetcher::new(Duration::from_secs(cfg.http_timeout_secs))
}

fn print_summary(report: &ProvisionReport) {
    for (idx, record) in report.steps.iter().enumerate() {
        println!(
            "ok {}/{} {}: {}",
            idx + 1,
            Step::ALL.len(),
            record.step,
            record.detail
        );
    }
}

/// Serialize `value` to pretty-printed JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}
