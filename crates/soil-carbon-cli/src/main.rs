use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use soil_carbon_core::{check_master_table, reconcile, PipelineConfig, Reconciliation};
use soil_carbon_export::{read_master_table, read_records, verify_manifest, write_tables};
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "soilc")]
#[command(about = "Soil carbon reconciliation CLI")]
struct Cli {
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile the input table and write the master, pedon, horizon and summary tables.
    Run(RunArgs),
    /// Reconcile the input table and report pedons without exactly one master row.
    Check(CheckArgs),
    /// Verify the manifest of a written output directory and re-check its master table.
    Verify(VerifyArgs),
}

#[derive(Debug, Args)]
struct InputArgs {
    #[arg(long = "input")]
    input: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    input: InputArgs,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[command(flatten)]
    input: InputArgs,
    #[arg(long, default_value_t = false)]
    fail_on_anomaly: bool,
}

#[derive(Debug, Args)]
struct VerifyArgs {
    #[arg(long)]
    out: PathBuf,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .with_context(|| format!("invalid log level: {default_filter}"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    match cli.command {
        Command::Run(args) => run_reconcile(&args),
        Command::Check(args) => run_check(&args),
        Command::Verify(args) => run_verify(&args),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: PipelineConfig = serde_yaml::from_str(&body)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    config.validate().with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(config)
}

fn reconcile_input(args: &InputArgs) -> Result<Reconciliation> {
    let config = load_config(args.config.as_deref())?;
    let records = read_records(&args.input)?;
    tracing::info!(rows = records.len(), input = %args.input.display(), "loaded input table");
    reconcile(records, &config).context("failed to reconcile input table")
}

fn run_reconcile(args: &RunArgs) -> Result<ExitCode> {
    let reconciliation = reconcile_input(&args.input)?;
    let manifest = write_tables(&args.out, &reconciliation.tables)?;
    let tables = &reconciliation.tables;

    emit_json(serde_json::json!({
        "input": args.input.input,
        "out_dir": args.out,
        "rows": tables.master.len(),
        "pedons": tables.pedon.len(),
        "consistency": reconciliation.consistency,
        "manifest": manifest
    }))?;
    Ok(ExitCode::SUCCESS)
}

fn run_check(args: &CheckArgs) -> Result<ExitCode> {
    let reconciliation = reconcile_input(&args.input)?;
    let consistent = reconciliation.consistency.is_consistent();
    emit_json(serde_json::json!({
        "input": args.input.input,
        "rows": reconciliation.tables.master.len(),
        "consistency": reconciliation.consistency
    }))?;

    if args.fail_on_anomaly && !consistent {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_verify(args: &VerifyArgs) -> Result<ExitCode> {
    let verification = verify_manifest(&args.out)?;
    let consistency = check_master_table(&read_master_table(&args.out)?);
    let ok = verification.ok && consistency.is_consistent();

    emit_json(serde_json::json!({
        "out_dir": args.out,
        "ok": ok,
        "manifest": verification,
        "consistency": consistency
    }))?;

    if ok {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
