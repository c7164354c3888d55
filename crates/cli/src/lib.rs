use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use insight_dedup::{
    score_threads, AnalyticsRow, DedupConfig, RowRollup, ThreadBody, ThreadClusterer,
    ThreadRecord,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "insight")]
#[command(about = "Deduplicate conversation threads and roll up analytics rows", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// TOML config file; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster near-duplicate thread records
    Cluster(IoArgs),

    /// Compute ranking metrics for thread bodies
    Score(IoArgs),

    /// Roll up analytics rows by group key and report collisions
    Rollup(IoArgs),

    /// Validate the config and print the effective values
    CheckConfig,
}

#[derive(Args)]
struct IoArgs {
    /// JSON array or JSON Lines file (`-` reads stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    out: Option<PathBuf>,
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Cluster(args) => run_cluster(&args, &config),
        Commands::Score(args) => run_score(&args),
        Commands::Rollup(args) => run_rollup(&args, &config),
        Commands::CheckConfig => emit(&config, None),
    }
}

fn run_cluster(args: &IoArgs, config: &DedupConfig) -> Result<()> {
    let records: Vec<ThreadRecord> = read_records(&args.input)?;
    let clusterer = ThreadClusterer::new(config.cluster.clone())?;
    let output = clusterer
        .cluster(&records)
        .context("Clustering failed")?;
    emit(&output, args.out.as_deref())
}

fn run_score(args: &IoArgs) -> Result<()> {
    let bodies: Vec<ThreadBody> = read_records(&args.input)?;
    let rows: Vec<AnalyticsRow> = score_threads(&bodies);
    emit(&rows, args.out.as_deref())
}

fn run_rollup(args: &IoArgs, config: &DedupConfig) -> Result<()> {
    let rows: Vec<AnalyticsRow> = read_records(&args.input)?;
    let rollup = RowRollup::new(config.rollup.clone())?;
    let output = rollup.run(&rows).context("Rollup failed")?;
    emit(&output, args.out.as_deref())
}

fn load_config(path: Option<&Path>) -> Result<DedupConfig> {
    let Some(path) = path else {
        let config = DedupConfig::default();
        config.validate()?;
        return Ok(config);
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = DedupConfig::from_toml_str(&raw)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read stdin")?;
        return Ok(raw);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// A JSON array, or one JSON value per non-empty line
fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = read_input(path)?;
    let records = parse_records(&raw).with_context(|| format!("Invalid input {}", path.display()))?;
    log::info!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

fn parse_records<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("Failed to parse JSON array");
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("Failed to parse line {}", idx + 1))
        })
        .collect()
}

fn emit<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(path, format!("{text}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
            Ok(())
        }
        None => print_stdout(&text),
    }
}
