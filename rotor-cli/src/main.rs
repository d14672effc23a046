//! Rotor CLI: decision replay, config checks, and preset listing.
//!
//! Commands:
//! - `replay`: run one or more configs over a long-format CSV of bars and
//!   print one JSON line per tick
//! - `check`: validate a TOML config and print its universe and fingerprint
//! - `presets`: list the named presets, or dump one as TOML

mod bars;
mod replay;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rotor_core::{EngineConfig, EnginePreset};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::replay::Variant;

#[derive(Parser)]
#[command(
    name = "rotor",
    about = "Rotor CLI, a regime-gated momentum rotation engine"
)]
struct Cli {
    /// Log filter (e.g. `debug`, `rotor_core=trace`). Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay decisions tick by tick over a CSV of bars.
    Replay {
        /// TOML config file. Repeat to replay several configs in parallel.
        #[arg(long)]
        config: Vec<PathBuf>,

        /// Named preset: rotator, lockdown, seed, structural, panic_switch. Repeatable.
        #[arg(long)]
        preset: Vec<String>,

        /// Long-format CSV: timestamp,ticker,open,high,low,close.
        #[arg(long)]
        bars: PathBuf,

        /// Write JSON lines here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a TOML config file.
    Check {
        /// Path to the config file.
        #[arg(long)]
        config: PathBuf,
    },
    /// List named presets.
    Presets {
        /// Print the named preset as TOML.
        #[arg(long)]
        dump: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Replay {
            config,
            preset,
            bars,
            output,
        } => run_replay(&config, &preset, &bars, output.as_deref()),
        Commands::Check { config } => run_check(&config),
        Commands::Presets { dump } => run_presets(dump.as_deref()),
    }
}

/// Logs go to stderr so stdout stays clean JSON lines.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("rotor_core=info,rotor=info")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn collect_variants(configs: &[PathBuf], presets: &[String]) -> Result<Vec<Variant>> {
    if configs.is_empty() && presets.is_empty() {
        bail!("at least one --config or --preset is required");
    }

    let mut variants = Vec::with_capacity(configs.len() + presets.len());
    for path in configs {
        let config = EngineConfig::from_file(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        variants.push(Variant { name, config });
    }
    for name in presets {
        let preset: EnginePreset = name.parse()?;
        variants.push(Variant {
            name: preset.name().to_string(),
            config: preset.to_config(),
        });
    }
    Ok(variants)
}

fn run_replay(
    configs: &[PathBuf],
    presets: &[String],
    bars_path: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let variants = collect_variants(configs, presets)?;
    let snapshot = bars::load_bars(bars_path)?;
    let records = replay::replay_all(&variants, &snapshot)?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create output: {}", path.display()))?;
            replay::write_jsonl(&records, std::io::BufWriter::new(file))?;
            eprintln!("Wrote {} records to {}", records.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            replay::write_jsonl(&records, stdout.lock())?;
        }
    }
    Ok(())
}

fn run_check(path: &Path) -> Result<()> {
    let config = EngineConfig::from_file(path)?;
    println!("Config OK: {}", path.display());
    println!("  Offensive:   {}", config.universe.offensive.join(", "));
    println!("  Defensive:   {}", config.universe.defensive.join(", "));
    println!("  Indicators:  {}", config.indicator_tickers().join(", "));
    println!("  Fingerprint: {}", config.fingerprint());
    Ok(())
}

fn run_presets(dump: Option<&str>) -> Result<()> {
    if let Some(name) = dump {
        let preset: EnginePreset = name.parse()?;
        let text = toml::to_string_pretty(&preset.to_config())
            .context("failed to serialise preset")?;
        print!("{text}");
        return Ok(());
    }

    println!("{:<14} FINGERPRINT", "PRESET");
    println!("{}", "─".repeat(80));
    for preset in EnginePreset::all() {
        println!("{:<14} {}", preset.name(), preset.to_config().fingerprint());
    }
    Ok(())
}
