//! CLI entry point for daq-count
//!
//! Runs counting measurements on a detector described by a setup file.
//!
//! # Usage
//!
//! Count for 10 seconds or 5000 monitor counts, whichever comes first:
//! ```bash
//! daq-count count --setup config/setup.toml t=10 mon1=5000
//! ```
//!
//! List the presets a setup understands:
//! ```bash
//! daq-count presets --setup config/setup.toml
//! ```
//!
//! Logging is controlled with `RUST_LOG`, e.g. `RUST_LOG=info`.

mod count;
mod setup;

use anyhow::Result;
use clap::{Parser, Subcommand};
use daq_core::Channel;
use daq_detector::PresetMap;
use setup::SetupConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "daq-count")]
#[command(about = "Counting measurements on a multi-channel detector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one measurement and print the final reading
    Count {
        /// Setup file (TOML format)
        #[arg(long)]
        setup: PathBuf,

        /// Poll interval, overriding the setup file (e.g. "250ms")
        #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
        interval: Option<Duration>,

        /// Presets as name=value, e.g. t=10 mon1=5000
        #[arg(value_parser = parse_preset)]
        presets: Vec<(String, f64)>,
    },

    /// List the preset names the detector recognizes
    Presets {
        /// Setup file (TOML format)
        #[arg(long)]
        setup: PathBuf,
    },

    /// Show name, unit, type and format of every channel value
    Info {
        /// Setup file (TOML format)
        #[arg(long)]
        setup: PathBuf,
    },
}

fn parse_preset(arg: &str) -> Result<(String, f64), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{arg}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for preset '{name}': {e}"))?;
    Ok((name.trim().to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Count {
            setup,
            interval,
            presets,
        } => run_count(setup, interval, presets).await,
        Commands::Presets { setup } => show_presets(setup),
        Commands::Info { setup } => show_info(setup),
    }
}

async fn run_count(
    setup_path: PathBuf,
    interval: Option<Duration>,
    presets: Vec<(String, f64)>,
) -> Result<()> {
    let setup = SetupConfig::load(&setup_path)?;
    let detector = setup.build_detector()?;
    let presets: PresetMap = presets.into_iter().collect();
    let interval = interval.unwrap_or(setup.poll_interval);

    tracing::info!(
        detector = %detector.name(),
        presets = ?presets,
        interval = ?interval,
        "Starting measurement"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let measurement = count::run(detector.clone(), &presets, interval, shutdown).await?;

    for line in count::format_reading(&detector.value_info(), &measurement.values) {
        println!("{line}");
    }
    if measurement.interrupted {
        println!("(interrupted after {:.3} s)", measurement.elapsed.as_secs_f64());
    }
    Ok(())
}

fn show_presets(setup_path: PathBuf) -> Result<()> {
    let detector = SetupConfig::load(&setup_path)?.build_detector()?;
    for name in detector.preset_info() {
        let channel = detector
            .channel_for(&name)
            .map(|c| c.name().to_string())
            .unwrap_or_default();
        println!("{name:<6} -> {channel}");
    }
    Ok(())
}

fn show_info(setup_path: PathBuf) -> Result<()> {
    let detector = SetupConfig::load(&setup_path)?.build_detector()?;
    for info in detector.value_info() {
        println!(
            "{:<12} unit={:<4} type={:<8} format={}",
            info.name,
            info.unit,
            info.value_type,
            info.format
        );
    }
    Ok(())
}
