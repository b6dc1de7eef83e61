// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Hot-gym prediction demo
//!
//! Builds the sensor → spatial pooler → temporal memory → classifier network with its
//! feedback loops, streams the input CSV through it and writes one
//! `tick,observed,predicted` row per record.
//!
//! Usage:
//!   cargo run --bin network_prediction_demo -- --input data/rec-center-hourly-sample.csv

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use regionflow::config::{load_config, RegionflowConfig};
use regionflow::engine::run_into_sink;
use regionflow::io::{CsvLayout, CsvPredictionSink, CsvRecordSource};
use regionflow::observability::{init_logging, CrateDebugFlags, LogFormat, LoggingConfig, DEBUG_ENV};
use regionflow::prediction;

/// Regionflow network prediction demo
#[derive(Parser, Debug)]
#[command(name = "network_prediction_demo", version, long_about = None)]
struct Args {
    /// Path to regionflow.toml (searched for when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input CSV (timestamp and value columns, two metadata rows)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output CSV of predictions
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of records to run
    #[arg(short = 'n', long)]
    records: Option<u64>,

    /// Seed of the prediction tie-break
    #[arg(long)]
    seed: Option<u64>,

    /// Base log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Write JSON run logs under this directory (needs the file-logging feature)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Console logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Enable debug logging for every crate
    #[arg(long, default_value_t = false)]
    debug_all: bool,

    /// Enable debug logging for one crate (repeatable, e.g. --debug regionflow-engine)
    #[arg(long = "debug", value_name = "CRATE")]
    debug_crates: Vec<String>,
}

impl Args {
    /// Flags in the form understood by `apply_cli_overrides`
    fn overrides(&self) -> HashMap<String, String> {
        let mut cli = HashMap::new();
        if let Some(seed) = self.seed {
            cli.insert("seed".to_string(), seed.to_string());
        }
        if let Some(records) = self.records {
            cli.insert("record_count".to_string(), records.to_string());
        }
        if let Some(level) = &self.log_level {
            cli.insert("log_level".to_string(), level.clone());
        }
        if let Some(input) = &self.input {
            cli.insert("input_path".to_string(), input.display().to_string());
        }
        if let Some(output) = &self.output {
            cli.insert("output_path".to_string(), output.display().to_string());
        }
        cli
    }

    fn debug_flags(&self, config: &RegionflowConfig) -> CrateDebugFlags {
        let mut flags = CrateDebugFlags::default();
        if self.debug_all || config.system.debug {
            flags.enable_all();
        }
        for crate_name in &self.debug_crates {
            flags.enable(crate_name);
        }
        if let Ok(value) = std::env::var(DEBUG_ENV) {
            flags.merge_env_value(&value);
        }
        flags
    }

    fn logging(&self, config: &RegionflowConfig) -> LoggingConfig {
        LoggingConfig {
            level: config.system.log_level.clone(),
            format: if self.json_logs {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            log_dir: self.log_dir.clone(),
            ..LoggingConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref(), Some(&args.overrides()))
        .context("Failed to load configuration")?;

    let _guard = init_logging(&args.debug_flags(&config), &args.logging(&config))?;

    info!("🚀 Regionflow prediction demo v{}", regionflow::VERSION);
    info!("  Input:   {}", config.sensor.input_path.display());
    info!("  Output:  {}", config.output.path.display());
    info!("  Records: {}", config.engine.record_count);
    info!("  Seed:    {}", config.engine.seed);

    let layout = CsvLayout {
        timestamp_field: config.sensor.timestamp_field.clone(),
        metadata_rows: config.sensor.metadata_rows,
        ..CsvLayout::default()
    };
    let source = CsvRecordSource::open(&config.sensor.input_path, &layout).with_context(|| {
        format!(
            "Failed to open input file: {}",
            config.sensor.input_path.display()
        )
    })?;

    let mut network = prediction::build_network(&config, source)?;
    network.initialize()?;
    prediction::log_summary(&network)?;

    let mut sink = CsvPredictionSink::create(&config.output.path).with_context(|| {
        format!(
            "Failed to create output file: {}",
            config.output.path.display()
        )
    })?;

    let written = run_into_sink(
        &mut network,
        config.engine.record_count,
        prediction::probe(),
        StdRng::seed_from_u64(config.engine.seed),
        &mut sink,
    )?;

    info!(
        "✅ Wrote {} predictions to {}",
        written,
        config.output.path.display()
    );
    Ok(())
}
