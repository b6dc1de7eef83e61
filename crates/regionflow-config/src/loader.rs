// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML file
//! 3. Environment variables
//! 4. CLI arguments

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{validate_config, ConfigError, ConfigResult, RegionflowConfig};

/// File name searched for when no explicit path is given
pub const CONFIG_FILE_NAME: &str = "regionflow.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "REGIONFLOW_CONFIG_PATH";

/// Find the regionflow configuration file
///
/// Search order:
/// 1. `REGIONFLOW_CONFIG_PATH` environment variable
/// 2. Current working directory: `./regionflow.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load and validate configuration
///
/// # Arguments
///
/// * `config_path` - Explicit config file. If `None`, the file is searched for and the
///   built-in defaults are used when none exists.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if an explicit or env-named file is missing, the TOML is invalid, or
/// validation fails
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<RegionflowConfig> {
    let config_file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => match find_config_file() {
            Ok(path) => Some(path),
            Err(_) if env::var(CONFIG_PATH_ENV).is_err() => None,
            Err(err) => return Err(err),
        },
    };

    let mut config = match config_file {
        Some(path) => {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        }
        None => RegionflowConfig::default(),
    };

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    validate_config(&config)?;
    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `REGIONFLOW_SEED` -> `engine.seed`
/// - `REGIONFLOW_RECORD_COUNT` -> `engine.record_count`
/// - `REGIONFLOW_LOG_LEVEL` -> `system.log_level`
/// - `REGIONFLOW_INPUT_PATH` -> `sensor.input_path`
/// - `REGIONFLOW_OUTPUT_PATH` -> `output.path`
///
/// # Errors
///
/// `ConfigError::InvalidValue` when a numeric variable does not parse
pub fn apply_environment_overrides(config: &mut RegionflowConfig) -> ConfigResult<()> {
    if let Ok(value) = env::var("REGIONFLOW_SEED") {
        config.engine.seed = parse_number("REGIONFLOW_SEED", &value)?;
    }
    if let Ok(value) = env::var("REGIONFLOW_RECORD_COUNT") {
        config.engine.record_count = parse_number("REGIONFLOW_RECORD_COUNT", &value)?;
    }
    if let Ok(value) = env::var("REGIONFLOW_LOG_LEVEL") {
        config.system.log_level = value;
    }
    if let Ok(value) = env::var("REGIONFLOW_INPUT_PATH") {
        config.sensor.input_path = PathBuf::from(value);
    }
    if let Ok(value) = env::var("REGIONFLOW_OUTPUT_PATH") {
        config.output.path = PathBuf::from(value);
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"seed": "42", "record_count": "100"}`)
///
/// Recognized keys: `seed`, `record_count`, `log_level`, `debug`, `input_path`,
/// `output_path`.
pub fn apply_cli_overrides(
    config: &mut RegionflowConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(value) = cli_args.get("seed") {
        config.engine.seed = parse_number("seed", value)?;
    }
    if let Some(value) = cli_args.get("record_count") {
        config.engine.record_count = parse_number("record_count", value)?;
    }
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("debug") {
        config.system.debug = value.to_lowercase() == "true" || value == "1";
    }
    if let Some(value) = cli_args.get("input_path") {
        config.sensor.input_path = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("output_path") {
        config.output.path = PathBuf::from(value);
    }
    Ok(())
}

fn parse_number(key: &str, value: &str) -> ConfigResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue(format!("{} = '{}': {}", key, value, e)))
}
