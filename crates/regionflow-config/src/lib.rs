// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! # Regionflow Configuration
//!
//! Type-safe configuration for regionflow networks with support for:
//! - TOML file parsing (`regionflow.toml`)
//! - Environment variable overrides
//! - CLI argument overrides
//! - Conversion of region sections into flat region records
//!
//! ## Usage
//!
//! ```rust,no_run
//! use regionflow_config::{load_config, RegionflowConfig};
//!
//! // Defaults, then file, then environment, then CLI
//! let config = load_config(None, None).expect("Failed to load config");
//!
//! println!("Seed: {}", config.engine.seed);
//! println!("Records: {}", config.engine.record_count);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config,
    CONFIG_FILE_NAME,
};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Cannot convert section [{section}] into a region record: {reason}")]
    Conversion { section: &'static str, reason: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RegionflowConfig::default();
        assert!(validate_config(&config).is_ok());
    }
}
