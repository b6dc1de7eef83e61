// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Every check runs; all problems are reported together in one
//! `ConfigError::ValidationError`.

use crate::{ConfigError, ConfigResult, RegionflowConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    NotPositive { field: String },
    OutOfRange { field: String, value: f64, range: &'static str },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::NotPositive { field } => write!(f, "{} must be greater than zero", field),
            Self::OutOfRange {
                field,
                value,
                range,
            } => write!(f, "{} = {} is outside {}", field, value, range),
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Positive widths and counts
/// - Encoder geometry (min < max, n >= w)
/// - Probabilities and learning rates inside their ranges
/// - Required fields
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &RegionflowConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_required_fields(config, &mut errors);
    validate_encoders(config, &mut errors);
    validate_regions(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_required_fields(config: &RegionflowConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.engine.record_count == 0 {
        errors.push(ConfigValidationError::NotPositive {
            field: "engine.record_count".to_string(),
        });
    }
    if config.sensor.value_field.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "sensor.value_field".to_string(),
        });
    }
    if config.sensor.timestamp_field.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "sensor.timestamp_field".to_string(),
        });
    }
    if config.output.path.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "output.path".to_string(),
        });
    }
}

fn validate_encoders(config: &RegionflowConfig, errors: &mut Vec<ConfigValidationError>) {
    let value = &config.sensor.value;
    if value.w == 0 {
        errors.push(ConfigValidationError::NotPositive {
            field: "sensor.value.w".to_string(),
        });
    }
    if value.n < value.w {
        errors.push(ConfigValidationError::InvalidValue {
            field: "sensor.value.n".to_string(),
            reason: format!("n = {} is smaller than w = {}", value.n, value.w),
        });
    }
    if value.min >= value.max {
        errors.push(ConfigValidationError::InvalidValue {
            field: "sensor.value.min".to_string(),
            reason: format!("min = {} must be below max = {}", value.min, value.max),
        });
    }

    let time = &config.sensor.time_of_day;
    if time.w == 0 {
        errors.push(ConfigValidationError::NotPositive {
            field: "sensor.time_of_day.w".to_string(),
        });
    }
    if !(time.radius > 0.0) {
        errors.push(ConfigValidationError::NotPositive {
            field: "sensor.time_of_day.radius".to_string(),
        });
    }
}

fn validate_regions(config: &RegionflowConfig, errors: &mut Vec<ConfigValidationError>) {
    let sp = &config.spatial_pooler;
    if sp.column_count == 0 {
        errors.push(ConfigValidationError::NotPositive {
            field: "spatial_pooler.column_count".to_string(),
        });
    }
    if sp.num_active_columns == 0 {
        errors.push(ConfigValidationError::NotPositive {
            field: "spatial_pooler.num_active_columns".to_string(),
        });
    }
    if sp.num_active_columns > sp.column_count {
        errors.push(ConfigValidationError::InvalidValue {
            field: "spatial_pooler.num_active_columns".to_string(),
            reason: format!(
                "{} active columns requested out of {}",
                sp.num_active_columns, sp.column_count
            ),
        });
    }
    for (field, value) in [
        ("spatial_pooler.potential_pct", sp.potential_pct),
        ("spatial_pooler.syn_perm_connected", sp.syn_perm_connected),
        ("spatial_pooler.syn_perm_active_inc", sp.syn_perm_active_inc),
        ("spatial_pooler.syn_perm_inactive_dec", sp.syn_perm_inactive_dec),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigValidationError::OutOfRange {
                field: field.to_string(),
                value,
                range: "[0.0, 1.0]",
            });
        }
    }

    let tm = &config.temporal_memory;
    if tm.column_count == 0 {
        errors.push(ConfigValidationError::NotPositive {
            field: "temporal_memory.column_count".to_string(),
        });
    }
    if tm.cells_per_column == 0 {
        errors.push(ConfigValidationError::NotPositive {
            field: "temporal_memory.cells_per_column".to_string(),
        });
    }
    if tm.column_count != sp.column_count {
        errors.push(ConfigValidationError::InvalidValue {
            field: "temporal_memory.column_count".to_string(),
            reason: format!(
                "{} does not match spatial_pooler.column_count = {}",
                tm.column_count, sp.column_count
            ),
        });
    }

    let cl = &config.classifier;
    if !(cl.alpha > 0.0 && cl.alpha <= 1.0) {
        errors.push(ConfigValidationError::OutOfRange {
            field: "classifier.alpha".to_string(),
            value: cl.alpha,
            range: "(0.0, 1.0]",
        });
    }
    if cl.steps != 1 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "classifier.steps".to_string(),
            reason: format!("only 1-step prediction is supported, got {}", cl.steps),
        });
    }
    if cl.max_category_count == 0 {
        errors.push(ConfigValidationError::NotPositive {
            field: "classifier.max_category_count".to_string(),
        });
    }
    if !(cl.resolution > 0.0) {
        errors.push(ConfigValidationError::NotPositive {
            field: "classifier.resolution".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RegionflowConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_too_many_active_columns() {
        let mut config = RegionflowConfig::default();
        config.spatial_pooler.num_active_columns = 4096;

        let result = validate_config(&config);
        assert!(result.is_err());

        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("spatial_pooler.num_active_columns"));
            assert!(msg.contains("4096"));
        }
    }

    #[test]
    fn test_encoder_geometry() {
        let mut config = RegionflowConfig::default();
        config.sensor.value.n = 10;
        config.sensor.value.min = 100.0;

        let result = validate_config(&config);
        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("sensor.value.n"));
            assert!(msg.contains("sensor.value.min"));
        } else {
            panic!("expected validation failure");
        }
    }

    #[test]
    fn test_all_problems_reported_together() {
        let mut config = RegionflowConfig::default();
        config.classifier.alpha = 0.0;
        config.classifier.steps = 5;
        config.engine.record_count = 0;
        config.spatial_pooler.potential_pct = 1.5;

        match validate_config(&config) {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("classifier.alpha"));
                assert!(msg.contains("classifier.steps"));
                assert!(msg.contains("engine.record_count"));
                assert!(msg.contains("spatial_pooler.potential_pct"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_column_counts() {
        let mut config = RegionflowConfig::default();
        config.temporal_memory.column_count = 1024;

        let result = validate_config(&config);
        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("temporal_memory.column_count"));
        } else {
            panic!("expected validation failure");
        }
    }
}
