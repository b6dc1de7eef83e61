// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Shared parameter checks for the builtin regions.

use regionflow_engine::{ConfigError, RegionConfig, RegionKind, Signal};
use serde_json::Value;
use tracing::warn;

/// Log keys a region does not understand; they are ignored
pub(crate) fn warn_unknown_keys(kind: &RegionKind, config: &RegionConfig, known: &[&str]) {
    for key in config.unknown_keys(known) {
        warn!("[REGIONS] {} ignores unknown parameter '{}'", kind, key);
    }
}

pub(crate) fn positive(key: &str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}

pub(crate) fn unit_interval(key: &str, value: f64) -> Result<f64, ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{} is outside [0, 1]", value),
        });
    }
    Ok(value)
}

/// Boolean parameter; `0` and `1` are accepted as well
pub(crate) fn flag(key: &str, value: &Value) -> Result<bool, ConfigError> {
    match value {
        Value::Bool(on) => Ok(*on),
        other => match other.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(ConfigError::InvalidType {
                key: key.to_string(),
                expected: "a boolean",
                found: other.to_string(),
            }),
        },
    }
}

/// Indices of the non-zero entries
pub(crate) fn active_indices(signal: &Signal) -> Vec<usize> {
    signal
        .iter()
        .enumerate()
        .filter(|(_, value)| **value != 0.0)
        .map(|(index, _)| index)
        .collect()
}

/// Binary signal of `width` with ones at `indices`
pub(crate) fn indicator(width: usize, indices: impl IntoIterator<Item = usize>) -> Signal {
    let mut signal = Signal::zeros(width);
    for index in indices {
        signal[index] = 1.0;
    }
    signal
}
