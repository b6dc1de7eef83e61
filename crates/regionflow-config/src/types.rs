// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `regionflow.toml`. Defaults reproduce the hot-gym prediction setup.

use std::path::PathBuf;

use regionflow_engine::RegionConfig;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegionflowConfig {
    pub system: SystemConfig,
    pub engine: EngineConfig,
    pub sensor: SensorConfig,
    pub spatial_pooler: SpatialPoolerConfig,
    pub temporal_memory: TemporalMemoryConfig,
    pub classifier: ClassifierConfig,
    pub output: OutputConfig,
}

/// System-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log_level: String,
    pub debug: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
        }
    }
}

/// Driving loop configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed of the prediction tie-break
    pub seed: u64,
    pub record_count: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 1956,
            record_count: 2000,
        }
    }
}

/// Scalar encoder parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScalarEncoderConfig {
    /// Active bits per value
    pub w: usize,
    pub min: f64,
    pub max: f64,
    /// Total bits
    pub n: usize,
    pub clip_input: bool,
}

impl Default for ScalarEncoderConfig {
    fn default() -> Self {
        Self {
            w: 21,
            min: 0.0,
            max: 100.0,
            n: 50,
            clip_input: true,
        }
    }
}

/// Periodic time-of-day encoder parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeOfDayConfig {
    pub w: usize,
    /// Hours covered by one bucket width
    pub radius: f64,
}

impl Default for TimeOfDayConfig {
    fn default() -> Self {
        Self { w: 21, radius: 9.5 }
    }
}

/// Record sensor configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    pub input_path: PathBuf,
    pub timestamp_field: String,
    pub value_field: String,
    /// Rows after the header row that carry field metadata, not data
    pub metadata_rows: usize,
    pub value: ScalarEncoderConfig,
    pub time_of_day: TimeOfDayConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/rec-center-hourly-sample.csv"),
            timestamp_field: "timestamp".to_string(),
            value_field: "kw_energy_consumption".to_string(),
            metadata_rows: 2,
            value: ScalarEncoderConfig::default(),
            time_of_day: TimeOfDayConfig::default(),
        }
    }
}

impl SensorConfig {
    /// Flat record understood by the sensor region
    pub fn to_region_config(&self) -> ConfigResult<RegionConfig> {
        Ok(RegionConfig::new()
            .with("valueField", self.value_field.as_str())
            .with("valueW", self.value.w)
            .with("valueMinimum", self.value.min)
            .with("valueMaximum", self.value.max)
            .with("valueN", self.value.n)
            .with("clipInput", self.value.clip_input)
            .with("timeOfDayW", self.time_of_day.w)
            .with("timeOfDayRadius", self.time_of_day.radius))
    }
}

/// Spatial pooler configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpatialPoolerConfig {
    pub column_count: usize,
    pub num_active_columns: usize,
    pub potential_pct: f64,
    pub syn_perm_connected: f64,
    pub syn_perm_active_inc: f64,
    pub syn_perm_inactive_dec: f64,
    pub seed: u64,
    pub learning: bool,
}

impl Default for SpatialPoolerConfig {
    fn default() -> Self {
        Self {
            column_count: 2048,
            num_active_columns: 40,
            potential_pct: 0.8,
            syn_perm_connected: 0.1,
            syn_perm_active_inc: 0.0001,
            syn_perm_inactive_dec: 0.0005,
            seed: 1956,
            learning: true,
        }
    }
}

/// Region-side names of the spatial pooler fields
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpatialPoolerRecord {
    column_count: usize,
    num_active_columns_per_inh_area: usize,
    potential_pct: f64,
    syn_perm_connected: f64,
    syn_perm_active_inc: f64,
    syn_perm_inactive_dec: f64,
    seed: u64,
}

impl SpatialPoolerConfig {
    pub fn to_region_config(&self) -> ConfigResult<RegionConfig> {
        let record = SpatialPoolerRecord {
            column_count: self.column_count,
            num_active_columns_per_inh_area: self.num_active_columns,
            potential_pct: self.potential_pct,
            syn_perm_connected: self.syn_perm_connected,
            syn_perm_active_inc: self.syn_perm_active_inc,
            syn_perm_inactive_dec: self.syn_perm_inactive_dec,
            seed: self.seed,
        };
        flatten("spatial_pooler", &record)
    }
}

/// Temporal memory configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TemporalMemoryConfig {
    pub column_count: usize,
    pub cells_per_column: usize,
    /// Active columns that must overlap a learned context before it predicts
    pub activation_threshold: usize,
    pub seed: u64,
    pub learning: bool,
    pub inference: bool,
}

impl Default for TemporalMemoryConfig {
    fn default() -> Self {
        Self {
            column_count: 2048,
            cells_per_column: 32,
            activation_threshold: 12,
            seed: 1960,
            learning: true,
            inference: true,
        }
    }
}

impl TemporalMemoryConfig {
    pub fn to_region_config(&self) -> ConfigResult<RegionConfig> {
        Ok(RegionConfig::new()
            .with("columnCount", self.column_count)
            .with("cellsPerColumn", self.cells_per_column)
            .with("activationThreshold", self.activation_threshold)
            .with("seed", self.seed))
    }
}

/// Classifier configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Learning rate
    pub alpha: f64,
    /// Prediction horizon in ticks (only 1 is supported)
    pub steps: usize,
    /// Number of value buckets, also the width of the outputs
    pub max_category_count: usize,
    /// Value span of one bucket
    pub resolution: f64,
    pub learning: bool,
    pub inference: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            alpha: 0.005,
            steps: 1,
            max_category_count: 128,
            resolution: 1.0,
            learning: true,
            inference: true,
        }
    }
}

impl ClassifierConfig {
    pub fn to_region_config(&self) -> ConfigResult<RegionConfig> {
        Ok(RegionConfig::new()
            .with("alpha", self.alpha)
            .with("steps", self.steps)
            .with("maxCategoryCount", self.max_category_count)
            .with("resolution", self.resolution))
    }
}

/// Prediction output configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("network-demo-prediction-output.csv"),
        }
    }
}

fn flatten<T: Serialize>(section: &'static str, record: &T) -> ConfigResult<RegionConfig> {
    RegionConfig::from_serializable(record).map_err(|e| ConfigError::Conversion {
        section,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_defaults() {
        let config = RegionflowConfig::default();
        assert_eq!(config.engine.seed, 1956);
        assert_eq!(config.engine.record_count, 2000);
        assert_eq!(config.spatial_pooler.column_count, 2048);
        assert_eq!(config.spatial_pooler.num_active_columns, 40);
        assert_eq!(config.temporal_memory.cells_per_column, 32);
        assert_eq!(config.temporal_memory.seed, 1960);
        assert_eq!(config.classifier.alpha, 0.005);
        assert_eq!(config.sensor.value.n, 50);
        assert_eq!(config.sensor.time_of_day.radius, 9.5);
    }

    #[test]
    fn test_spatial_pooler_record_keys() {
        let record = SpatialPoolerConfig::default().to_region_config().unwrap();
        assert_eq!(record.get_usize("columnCount").unwrap(), Some(2048));
        assert_eq!(
            record.get_usize("numActiveColumnsPerInhArea").unwrap(),
            Some(40)
        );
        assert_eq!(record.get_f64("potentialPct").unwrap(), Some(0.8));
        assert_eq!(record.get_u64("seed").unwrap(), Some(1956));
        assert_eq!(record.len(), 7);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: RegionflowConfig = toml::from_str(
            r#"
            [spatial_pooler]
            column_count = 512

            [sensor.value]
            max = 90.0
            "#,
        )
        .unwrap();
        assert_eq!(config.spatial_pooler.column_count, 512);
        assert_eq!(config.spatial_pooler.num_active_columns, 40);
        assert_eq!(config.sensor.value.max, 90.0);
        assert_eq!(config.sensor.value.w, 21);
    }
}
