// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! SDR classifier region: softmax over value buckets, one step ahead.
//!
//! Each active input bit owns a weight row over `maxCategoryCount` buckets. Inference sums
//! the rows of the current pattern and applies a softmax, giving the distribution of the
//! next tick's bucket. Learning corrects the previous tick's pattern toward the bucket
//! actually observed now.

use ahash::AHashMap;
use ndarray::Array1;
use regionflow_engine::{
    require_input, ConfigError, PortLayout, PortValues, Region, RegionConfig, RegionKind,
    RegionModes, Signal, StepError,
};
use serde_json::Value;
use tracing::trace;

use crate::params::{active_indices, positive, warn_unknown_keys};

pub const BOTTOM_UP_IN: &str = "bottomUpIn";
pub const CATEGORY_IN: &str = "categoryIn";
pub const PREDICTED_ACTIVE_CELLS: &str = "predictedActiveCells";
pub const SEQUENCE_ID_IN: &str = "sequenceIdIn";
pub const ACTUAL_VALUES: &str = "actualValues";
pub const PROBABILITIES: &str = "probabilities";

/// Smoothing of the per-bucket running value average
const ACTUAL_VALUE_ALPHA: f64 = 0.3;

const KNOWN_KEYS: &[&str] = &["alpha", "steps", "maxCategoryCount", "resolution"];

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierParams {
    pub alpha: f64,
    pub max_category_count: usize,
    pub resolution: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            alpha: 0.005,
            max_category_count: 128,
            resolution: 1.0,
        }
    }
}

impl ClassifierParams {
    pub fn from_config(config: &RegionConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let steps = config.usize_or("steps", 1)?;
        if steps != 1 {
            return Err(ConfigError::InvalidValue {
                key: "steps".into(),
                reason: format!("only 1-step prediction is supported, got {}", steps),
            });
        }
        let params = Self {
            alpha: check_alpha(config.f64_or("alpha", defaults.alpha)?)?,
            max_category_count: positive(
                "maxCategoryCount",
                config.usize_or("maxCategoryCount", defaults.max_category_count)?,
            )?,
            resolution: config.f64_or("resolution", defaults.resolution)?,
        };
        if !(params.resolution > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "resolution".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(params)
    }
}

fn check_alpha(alpha: f64) -> Result<f64, ConfigError> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(ConfigError::InvalidValue {
            key: "alpha".into(),
            reason: format!("{} is outside (0, 1]", alpha),
        });
    }
    Ok(alpha)
}

/// Numerically stable softmax
fn softmax(activations: &Array1<f64>) -> Array1<f64> {
    let max = activations.fold(f64::NEG_INFINITY, |m, &a| m.max(a));
    let exp = activations.mapv(|a| (a - max).exp());
    let sum = exp.sum();
    exp / sum
}

pub struct SdrClassifierRegion {
    params: ClassifierParams,
    pattern_width: Option<usize>,
    predicted_width: Option<usize>,
    /// Sparse: rows exist only for input bits that were ever active during learning
    weights: AHashMap<usize, Array1<f64>>,
    /// Running average value per bucket, `None` until the bucket is observed
    actual_values: Vec<Option<f64>>,
    previous_pattern: Option<Vec<usize>>,
    sequence_id: Option<f64>,
    last_predicted_active: usize,
    learn_iterations: u64,
}

impl SdrClassifierRegion {
    pub fn new(config: &RegionConfig) -> Result<Self, ConfigError> {
        let mut region = Self {
            params: ClassifierParams::default(),
            pattern_width: None,
            predicted_width: None,
            weights: AHashMap::new(),
            actual_values: Vec::new(),
            previous_pattern: None,
            sequence_id: None,
            last_predicted_active: 0,
            learn_iterations: 0,
        };
        region.configure(config)?;
        Ok(region)
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Bucket of an observed value, clamped to the bucket range
    pub fn bucket_index(&self, value: f64) -> usize {
        let bucket = (value / self.params.resolution).floor();
        let last = (self.params.max_category_count - 1) as f64;
        bucket.clamp(0.0, last) as usize
    }

    /// Representative value of every bucket
    pub fn bucket_values(&self) -> Signal {
        self.actual_values
            .iter()
            .enumerate()
            .map(|(bucket, value)| value.unwrap_or(bucket as f64 * self.params.resolution))
            .collect()
    }

    /// Next-bucket distribution for a pattern
    pub fn infer(&self, pattern: &[usize]) -> Signal {
        let mut activations = Array1::zeros(self.params.max_category_count);
        for bit in pattern {
            if let Some(row) = self.weights.get(bit) {
                activations += row;
            }
        }
        softmax(&activations)
    }

    /// Active predicted cells seen on the last step
    pub fn last_predicted_active(&self) -> usize {
        self.last_predicted_active
    }

    pub fn learn_iterations(&self) -> u64 {
        self.learn_iterations
    }

    fn learn(&mut self, pattern: &[usize], bucket: usize) {
        let mut error = self.infer(pattern);
        error.mapv_inplace(|p| -p);
        error[bucket] += 1.0;
        let buckets = self.params.max_category_count;
        for &bit in pattern {
            let row = self
                .weights
                .entry(bit)
                .or_insert_with(|| Array1::zeros(buckets));
            row.scaled_add(self.params.alpha, &error);
        }
        self.learn_iterations += 1;
    }

    fn record_value(&mut self, bucket: usize, value: f64) {
        let slot = &mut self.actual_values[bucket];
        *slot = Some(match *slot {
            Some(average) => (1.0 - ACTUAL_VALUE_ALPHA) * average + ACTUAL_VALUE_ALPHA * value,
            None => value,
        });
    }
}

impl Region for SdrClassifierRegion {
    fn kind(&self) -> RegionKind {
        RegionKind::CLASSIFIER
    }

    fn ports(&self) -> PortLayout {
        PortLayout::new()
            .input(BOTTOM_UP_IN)
            .input(CATEGORY_IN)
            .input(PREDICTED_ACTIVE_CELLS)
            .input(SEQUENCE_ID_IN)
            .output(ACTUAL_VALUES)
            .output(PROBABILITIES)
    }

    fn configure(&mut self, config: &RegionConfig) -> Result<(), ConfigError> {
        warn_unknown_keys(&self.kind(), config, KNOWN_KEYS);
        self.params = ClassifierParams::from_config(config)?;
        self.weights.clear();
        self.actual_values = vec![None; self.params.max_category_count];
        self.previous_pattern = None;
        self.sequence_id = None;
        Ok(())
    }

    fn input_width(&self, port: &str) -> Option<usize> {
        match port {
            BOTTOM_UP_IN => self.pattern_width,
            PREDICTED_ACTIVE_CELLS => self.predicted_width,
            CATEGORY_IN | SEQUENCE_ID_IN => Some(1),
            _ => None,
        }
    }

    fn output_width(&self, port: &str) -> Option<usize> {
        match port {
            ACTUAL_VALUES | PROBABILITIES => Some(self.params.max_category_count),
            _ => None,
        }
    }

    fn resolve_input_width(&mut self, port: &str, width: usize) -> Result<(), ConfigError> {
        match port {
            BOTTOM_UP_IN => self.pattern_width = Some(width),
            PREDICTED_ACTIVE_CELLS => self.predicted_width = Some(width),
            other => {
                return Err(ConfigError::InvalidValue {
                    key: other.to_string(),
                    reason: "not a resolvable input of the classifier".into(),
                })
            }
        }
        Ok(())
    }

    fn set_parameter(&mut self, key: &str, value: &Value) -> Result<(), ConfigError> {
        match key {
            "alpha" => {
                let alpha = value.as_f64().ok_or_else(|| ConfigError::InvalidType {
                    key: key.to_string(),
                    expected: "a number",
                    found: value.to_string(),
                })?;
                self.params.alpha = check_alpha(alpha)?;
                Ok(())
            }
            k if KNOWN_KEYS.contains(&k) => Err(ConfigError::Immutable(k.to_string())),
            k => Err(ConfigError::UnknownParameter(k.to_string())),
        }
    }

    fn step(&mut self, inputs: &PortValues, modes: RegionModes) -> Result<PortValues, StepError> {
        let width = self
            .pattern_width
            .ok_or_else(|| StepError::Failed("bottomUpIn width was never resolved".into()))?;
        let pattern = active_indices(require_input(inputs, BOTTOM_UP_IN, width)?);
        let value = require_input(inputs, CATEGORY_IN, 1)?[0];
        if !value.is_finite() {
            return Err(StepError::Failed(format!("categoryIn is not finite: {}", value)));
        }

        if let Some(predicted) = inputs.get(PREDICTED_ACTIVE_CELLS) {
            self.last_predicted_active = predicted.iter().filter(|&&v| v > 0.0).count();
        }
        if let Some(sequence) = inputs.get(SEQUENCE_ID_IN) {
            let id = sequence[0];
            if self.sequence_id.is_some_and(|last| last != id) {
                trace!("[CLASSIFIER] sequence changed to {}, history cleared", id);
                self.previous_pattern = None;
            }
            self.sequence_id = Some(id);
        }

        let bucket = self.bucket_index(value);
        if modes.learning {
            if let Some(previous) = self.previous_pattern.take() {
                self.learn(&previous, bucket);
            }
            self.record_value(bucket, value);
        }

        let buckets = self.params.max_category_count;
        let (actual_values, probabilities) = if modes.inference {
            (self.bucket_values(), self.infer(&pattern))
        } else {
            (Signal::zeros(buckets), Signal::zeros(buckets))
        };
        self.previous_pattern = Some(pattern);

        let mut outputs = PortValues::new();
        outputs.insert(ACTUAL_VALUES.into(), actual_values);
        outputs.insert(PROBABILITIES.into(), probabilities);
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::indicator;

    fn classifier(alpha: f64) -> SdrClassifierRegion {
        let mut region = SdrClassifierRegion::new(
            &RegionConfig::new()
                .with("alpha", alpha)
                .with("maxCategoryCount", 8),
        )
        .unwrap();
        region.resolve_input_width(BOTTOM_UP_IN, 16).unwrap();
        region
    }

    fn inputs(bits: &[usize], value: f64) -> PortValues {
        let mut inputs = PortValues::new();
        inputs.insert(BOTTOM_UP_IN.into(), indicator(16, bits.iter().copied()));
        inputs.insert(CATEGORY_IN.into(), Signal::from_elem(1, value));
        inputs
    }

    #[test]
    fn test_untrained_distribution_is_uniform() {
        let mut region = classifier(0.1);
        let out = region.step(&inputs(&[1, 2], 3.0), RegionModes::default()).unwrap();
        assert_eq!(out[PROBABILITIES].len(), 8);
        for p in out[PROBABILITIES].iter() {
            assert!((p - 0.125).abs() < 1e-12);
        }
        // unseen buckets report their lower bound, bucket 3 the observed value
        assert_eq!(out[ACTUAL_VALUES][5], 5.0);
        assert_eq!(out[ACTUAL_VALUES][3], 3.0);
    }

    #[test]
    fn test_learns_alternating_sequence() {
        let mut region = classifier(0.5);
        let (a, b) = ([0usize, 1, 2], [8usize, 9, 10]);
        for _ in 0..30 {
            region.step(&inputs(&a, 2.0), RegionModes::default()).unwrap();
            region.step(&inputs(&b, 6.0), RegionModes::default()).unwrap();
        }
        // after pattern a, bucket 6 follows
        let out = region.step(&inputs(&a, 2.0), RegionModes::default()).unwrap();
        let probabilities = &out[PROBABILITIES];
        let best = (0..8)
            .max_by(|&x, &y| probabilities[x].total_cmp(&probabilities[y]))
            .unwrap();
        assert_eq!(best, 6);
        assert!(probabilities.sum() > 0.999 && probabilities.sum() < 1.001);
        assert_eq!(region.learn_iterations(), 60);
    }

    #[test]
    fn test_sequence_change_skips_learning() {
        let mut region = classifier(0.5);
        let mut first = inputs(&[0], 1.0);
        first.insert(SEQUENCE_ID_IN.into(), Signal::from_elem(1, 0.0));
        let mut second = inputs(&[1], 2.0);
        second.insert(SEQUENCE_ID_IN.into(), Signal::from_elem(1, 1.0));

        region.step(&first, RegionModes::default()).unwrap();
        region.step(&second, RegionModes::default()).unwrap();
        assert_eq!(region.learn_iterations(), 0);
    }

    #[test]
    fn test_bucket_clamping_and_averages() {
        let mut region = classifier(0.1);
        assert_eq!(region.bucket_index(-4.0), 0);
        assert_eq!(region.bucket_index(250.0), 7);
        assert_eq!(region.bucket_index(3.9), 3);

        region.step(&inputs(&[0], 3.0), RegionModes::default()).unwrap();
        let out = region.step(&inputs(&[0], 3.5), RegionModes::default()).unwrap();
        assert!((out[ACTUAL_VALUES][3] - (0.7 * 3.0 + 0.3 * 3.5)).abs() < 1e-12);
    }

    #[test]
    fn test_configuration() {
        assert!(SdrClassifierRegion::new(&RegionConfig::new().with("steps", 5)).is_err());
        assert!(SdrClassifierRegion::new(&RegionConfig::new().with("alpha", 0.0)).is_err());
        let mut region = classifier(0.1);
        region.set_parameter("alpha", &Value::from(0.2)).unwrap();
        assert_eq!(region.params().alpha, 0.2);
        assert_eq!(
            region.set_parameter("resolution", &Value::from(2.0)),
            Err(ConfigError::Immutable("resolution".into()))
        );
    }
}
