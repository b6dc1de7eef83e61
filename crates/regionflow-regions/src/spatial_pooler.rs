// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Spatial pooler region: sparse column activation with global inhibition.
//!
//! Each column samples a seeded potential pool of the input. Overlap is the count of
//! active input bits on connected synapses; the `numActiveColumnsPerInhArea` columns with
//! the highest non-zero overlap win (lower index breaks ties). Learning moves permanences
//! of winning columns toward their current input.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regionflow_engine::{
    require_input, ConfigError, PortLayout, PortValues, Region, RegionConfig, RegionKind,
    RegionModes, Signal, StepError,
};
use serde_json::Value;
use tracing::{debug, trace};

use crate::params::{active_indices, flag, indicator, positive, unit_interval, warn_unknown_keys};

pub const BOTTOM_UP_IN: &str = "bottomUpIn";
pub const RESET_IN: &str = "resetIn";
pub const TOP_DOWN_IN: &str = "topDownIn";
pub const BOTTOM_UP_OUT: &str = "bottomUpOut";
pub const SPATIAL_TOP_DOWN_OUT: &str = "spatialTopDownOut";
pub const TEMPORAL_TOP_DOWN_OUT: &str = "temporalTopDownOut";

const KNOWN_KEYS: &[&str] = &[
    "columnCount",
    "numActiveColumnsPerInhArea",
    "potentialPct",
    "synPermConnected",
    "synPermActiveInc",
    "synPermInactiveDec",
    "seed",
    "globalInhibition",
    "inputWidth",
];

/// Parameters fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialPoolerParams {
    pub column_count: usize,
    pub num_active_columns: usize,
    pub potential_pct: f64,
    pub syn_perm_connected: f64,
    pub syn_perm_active_inc: f64,
    pub syn_perm_inactive_dec: f64,
    pub seed: u64,
}

impl Default for SpatialPoolerParams {
    fn default() -> Self {
        Self {
            column_count: 2048,
            num_active_columns: 40,
            potential_pct: 0.8,
            syn_perm_connected: 0.1,
            syn_perm_active_inc: 0.0001,
            syn_perm_inactive_dec: 0.0005,
            seed: 1956,
        }
    }
}

impl SpatialPoolerParams {
    pub fn from_config(config: &RegionConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let params = Self {
            column_count: positive(
                "columnCount",
                config.usize_or("columnCount", defaults.column_count)?,
            )?,
            num_active_columns: positive(
                "numActiveColumnsPerInhArea",
                config.usize_or("numActiveColumnsPerInhArea", defaults.num_active_columns)?,
            )?,
            potential_pct: unit_interval(
                "potentialPct",
                config.f64_or("potentialPct", defaults.potential_pct)?,
            )?,
            syn_perm_connected: unit_interval(
                "synPermConnected",
                config.f64_or("synPermConnected", defaults.syn_perm_connected)?,
            )?,
            syn_perm_active_inc: unit_interval(
                "synPermActiveInc",
                config.f64_or("synPermActiveInc", defaults.syn_perm_active_inc)?,
            )?,
            syn_perm_inactive_dec: unit_interval(
                "synPermInactiveDec",
                config.f64_or("synPermInactiveDec", defaults.syn_perm_inactive_dec)?,
            )?,
            seed: config.u64_or("seed", defaults.seed)?,
        };
        if params.num_active_columns > params.column_count {
            return Err(ConfigError::InvalidValue {
                key: "numActiveColumnsPerInhArea".into(),
                reason: format!(
                    "{} active columns requested out of {}",
                    params.num_active_columns, params.column_count
                ),
            });
        }
        if !config.bool_or("globalInhibition", true)? {
            return Err(ConfigError::InvalidValue {
                key: "globalInhibition".into(),
                reason: "only global inhibition is supported".into(),
            });
        }
        Ok(params)
    }
}

/// Synapse state, allocated once the input width is known
#[derive(Debug, Clone)]
struct Synapses {
    /// column x input; non-potential entries stay at zero
    potential: Array2<bool>,
    permanences: Array2<f64>,
    /// 1.0 where the permanence reaches the connection threshold
    connected: Array2<f64>,
}

pub struct SpatialPoolerRegion {
    params: SpatialPoolerParams,
    input_width: Option<usize>,
    top_down_width: Option<usize>,
    synapses: Option<Synapses>,
    active_columns: Vec<usize>,
    iterations: u64,
}

impl SpatialPoolerRegion {
    pub fn new(config: &RegionConfig) -> Result<Self, ConfigError> {
        let mut region = Self {
            params: SpatialPoolerParams::default(),
            input_width: None,
            top_down_width: None,
            synapses: None,
            active_columns: Vec::new(),
            iterations: 0,
        };
        region.configure(config)?;
        Ok(region)
    }

    pub fn params(&self) -> &SpatialPoolerParams {
        &self.params
    }

    pub fn column_count(&self) -> usize {
        self.params.column_count
    }

    /// Winners of the last step, ascending
    pub fn active_columns(&self) -> &[usize] {
        &self.active_columns
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Connected synapse count per column
    pub fn connected_counts(&self) -> Option<Array1<f64>> {
        self.synapses
            .as_ref()
            .map(|synapses| synapses.connected.sum_axis(Axis(1)))
    }

    fn allocate(&mut self, input_width: usize) {
        let columns = self.params.column_count;
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let threshold = self.params.syn_perm_connected;

        let mut potential = Array2::from_elem((columns, input_width), false);
        let mut permanences: Array2<f64> = Array2::zeros((columns, input_width));
        for ((column, input), slot) in potential.indexed_iter_mut() {
            if rng.gen_bool(self.params.potential_pct) {
                *slot = true;
                // roughly half of the potential synapses start connected
                permanences[[column, input]] = (rng.gen::<f64>() * 2.0 * threshold).min(1.0);
            }
        }
        let connected = permanences.mapv(|p: f64| if p >= threshold { 1.0 } else { 0.0 });

        debug!(
            "[SP] Allocated {} columns over {} inputs (seed {})",
            columns, input_width, self.params.seed
        );
        self.input_width = Some(input_width);
        self.synapses = Some(Synapses {
            potential,
            permanences,
            connected,
        });
    }

    /// Top `num_active_columns` by overlap, ties to the lower index, zero overlap never wins
    fn inhibit(&self, overlaps: &Array1<f64>) -> Vec<usize> {
        let mut ranked: Vec<usize> = (0..overlaps.len()).filter(|&c| overlaps[c] > 0.0).collect();
        ranked.sort_by(|&a, &b| overlaps[b].total_cmp(&overlaps[a]).then(a.cmp(&b)));
        ranked.truncate(self.params.num_active_columns);
        ranked.sort_unstable();
        ranked
    }

    /// Union of the connected receptive fields of `columns`, clipped to binary
    fn reconstruct(synapses: &Synapses, columns: &[usize], input_width: usize) -> Signal {
        let mut field = Signal::zeros(input_width);
        for &column in columns {
            field.zip_mut_with(&synapses.connected.row(column), |out, &c| {
                if c > 0.0 {
                    *out = 1.0;
                }
            });
        }
        field
    }
}

impl Region for SpatialPoolerRegion {
    fn kind(&self) -> RegionKind {
        RegionKind::SPATIAL_POOLER
    }

    fn ports(&self) -> PortLayout {
        PortLayout::new()
            .input(BOTTOM_UP_IN)
            .input(RESET_IN)
            .input(TOP_DOWN_IN)
            .output(BOTTOM_UP_OUT)
            .output(SPATIAL_TOP_DOWN_OUT)
            .output(TEMPORAL_TOP_DOWN_OUT)
    }

    fn configure(&mut self, config: &RegionConfig) -> Result<(), ConfigError> {
        warn_unknown_keys(&self.kind(), config, KNOWN_KEYS);
        self.params = SpatialPoolerParams::from_config(config)?;
        self.synapses = None;
        self.input_width = None;
        if let Some(width) = config.get_usize("inputWidth")? {
            self.allocate(positive("inputWidth", width)?);
        }
        Ok(())
    }

    fn input_width(&self, port: &str) -> Option<usize> {
        match port {
            BOTTOM_UP_IN => self.input_width,
            RESET_IN => Some(1),
            TOP_DOWN_IN => self.top_down_width,
            _ => None,
        }
    }

    fn output_width(&self, port: &str) -> Option<usize> {
        match port {
            BOTTOM_UP_OUT => Some(self.params.column_count),
            SPATIAL_TOP_DOWN_OUT | TEMPORAL_TOP_DOWN_OUT => self.input_width,
            _ => None,
        }
    }

    fn resolve_input_width(&mut self, port: &str, width: usize) -> Result<(), ConfigError> {
        match port {
            BOTTOM_UP_IN => {
                self.allocate(positive(BOTTOM_UP_IN, width)?);
                Ok(())
            }
            TOP_DOWN_IN if width == self.params.column_count => {
                self.top_down_width = Some(width);
                Ok(())
            }
            TOP_DOWN_IN => Err(ConfigError::InvalidValue {
                key: TOP_DOWN_IN.into(),
                reason: format!(
                    "top-down width {} must equal the column count {}",
                    width, self.params.column_count
                ),
            }),
            other => Err(ConfigError::InvalidValue {
                key: other.to_string(),
                reason: "not a resolvable input of the spatial pooler".into(),
            }),
        }
    }

    fn set_parameter(&mut self, key: &str, value: &Value) -> Result<(), ConfigError> {
        let rate = || {
            value
                .as_f64()
                .ok_or_else(|| ConfigError::InvalidType {
                    key: key.to_string(),
                    expected: "a number",
                    found: value.to_string(),
                })
                .and_then(|v| unit_interval(key, v))
        };
        match key {
            "synPermActiveInc" => self.params.syn_perm_active_inc = rate()?,
            "synPermInactiveDec" => self.params.syn_perm_inactive_dec = rate()?,
            "globalInhibition" if flag(key, value)? => {}
            k if KNOWN_KEYS.contains(&k) => return Err(ConfigError::Immutable(k.to_string())),
            k => return Err(ConfigError::UnknownParameter(k.to_string())),
        }
        Ok(())
    }

    fn step(&mut self, inputs: &PortValues, modes: RegionModes) -> Result<PortValues, StepError> {
        let input_width = self
            .input_width
            .ok_or_else(|| StepError::Failed("input width was never resolved".into()))?;
        let input = require_input(inputs, BOTTOM_UP_IN, input_width)?;
        let synapses = self
            .synapses
            .as_ref()
            .ok_or_else(|| StepError::Failed("synapses were never allocated".into()))?;

        let active_inputs = input.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let overlaps = synapses.connected.dot(&active_inputs);
        let winners = self.inhibit(&overlaps);

        let spatial_top_down = Self::reconstruct(synapses, &winners, input_width);
        let temporal_top_down = match inputs.get(TOP_DOWN_IN) {
            Some(predicted) => {
                let predicted_columns = active_indices(predicted);
                Self::reconstruct(synapses, &predicted_columns, input_width)
            }
            None => Signal::zeros(input_width),
        };

        if modes.learning {
            let (inc, dec, threshold) = (
                self.params.syn_perm_active_inc,
                self.params.syn_perm_inactive_dec,
                self.params.syn_perm_connected,
            );
            if let Some(synapses) = self.synapses.as_mut() {
                for &column in &winners {
                    let potential = synapses.potential.row(column);
                    let mut permanences = synapses.permanences.row_mut(column);
                    let mut connected = synapses.connected.row_mut(column);
                    for input_bit in 0..input_width {
                        if !potential[input_bit] {
                            continue;
                        }
                        let p = &mut permanences[input_bit];
                        *p = if active_inputs[input_bit] > 0.0 {
                            (*p + inc).min(1.0)
                        } else {
                            (*p - dec).max(0.0)
                        };
                        connected[input_bit] = if *p >= threshold { 1.0 } else { 0.0 };
                    }
                }
            }
        }

        trace!(
            "[SP] iteration {} winners {} (max overlap {})",
            self.iterations,
            winners.len(),
            overlaps.iter().cloned().fold(0.0, f64::max)
        );
        self.iterations += 1;

        let mut outputs = PortValues::new();
        outputs.insert(
            BOTTOM_UP_OUT.into(),
            indicator(self.params.column_count, winners.iter().copied()),
        );
        outputs.insert(SPATIAL_TOP_DOWN_OUT.into(), spatial_top_down);
        outputs.insert(TEMPORAL_TOP_DOWN_OUT.into(), temporal_top_down);
        self.active_columns = winners;
        Ok(outputs)
    }
}
