// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Temporal memory region: first-order column transition memory.
//!
//! Every column keeps segments, each owned by one cell and listing the columns that were
//! active on the tick before the cell's column became active. A cell is predictive when
//! one of its segments overlaps the current active columns in at least
//! `activationThreshold` columns. Predicted columns activate only their predictive cells;
//! unpredicted columns burst.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regionflow_engine::{
    require_input, ConfigError, PortLayout, PortValues, Region, RegionConfig, RegionKind,
    RegionModes, Signal, StepError,
};
use serde_json::Value;
use tracing::trace;

use crate::params::{active_indices, flag, indicator, positive, warn_unknown_keys};

pub const BOTTOM_UP_IN: &str = "bottomUpIn";
pub const RESET_IN: &str = "resetIn";
pub const BOTTOM_UP_OUT: &str = "bottomUpOut";
pub const TOP_DOWN_OUT: &str = "topDownOut";
pub const PREDICTED_ACTIVE_CELLS: &str = "predictedActiveCells";
pub const ANOMALY_SCORE: &str = "anomalyScore";

pub const TOP_DOWN_MODE: &str = "topDownMode";
pub const ANOMALY_MODE: &str = "anomalyMode";

const KNOWN_KEYS: &[&str] = &[
    "columnCount",
    "cellsPerColumn",
    "activationThreshold",
    "maxSegmentsPerColumn",
    "seed",
    TOP_DOWN_MODE,
    ANOMALY_MODE,
];

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalMemoryParams {
    pub column_count: usize,
    pub cells_per_column: usize,
    pub activation_threshold: usize,
    pub max_segments_per_column: usize,
    pub seed: u64,
}

impl Default for TemporalMemoryParams {
    fn default() -> Self {
        Self {
            column_count: 2048,
            cells_per_column: 32,
            activation_threshold: 12,
            max_segments_per_column: 16,
            seed: 1960,
        }
    }
}

impl TemporalMemoryParams {
    pub fn from_config(config: &RegionConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            column_count: positive(
                "columnCount",
                config.usize_or("columnCount", defaults.column_count)?,
            )?,
            cells_per_column: positive(
                "cellsPerColumn",
                config.usize_or("cellsPerColumn", defaults.cells_per_column)?,
            )?,
            activation_threshold: positive(
                "activationThreshold",
                config.usize_or("activationThreshold", defaults.activation_threshold)?,
            )?,
            max_segments_per_column: positive(
                "maxSegmentsPerColumn",
                config.usize_or("maxSegmentsPerColumn", defaults.max_segments_per_column)?,
            )?,
            seed: config.u64_or("seed", defaults.seed)?,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.column_count * self.cells_per_column
    }
}

#[derive(Debug, Clone)]
struct Segment {
    cell: usize,
    /// Sorted column indices
    presynaptic: Vec<usize>,
    last_used: u64,
}

impl Segment {
    fn overlap(&self, active: &[bool]) -> usize {
        self.presynaptic.iter().filter(|&&c| active[c]).count()
    }
}

pub struct TemporalMemoryRegion {
    params: TemporalMemoryParams,
    rng: StdRng,
    segments: Vec<Vec<Segment>>,
    previous_active_columns: Vec<usize>,
    /// Global cell indices predicted for the coming tick, ascending
    predictive_cells: Vec<usize>,
    top_down_mode: bool,
    anomaly_mode: bool,
    anomaly_score: f64,
    iterations: u64,
}

impl TemporalMemoryRegion {
    pub fn new(config: &RegionConfig) -> Result<Self, ConfigError> {
        let mut region = Self {
            params: TemporalMemoryParams::default(),
            rng: StdRng::seed_from_u64(0),
            segments: Vec::new(),
            previous_active_columns: Vec::new(),
            predictive_cells: Vec::new(),
            top_down_mode: false,
            anomaly_mode: false,
            anomaly_score: 0.0,
            iterations: 0,
        };
        region.configure(config)?;
        Ok(region)
    }

    pub fn params(&self) -> &TemporalMemoryParams {
        &self.params
    }

    pub fn column_count(&self) -> usize {
        self.params.column_count
    }

    pub fn top_down_mode(&self) -> bool {
        self.top_down_mode
    }

    pub fn anomaly_mode(&self) -> bool {
        self.anomaly_mode
    }

    /// Anomaly of the last step (0 while anomaly mode is off)
    pub fn anomaly_score(&self) -> f64 {
        self.anomaly_score
    }

    pub fn segment_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    /// Forget the sequence context; learned segments stay
    pub fn reset(&mut self) {
        self.previous_active_columns.clear();
        self.predictive_cells.clear();
    }

    fn column_mask(&self, columns: &[usize]) -> Vec<bool> {
        let mut mask = vec![false; self.params.column_count];
        for &column in columns {
            mask[column] = true;
        }
        mask
    }

    fn learn(&mut self, active_columns: &[usize]) {
        if self.previous_active_columns.is_empty() {
            return;
        }
        let previous = self.column_mask(&self.previous_active_columns);
        let threshold = self.params.activation_threshold;
        let cells = self.params.cells_per_column;
        let capacity = self.params.max_segments_per_column;

        for &column in active_columns {
            let iteration = self.iterations;
            let segments = &mut self.segments[column];
            let mut matched = false;
            for segment in segments.iter_mut() {
                if segment.overlap(&previous) >= threshold {
                    segment.last_used = iteration;
                    matched = true;
                }
            }
            if matched {
                continue;
            }

            let segment = Segment {
                cell: self.rng.gen_range(0..cells),
                presynaptic: self.previous_active_columns.clone(),
                last_used: iteration,
            };
            if segments.len() < capacity {
                segments.push(segment);
            } else if let Some(stale) = segments.iter_mut().min_by_key(|s| s.last_used) {
                *stale = segment;
            }
        }
    }

    fn predict(&self, active_columns: &[usize]) -> Vec<usize> {
        let active = self.column_mask(active_columns);
        let cells = self.params.cells_per_column;
        let threshold = self.params.activation_threshold;
        let mut predictive = Vec::new();
        for (column, segments) in self.segments.iter().enumerate() {
            for segment in segments {
                if segment.overlap(&active) >= threshold {
                    predictive.push(column * cells + segment.cell);
                }
            }
        }
        predictive.sort_unstable();
        predictive.dedup();
        predictive
    }
}

impl Region for TemporalMemoryRegion {
    fn kind(&self) -> RegionKind {
        RegionKind::TEMPORAL_MEMORY
    }

    fn ports(&self) -> PortLayout {
        PortLayout::new()
            .input(BOTTOM_UP_IN)
            .input(RESET_IN)
            .output(BOTTOM_UP_OUT)
            .output(TOP_DOWN_OUT)
            .output(PREDICTED_ACTIVE_CELLS)
            .output(ANOMALY_SCORE)
    }

    fn configure(&mut self, config: &RegionConfig) -> Result<(), ConfigError> {
        warn_unknown_keys(&self.kind(), config, KNOWN_KEYS);
        self.params = TemporalMemoryParams::from_config(config)?;
        self.top_down_mode = config.bool_or(TOP_DOWN_MODE, false)?;
        self.anomaly_mode = config.bool_or(ANOMALY_MODE, false)?;
        self.rng = StdRng::seed_from_u64(self.params.seed);
        self.segments = vec![Vec::new(); self.params.column_count];
        self.reset();
        Ok(())
    }

    fn input_width(&self, port: &str) -> Option<usize> {
        match port {
            BOTTOM_UP_IN => Some(self.params.column_count),
            RESET_IN => Some(1),
            _ => None,
        }
    }

    fn output_width(&self, port: &str) -> Option<usize> {
        match port {
            BOTTOM_UP_OUT | PREDICTED_ACTIVE_CELLS => Some(self.params.cell_count()),
            TOP_DOWN_OUT => Some(self.params.column_count),
            ANOMALY_SCORE => Some(1),
            _ => None,
        }
    }

    fn resolve_input_width(&mut self, port: &str, _width: usize) -> Result<(), ConfigError> {
        Err(ConfigError::InvalidValue {
            key: port.to_string(),
            reason: "temporal memory input widths are fixed by columnCount".into(),
        })
    }

    fn set_parameter(&mut self, key: &str, value: &Value) -> Result<(), ConfigError> {
        match key {
            TOP_DOWN_MODE => self.top_down_mode = flag(key, value)?,
            ANOMALY_MODE => self.anomaly_mode = flag(key, value)?,
            k if KNOWN_KEYS.contains(&k) => return Err(ConfigError::Immutable(k.to_string())),
            k => return Err(ConfigError::UnknownParameter(k.to_string())),
        }
        Ok(())
    }

    fn step(&mut self, inputs: &PortValues, modes: RegionModes) -> Result<PortValues, StepError> {
        let columns = self.params.column_count;
        let cells = self.params.cells_per_column;
        let active_columns = active_indices(require_input(inputs, BOTTOM_UP_IN, columns)?);

        if inputs.get(RESET_IN).is_some_and(|reset| reset[0] > 0.0) {
            trace!("[TM] reset at iteration {}", self.iterations);
            self.reset();
        }

        let mut active_cells = Vec::new();
        let mut predicted_active = Vec::new();
        let mut unpredicted_columns = 0usize;
        for &column in &active_columns {
            let first = column * cells;
            let predicted: Vec<usize> = self
                .predictive_cells
                .iter()
                .copied()
                .filter(|cell| (first..first + cells).contains(cell))
                .collect();
            if predicted.is_empty() {
                unpredicted_columns += 1;
                active_cells.extend(first..first + cells);
            } else {
                active_cells.extend(predicted.iter().copied());
                predicted_active.extend(predicted);
            }
        }

        self.anomaly_score = match (self.anomaly_mode, active_columns.len()) {
            (false, _) | (true, 0) => 0.0,
            (true, count) => unpredicted_columns as f64 / count as f64,
        };

        if modes.learning {
            self.learn(&active_columns);
        }
        self.predictive_cells = self.predict(&active_columns);
        self.previous_active_columns = active_columns;

        trace!(
            "[TM] iteration {} active cells {} predicted next {}",
            self.iterations,
            active_cells.len(),
            self.predictive_cells.len()
        );
        self.iterations += 1;

        let mut top_down = Signal::zeros(columns);
        if modes.inference && self.top_down_mode {
            for &cell in &self.predictive_cells {
                top_down[cell / cells] = 1.0;
            }
        }
        let predicted_active = if modes.inference {
            indicator(self.params.cell_count(), predicted_active)
        } else {
            Signal::zeros(self.params.cell_count())
        };

        let mut outputs = PortValues::new();
        outputs.insert(
            BOTTOM_UP_OUT.into(),
            indicator(self.params.cell_count(), active_cells),
        );
        outputs.insert(TOP_DOWN_OUT.into(), top_down);
        outputs.insert(PREDICTED_ACTIVE_CELLS.into(), predicted_active);
        outputs.insert(ANOMALY_SCORE.into(), Signal::from_elem(1, self.anomaly_score));
        Ok(outputs)
    }
}
