// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Region capability interface
//!
//! A region is a named processing unit with a fixed set of input and output ports. The
//! engine never looks inside a region: it only asks for port widths, routes signals into
//! `step()` and routes the produced outputs along links.
//!
//! ## Design Notes
//!
//! - Port widths are `Option<usize>`: `None` until an upstream width is known. The graph
//!   resolves them during `initialize()` through [`Region::resolve_input_width`].
//! - Region kinds are string tags, so new kinds can be added without touching the engine.
//!   Concrete regions are produced by a [`RegionFactory`] keyed by that tag.

use std::borrow::Cow;
use std::fmt;

use ahash::AHashMap;
use ndarray::Array1;
use serde_json::Value;

use crate::record::SourceError;
use crate::region_config::RegionConfig;

/// Dense vector exchanged between regions (SDRs, scalars, probability lists)
pub type Signal = Array1<f64>;

/// Port name -> signal mapping passed into and returned from `step()`
pub type PortValues = AHashMap<String, Signal>;

/// Capability tag of a region
///
/// Well-known kinds are provided as associated constants; any other tag can be created
/// with [`RegionKind::custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKind(Cow<'static, str>);

impl RegionKind {
    pub const SENSOR: RegionKind = RegionKind(Cow::Borrowed("Sensor"));
    pub const SPATIAL_POOLER: RegionKind = RegionKind(Cow::Borrowed("SpatialPooler"));
    pub const TEMPORAL_MEMORY: RegionKind = RegionKind(Cow::Borrowed("TemporalMemory"));
    pub const CLASSIFIER: RegionKind = RegionKind(Cow::Borrowed("Classifier"));

    /// Kind from a static tag
    pub const fn from_static(tag: &'static str) -> Self {
        RegionKind(Cow::Borrowed(tag))
    }

    /// Kind from a runtime tag
    pub fn custom(tag: impl Into<String>) -> Self {
        RegionKind(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Side of a region a port lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// Ordered port names declared by a region
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortLayout {
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl PortLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an input port
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    /// Declare an output port
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn has(&self, direction: PortDirection, port: &str) -> bool {
        match direction {
            PortDirection::Input => self.inputs.iter().any(|p| p == port),
            PortDirection::Output => self.outputs.iter().any(|p| p == port),
        }
    }
}

/// Mode flags that affect `step()` and may change between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionModes {
    pub learning: bool,
    pub inference: bool,
}

impl Default for RegionModes {
    fn default() -> Self {
        Self {
            learning: true,
            inference: true,
        }
    }
}

/// Errors raised while configuring a region
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required key '{0}'")]
    MissingKey(String),

    #[error("key '{key}' expects {expected}, got {found}")]
    InvalidType {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("configuration must be a flat record: {0}")]
    NotFlat(String),

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("parameter '{0}' is fixed after construction")]
    Immutable(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Errors raised by a region while stepping
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("required input '{port}' was not supplied")]
    MissingInput { port: String },

    #[error("port '{port}' carries {actual} values, expected {expected}")]
    WidthMismatch {
        port: String,
        expected: usize,
        actual: usize,
    },

    #[error("declared output '{port}' was not produced")]
    MissingOutput { port: String },

    #[error("produced undeclared output '{port}'")]
    UndeclaredOutput { port: String },

    #[error("record source failed: {0}")]
    Source(#[from] SourceError),

    #[error("{0}")]
    Failed(String),
}

/// Capability interface every region implements
///
/// `step()` is only ever called after `initialize()` succeeded, once per tick, in the
/// scheduler's order. Inputs contain one entry per linked input port.
pub trait Region {
    /// Capability tag of this region
    fn kind(&self) -> RegionKind;

    /// Declared ports (fixed for the lifetime of the region)
    fn ports(&self) -> PortLayout;

    /// Apply a flat configuration record
    fn configure(&mut self, config: &RegionConfig) -> Result<(), ConfigError>;

    /// Width expected on an input port, `None` while unresolved
    fn input_width(&self, port: &str) -> Option<usize>;

    /// Width produced on an output port, `None` while it depends on an unresolved input
    fn output_width(&self, port: &str) -> Option<usize>;

    /// Fix the width of an input port from the upstream link
    fn resolve_input_width(&mut self, port: &str, width: usize) -> Result<(), ConfigError>;

    /// Change a parameter that stays mutable after construction
    fn set_parameter(&mut self, key: &str, _value: &Value) -> Result<(), ConfigError> {
        Err(ConfigError::UnknownParameter(key.to_string()))
    }

    /// Produce outputs from the current inputs
    fn step(&mut self, inputs: &PortValues, modes: RegionModes) -> Result<PortValues, StepError>;
}

/// Creates regions from an explicit kind tag
pub trait RegionFactory {
    /// Whether `create` understands this kind
    fn supports(&self, kind: &RegionKind) -> bool;

    /// Build and configure a region of the given kind
    fn create(
        &mut self,
        kind: &RegionKind,
        config: &RegionConfig,
    ) -> Result<Box<dyn Region>, ConfigError>;
}

/// Fetch a required input and check its width
pub fn require_input<'a>(
    inputs: &'a PortValues,
    port: &str,
    expected: usize,
) -> Result<&'a Signal, StepError> {
    let value = inputs.get(port).ok_or_else(|| StepError::MissingInput {
        port: port.to_string(),
    })?;
    if value.len() != expected {
        return Err(StepError::WidthMismatch {
            port: port.to_string(),
            expected,
            actual: value.len(),
        });
    }
    Ok(value)
}
