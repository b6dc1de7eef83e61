// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Engine error taxonomy.
//!
//! Construction errors are raised by `add_region`, `link` and `initialize` before any
//! tick runs. Execution errors carry the tick index and the failing region. Selection
//! errors come from [`crate::selector::PredictionSelector`]. None of them is recovered
//! internally.

use crate::driver::SinkError;
use crate::region::{ConfigError, PortDirection, StepError};

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while building or running a network
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // === Construction ===
    #[error("region '{0}' already exists")]
    DuplicateName(String),

    #[error("unknown region '{0}'")]
    UnknownRegion(String),

    #[error("region '{region}' has no {direction} port '{port}'")]
    UnknownPort {
        region: String,
        port: String,
        direction: PortDirection,
    },

    #[error(
        "width mismatch on link {link}: source produces {source_width}, destination expects {destination_width}"
    )]
    WidthMismatch {
        link: String,
        source_width: usize,
        destination_width: usize,
    },

    #[error("width of {direction} port '{region}.{port}' is still unresolved")]
    UnresolvedWidth {
        region: String,
        port: String,
        direction: PortDirection,
    },

    #[error("feed-forward cycle without a feedback link: {}", .regions.join(" -> "))]
    IllegalCycle { regions: Vec<String> },

    #[error("no region factory accepts kind '{0}'")]
    UnknownRegionKind(String),

    #[error("input port '{region}.{port}' is already linked from {existing}")]
    PortAlreadyLinked {
        region: String,
        port: String,
        existing: String,
    },

    #[error("network topology is frozen after initialize(); cannot {0}")]
    AlreadyInitialized(&'static str),

    #[error("configuration of region '{region}' failed: {source}")]
    Config {
        region: String,
        #[source]
        source: ConfigError,
    },

    // === Execution ===
    #[error("network must be initialized before {0}")]
    NotInitialized(&'static str),

    #[error("tick {tick} failed in region '{region}': {source}")]
    TickExecution {
        tick: u64,
        region: String,
        #[source]
        source: StepError,
    },

    #[error("network halted after tick {tick} failed; rebuild it to run again")]
    Halted { tick: u64 },

    #[error("output '{region}.{port}' has no value")]
    OutputUnavailable { region: String, port: String },

    #[error("failed to emit prediction record for tick {tick}: {source}")]
    Sink {
        tick: u64,
        #[source]
        source: SinkError,
    },

    // === Selection ===
    #[error("no candidate lies within epsilon of the maximum probability ({candidates} candidates)")]
    EmptyCandidateSet { candidates: usize },

    #[error("{candidates} candidates but {probabilities} probabilities")]
    CandidateLengthMismatch {
        candidates: usize,
        probabilities: usize,
    },
}

impl EngineError {
    /// True for errors raised while building or initializing a network
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            EngineError::DuplicateName(_)
                | EngineError::UnknownRegion(_)
                | EngineError::UnknownPort { .. }
                | EngineError::WidthMismatch { .. }
                | EngineError::UnresolvedWidth { .. }
                | EngineError::IllegalCycle { .. }
                | EngineError::UnknownRegionKind(_)
                | EngineError::PortAlreadyLinked { .. }
                | EngineError::AlreadyInitialized(_)
                | EngineError::Config { .. }
        )
    }

    /// Region name this error is attributed to, if any
    pub fn region(&self) -> Option<&str> {
        match self {
            EngineError::DuplicateName(region) | EngineError::UnknownRegion(region) => {
                Some(region)
            }
            EngineError::UnknownPort { region, .. }
            | EngineError::UnresolvedWidth { region, .. }
            | EngineError::PortAlreadyLinked { region, .. }
            | EngineError::Config { region, .. }
            | EngineError::TickExecution { region, .. }
            | EngineError::OutputUnavailable { region, .. } => Some(region),
            _ => None,
        }
    }
}
