// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! # Regionflow
//!
//! Tick-scheduled execution of cyclic region graphs with one-tick-delayed feedback and
//! seeded prediction selection.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! regionflow = "0.1"  # Default: builtin regions + CSV I/O
//! ```
//!
//! ## Feature Flags
//!
//! - **`builtin-regions`** (default): sensor, spatial pooler, temporal memory and
//!   classifier regions, plus the [`prediction`] topology builder
//! - **`csv-io`** (default): CSV record source and prediction sink
//! - **`file-logging`**: JSON run-log files next to console output
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use regionflow::prelude::*;
//!
//! let config = load_config(None, None)?;
//! let layout = CsvLayout {
//!     timestamp_field: config.sensor.timestamp_field.clone(),
//!     metadata_rows: config.sensor.metadata_rows,
//!     ..CsvLayout::default()
//! };
//! let source = CsvRecordSource::open(&config.sensor.input_path, &layout)?;
//!
//! let mut network = regionflow::prediction::build_network(&config, source)?;
//! network.initialize()?;
//!
//! let mut sink = CsvPredictionSink::create(&config.output.path)?;
//! run_into_sink(
//!     &mut network,
//!     config.engine.record_count,
//!     regionflow::prediction::probe(),
//!     StdRng::seed_from_u64(config.engine.seed),
//!     &mut sink,
//! )?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: regionflow-config, regionflow-observability│
//! │  (TOML config, logging, debug flags)                    │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Core: regionflow-engine                                │
//! │  (Graph, scheduler, feedback buffers, selector)         │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Collaborators: regionflow-regions, regionflow-io       │
//! │  (Encoders, SP/TM/classifier, CSV source and sink)      │
//! └─────────────────────────────────────────────────────────┘
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export foundation
pub use regionflow_config as config;
pub use regionflow_observability as observability;

// Re-export core
pub use regionflow_engine as engine;

// Re-export collaborators
#[cfg(feature = "builtin-regions")]
pub use regionflow_regions as regions;

#[cfg(feature = "csv-io")]
pub use regionflow_io as io;

#[cfg(feature = "builtin-regions")]
pub mod prediction;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::engine::{
        run_for, run_into_sink, EngineError, EngineResult, LinkClass, Network,
        PredictionProbe, PredictionRecord, PredictionSelector, PredictionSink, RawRecord,
        RecordSource, Region, RegionConfig, RegionKind, RegionModes, Signal,
    };

    pub use crate::config::{load_config, RegionflowConfig};
    pub use crate::observability::{init_logging, CrateDebugFlags, LoggingConfig};

    #[cfg(feature = "builtin-regions")]
    pub use crate::regions::{BuiltinRegionFactory, VecRecordSource};

    #[cfg(feature = "csv-io")]
    pub use crate::io::{CsvLayout, CsvPredictionSink, CsvRecordSource};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let config = RegionflowConfig::default();
        assert_eq!(config.engine.seed, 1956);
        assert_eq!(RegionKind::SENSOR.to_string(), "Sensor");
    }
}
