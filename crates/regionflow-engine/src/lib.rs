// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! # Regionflow Engine
//!
//! Builds a directed, possibly-cyclic graph of regions and runs it one tick at a time:
//! - Region and link declaration with port-width checks
//! - Deferred width resolution at `initialize()`
//! - Deterministic execution order over the feed-forward subgraph
//! - One-tick-delayed feedback links
//! - Seeded near-maximum prediction selection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use regionflow_engine::{run_for, LinkClass, Network, PredictionProbe, RegionKind};
//!
//! let mut network = Network::with_factory(factory);
//! network.add_region("sensor", RegionKind::SENSOR, &sensor_config)?;
//! network.add_region("sp", RegionKind::SPATIAL_POOLER, &sp_config)?;
//! network.link("sensor", "dataOut", "sp", "bottomUpIn", LinkClass::FeedForward)?;
//! network.link("sp", "spatialTopDownOut", "sensor", "spatialTopDownIn", LinkClass::Feedback)?;
//! network.initialize()?;
//!
//! for record in run_for(&mut network, 100, PredictionProbe::new("sensor", "classifier"), rng) {
//!     println!("{:?}", record?);
//! }
//! ```
//!
//! The engine is single-threaded: every operation takes `&mut self` and one region
//! steps at a time.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod driver;
pub mod error;
pub mod feedback;
pub mod graph;
pub mod link;
pub mod network;
pub mod record;
pub mod region;
pub mod region_config;
pub mod scheduler;
pub mod selector;

pub use driver::{
    run_for, run_into_sink, PredictionProbe, PredictionRecord, PredictionRun, PredictionSink,
    SinkError,
};
pub use error::{EngineError, EngineResult};
pub use feedback::FeedbackBuffer;
pub use graph::{Graph, RegionHandle};
pub use link::{Endpoint, Link, LinkClass};
pub use network::{Network, INFERENCE_MODE, LEARNING_MODE};
pub use record::{RawRecord, RecordSource, SourceError};
pub use region::{
    require_input, ConfigError, PortDirection, PortLayout, PortValues, Region, RegionFactory,
    RegionKind, RegionModes, Signal, StepError,
};
pub use region_config::RegionConfig;
pub use scheduler::Scheduler;
pub use selector::{PredictionSelector, TIE_EPSILON};
