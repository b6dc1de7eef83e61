// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! # regionflow-regions
//!
//! Reference regions for the prediction network: a record sensor with scalar and
//! time-of-day encoders, a spatial pooler, a temporal memory and an SDR classifier,
//! plus [`BuiltinRegionFactory`] to create them by kind tag.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod classifier;
pub mod encoders;
pub mod factory;
mod params;
pub mod sensor;
pub mod source;
pub mod spatial_pooler;
pub mod temporal_memory;

pub use classifier::{ClassifierParams, SdrClassifierRegion};
pub use encoders::{Encoder, EncoderError, FieldSource, MultiEncoder, ScalarEncoder};
pub use factory::{BuiltinKind, BuiltinRegionFactory};
pub use sensor::RecordSensor;
pub use source::VecRecordSource;
pub use spatial_pooler::{SpatialPoolerParams, SpatialPoolerRegion};
pub use temporal_memory::{TemporalMemoryParams, TemporalMemoryRegion};
