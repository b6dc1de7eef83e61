// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! # regionflow-io
//!
//! CSV collaborators for the driving loop:
//! - [`CsvRecordSource`] reads hot-gym style input (header row, metadata rows, data rows)
//! - [`CsvPredictionSink`] writes one `tick,observed,predicted` row per tick

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod sink;
pub mod source;

pub use sink::CsvPredictionSink;
pub use source::{parse_timestamp, CsvLayout, CsvRecordSource};

/// Errors raised while opening CSV files
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("column '{column}' not found in header [{header}]")]
    MissingColumn { column: String, header: String },
}

pub type IoResult<T> = Result<T, IoError>;
