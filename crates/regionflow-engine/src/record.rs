// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Input records and the data-source collaborator interface.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

/// One row of the input stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub timestamp: Option<NaiveDateTime>,
    /// Numeric fields by name
    pub values: BTreeMap<String, f64>,
    /// Start of a new sequence
    pub reset: bool,
    pub sequence_id: u64,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

/// Errors raised by a record source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("record source exhausted after {records_read} records")]
    Exhausted { records_read: u64 },

    #[error("record {record} is malformed: {reason}")]
    Malformed { record: u64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pull-based stream of records consumed by a sensor region
///
/// `Ok(None)` means the stream ended; a sensor that still has ticks to serve turns it
/// into [`SourceError::Exhausted`].
pub trait RecordSource {
    fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError>;

    /// Records handed out so far
    fn records_read(&self) -> u64;
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
        (**self).next_record()
    }

    fn records_read(&self) -> u64 {
        (**self).records_read()
    }
}
