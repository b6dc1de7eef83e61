// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Concatenation of per-field encoders into one record pattern.

use chrono::Timelike;
use ndarray::s;
use regionflow_engine::{RawRecord, Signal};

use super::{Encoder, EncoderError};

/// Where an encoder reads its scalar from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// A numeric field of the record
    Value(String),
    /// Hour of day (fractional) of the record timestamp
    TimeOfDay,
}

impl FieldSource {
    fn read(&self, record: &RawRecord) -> Result<f64, EncoderError> {
        match self {
            FieldSource::Value(field) => record
                .value(field)
                .ok_or_else(|| EncoderError::MissingField(field.clone())),
            FieldSource::TimeOfDay => {
                let time = record
                    .timestamp
                    .ok_or_else(|| EncoderError::MissingField("timestamp".into()))?;
                Ok(time.hour() as f64 + time.minute() as f64 / 60.0 + time.second() as f64 / 3600.0)
            }
        }
    }
}

/// Encoders laid side by side in insertion order
#[derive(Default)]
pub struct MultiEncoder {
    parts: Vec<(FieldSource, Box<dyn Encoder>)>,
    width: usize,
}

impl MultiEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: FieldSource, encoder: impl Encoder + 'static) -> Self {
        self.push(source, Box::new(encoder));
        self
    }

    pub fn push(&mut self, source: FieldSource, encoder: Box<dyn Encoder>) {
        self.width += encoder.width();
        self.parts.push((source, encoder));
    }

    /// Sum of all part widths
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn encode(&self, record: &RawRecord) -> Result<Signal, EncoderError> {
        let mut output = Signal::zeros(self.width);
        let mut offset = 0;
        for (source, encoder) in &self.parts {
            let value = source.read(record)?;
            let end = offset + encoder.width();
            encoder.encode_into(value, output.slice_mut(s![offset..end]))?;
            offset = end;
        }
        Ok(output)
    }
}

impl std::fmt::Debug for MultiEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiEncoder")
            .field(
                "sources",
                &self.parts.iter().map(|(source, _)| source).collect::<Vec<_>>(),
            )
            .field("width", &self.width)
            .finish()
    }
}
