// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Scalar-to-SDR encoders used by the record sensor.

mod multi;
mod scalar;

pub use multi::{FieldSource, MultiEncoder};
pub use scalar::ScalarEncoder;

use ndarray::ArrayViewMut1;
use regionflow_engine::Signal;

/// Errors raised while building or applying an encoder
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncoderError {
    #[error("invalid encoder parameters: {0}")]
    InvalidParameters(String),

    #[error("value {value} outside [{min}, {max}] and clipping is off")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("value is not finite: {0}")]
    NotFinite(f64),

    #[error("record has no field '{0}'")]
    MissingField(String),

    #[error("output slice holds {actual} bits, encoder writes {expected}")]
    WidthMismatch { expected: usize, actual: usize },
}

/// Turns one scalar into a fixed-width binary pattern
pub trait Encoder {
    /// Total bits written
    fn width(&self) -> usize;

    /// Clear `output` and set the active bits for `value`
    fn encode_into(&self, value: f64, output: ArrayViewMut1<'_, f64>) -> Result<(), EncoderError>;

    fn encode(&self, value: f64) -> Result<Signal, EncoderError> {
        let mut output = Signal::zeros(self.width());
        self.encode_into(value, output.view_mut())?;
        Ok(output)
    }
}
