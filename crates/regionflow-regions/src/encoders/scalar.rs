// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Contiguous-block scalar encoder, bounded or periodic.

use ndarray::ArrayViewMut1;

use super::{Encoder, EncoderError};

/// Hours in the time-of-day period
const HOURS_PER_DAY: f64 = 24.0;

/// Encodes a value as `w` consecutive active bits out of `n`
///
/// Bounded encoders slide the block from bit 0 (at `min`) to bit `n - w` (at `max`).
/// Periodic encoders wrap the block around, so `min` and `max` encode identically.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarEncoder {
    w: usize,
    n: usize,
    min: f64,
    max: f64,
    periodic: bool,
    clip_input: bool,
}

impl ScalarEncoder {
    /// Bounded encoder over `[min, max]`
    pub fn new(w: usize, min: f64, max: f64, n: usize, clip_input: bool) -> Result<Self, EncoderError> {
        Self::check_geometry(w, min, max, n)?;
        Ok(Self {
            w,
            n,
            min,
            max,
            periodic: false,
            clip_input,
        })
    }

    /// Periodic encoder over `[min, max)` where `radius` is the span one block covers
    ///
    /// `n = ceil(w * (max - min) / radius)`.
    pub fn periodic(w: usize, min: f64, max: f64, radius: f64) -> Result<Self, EncoderError> {
        if !(radius > 0.0) {
            return Err(EncoderError::InvalidParameters(format!(
                "radius must be positive, got {}",
                radius
            )));
        }
        let n = (w as f64 * (max - min) / radius).ceil() as usize;
        Self::check_geometry(w, min, max, n)?;
        Ok(Self {
            w,
            n,
            min,
            max,
            periodic: true,
            clip_input: false,
        })
    }

    /// Periodic encoder over the hours of a day
    pub fn time_of_day(w: usize, radius: f64) -> Result<Self, EncoderError> {
        Self::periodic(w, 0.0, HOURS_PER_DAY, radius)
    }

    fn check_geometry(w: usize, min: f64, max: f64, n: usize) -> Result<(), EncoderError> {
        if w == 0 {
            return Err(EncoderError::InvalidParameters("w must be positive".into()));
        }
        if !(min < max) {
            return Err(EncoderError::InvalidParameters(format!(
                "min {} must be below max {}",
                min, max
            )));
        }
        if n < w {
            return Err(EncoderError::InvalidParameters(format!(
                "n = {} is smaller than w = {}",
                n, w
            )));
        }
        Ok(())
    }

    pub fn active_bits(&self) -> usize {
        self.w
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// First active bit; periodic blocks may wrap past `n`
    fn first_bit(&self, value: f64) -> Result<usize, EncoderError> {
        if !value.is_finite() {
            return Err(EncoderError::NotFinite(value));
        }
        let range = self.max - self.min;

        if self.periodic {
            let offset = (value - self.min).rem_euclid(range);
            let bit = (offset / range * self.n as f64).floor() as usize;
            return Ok(bit.min(self.n - 1));
        }

        let value = if value < self.min || value > self.max {
            if !self.clip_input {
                return Err(EncoderError::OutOfRange {
                    value,
                    min: self.min,
                    max: self.max,
                });
            }
            value.clamp(self.min, self.max)
        } else {
            value
        };
        let fraction = (value - self.min) / range;
        Ok((fraction * (self.n - self.w) as f64).round() as usize)
    }
}

impl Encoder for ScalarEncoder {
    fn width(&self) -> usize {
        self.n
    }

    fn encode_into(&self, value: f64, mut output: ArrayViewMut1<'_, f64>) -> Result<(), EncoderError> {
        if output.len() != self.n {
            return Err(EncoderError::WidthMismatch {
                expected: self.n,
                actual: output.len(),
            });
        }
        let first = self.first_bit(value)?;
        output.fill(0.0);
        for offset in 0..self.w {
            output[(first + offset) % self.n] = 1.0;
        }
        Ok(())
    }
}
