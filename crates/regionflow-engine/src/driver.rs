// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Driving loop: tick, read the classifier, select a prediction
//!
//! [`run_for`] is a lazy, finite iterator. It ticks only when the next item is pulled,
//! so dropping it early is the way to stop a run. After the first error it fuses.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::network::Network;
use crate::region::Signal;
use crate::selector::PredictionSelector;

/// Observed value and selected prediction for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(rename = "tick")]
    pub tick_index: u64,
    #[serde(rename = "observed")]
    pub observed_value: f64,
    #[serde(rename = "predicted")]
    pub predicted_value: f64,
}

/// Errors raised by a prediction sink
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode record: {0}")]
    Encode(String),
}

/// Receives one record per tick, in tick order
pub trait PredictionSink {
    fn append(&mut self, record: &PredictionRecord) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl PredictionSink for Vec<PredictionRecord> {
    fn append(&mut self, record: &PredictionRecord) -> Result<(), SinkError> {
        self.push(*record);
        Ok(())
    }
}

/// Where the driving loop reads the observed value and the classifier's distribution
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionProbe {
    pub sensor: String,
    pub observed_port: String,
    pub classifier: String,
    pub candidates_port: String,
    pub probabilities_port: String,
    pub selector: PredictionSelector,
}

impl PredictionProbe {
    /// Probe using the conventional port names (`sourceOut`, `actualValues`,
    /// `probabilities`)
    pub fn new(sensor: impl Into<String>, classifier: impl Into<String>) -> Self {
        Self {
            sensor: sensor.into(),
            observed_port: "sourceOut".to_string(),
            classifier: classifier.into(),
            candidates_port: "actualValues".to_string(),
            probabilities_port: "probabilities".to_string(),
            selector: PredictionSelector::default(),
        }
    }

    pub fn with_selector(mut self, selector: PredictionSelector) -> Self {
        self.selector = selector;
        self
    }

    fn read<R: Rng>(
        &self,
        network: &Network,
        tick_index: u64,
        rng: &mut R,
    ) -> EngineResult<PredictionRecord> {
        let observed = network.output(&self.sensor, &self.observed_port)?;
        let observed_value = first_value(observed, &self.sensor, &self.observed_port)?;

        let candidates = network
            .output(&self.classifier, &self.candidates_port)?
            .to_vec();
        let probabilities = network
            .output(&self.classifier, &self.probabilities_port)?
            .to_vec();
        let predicted_value = self.selector.select(&candidates, &probabilities, rng)?;

        Ok(PredictionRecord {
            tick_index,
            observed_value,
            predicted_value,
        })
    }
}

fn first_value(signal: &Signal, region: &str, port: &str) -> EngineResult<f64> {
    signal
        .get(0)
        .copied()
        .ok_or_else(|| EngineError::OutputUnavailable {
            region: region.to_string(),
            port: port.to_string(),
        })
}

/// Lazy iterator returned by [`run_for`]
pub struct PredictionRun<'a, R> {
    network: &'a mut Network,
    probe: PredictionProbe,
    rng: R,
    next_tick: u64,
    record_count: u64,
    fused: bool,
}

impl<R: Rng> PredictionRun<'_, R> {
    fn advance(&mut self) -> EngineResult<PredictionRecord> {
        self.network.tick()?;
        self.probe.read(self.network, self.next_tick, &mut self.rng)
    }
}

impl<R: Rng> Iterator for PredictionRun<'_, R> {
    type Item = EngineResult<PredictionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused || self.next_tick >= self.record_count {
            return None;
        }
        let result = self.advance();
        match &result {
            Ok(record) => {
                debug!(
                    "[DRIVER] tick {} observed {} predicted {}",
                    record.tick_index, record.observed_value, record.predicted_value
                );
                self.next_tick += 1;
            }
            Err(_) => self.fused = true,
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.fused {
            return (0, Some(0));
        }
        let remaining = usize::try_from(self.record_count - self.next_tick).ok();
        (0, remaining)
    }
}

/// Drive `record_count` ticks, yielding one prediction per tick
///
/// Nothing runs until the iterator is pulled; `record_count == 0` yields nothing and
/// never steps a region.
pub fn run_for<R: Rng>(
    network: &mut Network,
    record_count: u64,
    probe: PredictionProbe,
    rng: R,
) -> PredictionRun<'_, R> {
    PredictionRun {
        network,
        probe,
        rng,
        next_tick: 0,
        record_count,
        fused: false,
    }
}

/// Drive `record_count` ticks into `sink`, returning the number of records written
pub fn run_into_sink<R: Rng, S: PredictionSink + ?Sized>(
    network: &mut Network,
    record_count: u64,
    probe: PredictionProbe,
    rng: R,
    sink: &mut S,
) -> EngineResult<u64> {
    let mut written = 0;
    for record in run_for(network, record_count, probe, rng) {
        let record = record?;
        sink.append(&record).map_err(|source| EngineError::Sink {
            tick: record.tick_index,
            source,
        })?;
        written += 1;
    }
    sink.flush().map_err(|source| EngineError::Sink {
        tick: written,
        source,
    })?;
    info!("[DRIVER] Wrote {} prediction records", written);
    Ok(written)
}
