// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Record sensor: pulls one record per tick and encodes it.

use ahash::AHashMap;
use regionflow_engine::{
    ConfigError, PortLayout, PortValues, RecordSource, Region, RegionConfig, RegionKind,
    RegionModes, Signal, SourceError, StepError,
};
use tracing::trace;

use crate::encoders::{FieldSource, MultiEncoder, ScalarEncoder};
use crate::params::warn_unknown_keys;

pub const DATA_OUT: &str = "dataOut";
pub const RESET_OUT: &str = "resetOut";
pub const SOURCE_OUT: &str = "sourceOut";
pub const SEQUENCE_ID_OUT: &str = "sequenceIdOut";
pub const SPATIAL_TOP_DOWN_IN: &str = "spatialTopDownIn";
pub const TEMPORAL_TOP_DOWN_IN: &str = "temporalTopDownIn";

const TOP_DOWN_INPUTS: [&str; 2] = [SPATIAL_TOP_DOWN_IN, TEMPORAL_TOP_DOWN_IN];

const KNOWN_KEYS: &[&str] = &[
    "valueField",
    "valueW",
    "valueMinimum",
    "valueMaximum",
    "valueN",
    "clipInput",
    "timeOfDayW",
    "timeOfDayRadius",
];

/// Sensor region over a [`RecordSource`]
///
/// `dataOut` carries the value encoding followed by the time-of-day encoding.
/// `resetOut` is 1 when the record starts a new sequence, either flagged by the source or
/// because its sequence id changed. Top-down inputs are kept for inspection only.
pub struct RecordSensor {
    source: Box<dyn RecordSource>,
    value_field: String,
    encoder: MultiEncoder,
    top_down_widths: AHashMap<String, usize>,
    top_down: AHashMap<String, Signal>,
    last_sequence_id: Option<u64>,
}

impl RecordSensor {
    pub fn new(source: Box<dyn RecordSource>, config: &RegionConfig) -> Result<Self, ConfigError> {
        let mut sensor = Self {
            source,
            value_field: String::new(),
            encoder: MultiEncoder::new(),
            top_down_widths: AHashMap::new(),
            top_down: AHashMap::new(),
            last_sequence_id: None,
        };
        sensor.configure(config)?;
        Ok(sensor)
    }

    pub fn value_field(&self) -> &str {
        &self.value_field
    }

    pub fn encoder(&self) -> &MultiEncoder {
        &self.encoder
    }

    pub fn records_read(&self) -> u64 {
        self.source.records_read()
    }

    /// Last value seen on a top-down input
    pub fn top_down(&self, port: &str) -> Option<&Signal> {
        self.top_down.get(port)
    }

    fn build_encoder(config: &RegionConfig, value_field: &str) -> Result<MultiEncoder, ConfigError> {
        let value = ScalarEncoder::new(
            config.usize_or("valueW", 21)?,
            config.f64_or("valueMinimum", 0.0)?,
            config.f64_or("valueMaximum", 100.0)?,
            config.usize_or("valueN", 50)?,
            config.bool_or("clipInput", true)?,
        )
        .map_err(|e| ConfigError::InvalidValue {
            key: "valueW".into(),
            reason: e.to_string(),
        })?;
        let time_of_day = ScalarEncoder::time_of_day(
            config.usize_or("timeOfDayW", 21)?,
            config.f64_or("timeOfDayRadius", 9.5)?,
        )
        .map_err(|e| ConfigError::InvalidValue {
            key: "timeOfDayRadius".into(),
            reason: e.to_string(),
        })?;

        Ok(MultiEncoder::new()
            .with(FieldSource::Value(value_field.to_string()), value)
            .with(FieldSource::TimeOfDay, time_of_day))
    }
}

impl Region for RecordSensor {
    fn kind(&self) -> RegionKind {
        RegionKind::SENSOR
    }

    fn ports(&self) -> PortLayout {
        PortLayout::new()
            .input(SPATIAL_TOP_DOWN_IN)
            .input(TEMPORAL_TOP_DOWN_IN)
            .output(DATA_OUT)
            .output(RESET_OUT)
            .output(SOURCE_OUT)
            .output(SEQUENCE_ID_OUT)
    }

    fn configure(&mut self, config: &RegionConfig) -> Result<(), ConfigError> {
        warn_unknown_keys(&self.kind(), config, KNOWN_KEYS);
        let value_field = config
            .get_str("valueField")?
            .unwrap_or("value")
            .to_string();
        self.encoder = Self::build_encoder(config, &value_field)?;
        self.value_field = value_field;
        Ok(())
    }

    fn input_width(&self, port: &str) -> Option<usize> {
        self.top_down_widths.get(port).copied()
    }

    fn output_width(&self, port: &str) -> Option<usize> {
        match port {
            DATA_OUT => Some(self.encoder.width()),
            RESET_OUT | SOURCE_OUT | SEQUENCE_ID_OUT => Some(1),
            _ => None,
        }
    }

    fn resolve_input_width(&mut self, port: &str, width: usize) -> Result<(), ConfigError> {
        if !TOP_DOWN_INPUTS.contains(&port) {
            return Err(ConfigError::InvalidValue {
                key: port.to_string(),
                reason: "not an input of the sensor".into(),
            });
        }
        self.top_down_widths.insert(port.to_string(), width);
        Ok(())
    }

    fn step(&mut self, inputs: &PortValues, _modes: RegionModes) -> Result<PortValues, StepError> {
        for port in TOP_DOWN_INPUTS {
            if let Some(signal) = inputs.get(port) {
                self.top_down.insert(port.to_string(), signal.clone());
            }
        }

        let record = self
            .source
            .next_record()?
            .ok_or_else(|| SourceError::Exhausted {
                records_read: self.source.records_read(),
            })?;
        let record_number = self.source.records_read();

        let value = record.value(&self.value_field).ok_or_else(|| {
            StepError::Failed(format!(
                "record {} has no field '{}'",
                record_number, self.value_field
            ))
        })?;
        let data = self
            .encoder
            .encode(&record)
            .map_err(|e| StepError::Failed(format!("record {}: {}", record_number, e)))?;

        let new_sequence = self
            .last_sequence_id
            .is_some_and(|last| last != record.sequence_id);
        let reset = record.reset || new_sequence;
        self.last_sequence_id = Some(record.sequence_id);
        trace!(
            "[SENSOR] record {} value {} reset {}",
            record_number,
            value,
            reset
        );

        let mut outputs = PortValues::new();
        outputs.insert(DATA_OUT.into(), data);
        outputs.insert(RESET_OUT.into(), Signal::from_elem(1, if reset { 1.0 } else { 0.0 }));
        outputs.insert(SOURCE_OUT.into(), Signal::from_elem(1, value));
        outputs.insert(
            SEQUENCE_ID_OUT.into(),
            Signal::from_elem(1, record.sequence_id as f64),
        );
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VecRecordSource;
    use chrono::NaiveDate;
    use regionflow_engine::RawRecord;

    fn start() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2010, 7, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sensor(values: &[f64]) -> RecordSensor {
        let source = VecRecordSource::hourly("kw", start(), values.iter().copied());
        RecordSensor::new(
            Box::new(source),
            &RegionConfig::new().with("valueField", "kw"),
        )
        .unwrap()
    }

    #[test]
    fn test_output_widths() {
        let sensor = sensor(&[]);
        assert_eq!(sensor.output_width(DATA_OUT), Some(104));
        assert_eq!(sensor.output_width(SOURCE_OUT), Some(1));
        assert_eq!(sensor.input_width(SPATIAL_TOP_DOWN_IN), None);
    }

    #[test]
    fn test_step_emits_record() {
        let mut sensor = sensor(&[21.2, 16.4]);
        let outputs = sensor.step(&PortValues::new(), RegionModes::default()).unwrap();
        assert_eq!(outputs[SOURCE_OUT][0], 21.2);
        assert_eq!(outputs[RESET_OUT][0], 0.0);
        assert_eq!(outputs[DATA_OUT].sum(), 42.0);
        assert_eq!(sensor.records_read(), 1);
    }

    #[test]
    fn test_exhausted_source_fails_step() {
        let mut sensor = sensor(&[1.0]);
        sensor.step(&PortValues::new(), RegionModes::default()).unwrap();
        let err = sensor
            .step(&PortValues::new(), RegionModes::default())
            .unwrap_err();
        assert!(matches!(
            err,
            StepError::Source(SourceError::Exhausted { records_read: 1 })
        ));
    }

    #[test]
    fn test_sequence_change_raises_reset() {
        let mut second = RawRecord::new()
            .with_value("kw", 2.0)
            .with_timestamp(start());
        second.sequence_id = 7;
        let source = VecRecordSource::new(vec![
            RawRecord::new().with_value("kw", 1.0).with_timestamp(start()),
            second,
        ]);
        let mut sensor = RecordSensor::new(
            Box::new(source),
            &RegionConfig::new().with("valueField", "kw"),
        )
        .unwrap();

        let first = sensor.step(&PortValues::new(), RegionModes::default()).unwrap();
        let second = sensor.step(&PortValues::new(), RegionModes::default()).unwrap();
        assert_eq!(first[RESET_OUT][0], 0.0);
        assert_eq!(second[RESET_OUT][0], 1.0);
        assert_eq!(second[SEQUENCE_ID_OUT][0], 7.0);
    }

    #[test]
    fn test_invalid_encoder_config() {
        let source = VecRecordSource::default();
        let result = RecordSensor::new(
            Box::new(source),
            &RegionConfig::new().with("valueN", 10),
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
