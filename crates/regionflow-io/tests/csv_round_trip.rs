// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! File-backed tests for the CSV source and sink

use std::fs;

use regionflow_engine::{PredictionRecord, PredictionSink, RecordSource};
use regionflow_io::{CsvLayout, CsvPredictionSink, CsvRecordSource, IoError};
use tempfile::tempdir;

#[test]
fn test_source_reads_file_with_metadata_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rec-center-hourly.csv");
    fs::write(
        &path,
        "timestamp,kw_energy_consumption\ndatetime,float\nT,\n7/2/10 0:00,21.2\n7/2/10 1:00,16.4\n7/2/10 2:00,4.7\n",
    )
    .unwrap();

    let mut source = CsvRecordSource::open(&path, &CsvLayout::default()).unwrap();
    let mut values = Vec::new();
    while let Some(record) = source.next_record().unwrap() {
        values.push(record.value("kw_energy_consumption").unwrap());
    }
    assert_eq!(values, vec![21.2, 16.4, 4.7]);
    assert_eq!(source.records_read(), 3);
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let result = CsvRecordSource::open(dir.path().join("absent.csv"), &CsvLayout::default());
    assert!(matches!(result, Err(IoError::Csv(_))));
}

#[test]
fn test_sink_file_parses_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("network-demo-prediction-output.csv");

    let records: Vec<PredictionRecord> = (0..5)
        .map(|tick| PredictionRecord {
            tick_index: tick,
            observed_value: tick as f64 * 1.5,
            predicted_value: 3.0,
        })
        .collect();
    {
        let mut sink = CsvPredictionSink::create(&path).unwrap();
        for record in &records {
            sink.append(record).unwrap();
        }
        sink.flush().unwrap();
    }

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let parsed: Vec<PredictionRecord> = reader.deserialize().map(|row| row.unwrap()).collect();
    assert_eq!(parsed, records);
}
