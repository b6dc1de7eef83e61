// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! CSV prediction sink.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use regionflow_engine::{PredictionRecord, PredictionSink, SinkError};
use tracing::debug;

use crate::{IoError, IoResult};

/// Writes `tick,observed,predicted` rows under a header line
pub struct CsvPredictionSink<W: Write = File> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl CsvPredictionSink<File> {
    /// Create (or truncate) the output file
    pub fn create(path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref();
        debug!("[IO] Writing predictions to {}", path.display());
        Ok(Self::from_writer_inner(csv::Writer::from_path(path)?))
    }
}

impl<W: Write> CsvPredictionSink<W> {
    pub fn from_writer(writer: W) -> Self {
        Self::from_writer_inner(csv::Writer::from_writer(writer))
    }

    fn from_writer_inner(writer: csv::Writer<W>) -> Self {
        Self { writer, rows: 0 }
    }

    /// Data rows written so far
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> IoResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| IoError::Io(e.into_error()))
    }
}

fn sink_error(error: csv::Error) -> SinkError {
    match error.into_kind() {
        csv::ErrorKind::Io(io) => SinkError::Io(io),
        other => SinkError::Encode(format!("{:?}", other)),
    }
}

impl<W: Write> PredictionSink for CsvPredictionSink<W> {
    fn append(&mut self, record: &PredictionRecord) -> Result<(), SinkError> {
        self.writer.serialize(record).map_err(sink_error)?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_rows() {
        let mut sink = CsvPredictionSink::from_writer(Vec::new());
        for (tick, observed, predicted) in [(0, 21.2, 0.0), (1, 16.4, 21.2)] {
            sink.append(&PredictionRecord {
                tick_index: tick,
                observed_value: observed,
                predicted_value: predicted,
            })
            .unwrap();
        }
        sink.flush().unwrap();
        assert_eq!(sink.rows(), 2);

        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(text, "tick,observed,predicted\n0,21.2,0.0\n1,16.4,21.2\n");
    }
}
