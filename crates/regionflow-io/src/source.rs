// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Streaming CSV record source.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use regionflow_engine::{RawRecord, RecordSource, SourceError};
use tracing::debug;

use crate::{IoError, IoResult};

/// Accepted timestamp formats, tried in order
const TIMESTAMP_FORMATS: &[&str] = &[
    "%m/%d/%y %H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp in any of the accepted formats
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// Column roles of an input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvLayout {
    pub timestamp_field: String,
    /// Rows after the header that describe types and flags, not data
    pub metadata_rows: usize,
    /// Column holding the sequence id, if any
    pub sequence_field: Option<String>,
    /// Column flagging the start of a sequence, if any
    pub reset_field: Option<String>,
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self {
            timestamp_field: "timestamp".to_string(),
            metadata_rows: 2,
            sequence_field: None,
            reset_field: None,
        }
    }
}

#[derive(Debug)]
enum Column {
    Timestamp,
    Sequence,
    Reset,
    Value(String),
}

/// Reads one [`RawRecord`] per data row
///
/// Every column other than the timestamp, sequence and reset columns is parsed as a
/// number; empty cells are left out of the record.
pub struct CsvRecordSource<R: Read = File> {
    reader: csv::Reader<R>,
    columns: Vec<Column>,
    row: csv::StringRecord,
    read: u64,
}

impl CsvRecordSource<File> {
    pub fn open(path: impl AsRef<Path>, layout: &CsvLayout) -> IoResult<Self> {
        let path = path.as_ref();
        debug!("[IO] Opening record source {}", path.display());
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)?;
        Self::with_reader(reader, layout)
    }
}

impl<R: Read> CsvRecordSource<R> {
    pub fn from_reader(reader: R, layout: &CsvLayout) -> IoResult<Self> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        Self::with_reader(reader, layout)
    }

    fn with_reader(mut reader: csv::Reader<R>, layout: &CsvLayout) -> IoResult<Self> {
        let header = reader.headers()?.clone();
        let columns: Vec<Column> = header
            .iter()
            .map(|name| {
                if name == layout.timestamp_field {
                    Column::Timestamp
                } else if layout.sequence_field.as_deref() == Some(name) {
                    Column::Sequence
                } else if layout.reset_field.as_deref() == Some(name) {
                    Column::Reset
                } else {
                    Column::Value(name.to_string())
                }
            })
            .collect();

        let required = std::iter::once(Some(&layout.timestamp_field))
            .chain([layout.sequence_field.as_ref(), layout.reset_field.as_ref()])
            .flatten();
        for column in required {
            if !header.iter().any(|name| name == column.as_str()) {
                return Err(IoError::MissingColumn {
                    column: column.clone(),
                    header: header.iter().collect::<Vec<_>>().join(", "),
                });
            }
        }

        let mut row = csv::StringRecord::new();
        for _ in 0..layout.metadata_rows {
            if !reader.read_record(&mut row)? {
                break;
            }
        }

        Ok(Self {
            reader,
            columns,
            row,
            read: 0,
        })
    }

    fn parse_row(&self, number: u64) -> Result<RawRecord, SourceError> {
        let malformed = |reason: String| SourceError::Malformed {
            record: number,
            reason,
        };
        let mut record = RawRecord::new();
        for (column, cell) in self.columns.iter().zip(self.row.iter()) {
            match column {
                Column::Timestamp => {
                    let timestamp = parse_timestamp(cell)
                        .ok_or_else(|| malformed(format!("unparseable timestamp '{}'", cell)))?;
                    record.timestamp = Some(timestamp);
                }
                Column::Sequence => {
                    record.sequence_id = cell
                        .parse()
                        .map_err(|_| malformed(format!("sequence id '{}' is not an integer", cell)))?;
                }
                Column::Reset => {
                    record.reset = matches!(cell, "1" | "true" | "True");
                }
                Column::Value(_) if cell.is_empty() => {}
                Column::Value(name) => {
                    let value: f64 = cell
                        .parse()
                        .map_err(|_| malformed(format!("{} = '{}' is not a number", name, cell)))?;
                    record.values.insert(name.clone(), value);
                }
            }
        }
        Ok(record)
    }
}

impl<R: Read> RecordSource for CsvRecordSource<R> {
    fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
        let has_row = self.reader.read_record(&mut self.row).map_err(|e| {
            match e.into_kind() {
                csv::ErrorKind::Io(io) => SourceError::Io(io),
                other => SourceError::Malformed {
                    record: self.read + 1,
                    reason: format!("{:?}", other),
                },
            }
        })?;
        if !has_row {
            return Ok(None);
        }
        self.read += 1;
        self.parse_row(self.read).map(Some)
    }

    fn records_read(&self) -> u64 {
        self.read
    }
}
