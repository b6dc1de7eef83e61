// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! In-memory record source.

use std::collections::VecDeque;

use chrono::{Duration, NaiveDateTime};
use regionflow_engine::{RawRecord, RecordSource, SourceError};

/// Hands out a fixed list of records in order
#[derive(Debug, Clone, Default)]
pub struct VecRecordSource {
    records: VecDeque<RawRecord>,
    read: u64,
}

impl VecRecordSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records: records.into(),
            read: 0,
        }
    }

    /// One record per value, timestamps one hour apart from `start`
    pub fn hourly(field: &str, start: NaiveDateTime, values: impl IntoIterator<Item = f64>) -> Self {
        values
            .into_iter()
            .enumerate()
            .map(|(hour, value)| {
                RawRecord::new()
                    .with_value(field, value)
                    .with_timestamp(start + Duration::hours(hour as i64))
            })
            .collect()
    }

    /// Records not yet handed out
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl FromIterator<RawRecord> for VecRecordSource {
    fn from_iter<I: IntoIterator<Item = RawRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl RecordSource for VecRecordSource {
    fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
        let record = self.records.pop_front();
        if record.is_some() {
            self.read += 1;
        }
        Ok(record)
    }

    fn records_read(&self) -> u64 {
        self.read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_hourly_records() {
        let start = NaiveDate::from_ymd_opt(2010, 7, 2)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        let mut source = VecRecordSource::hourly("kw", start, [1.0, 2.0]);
        assert_eq!(source.remaining(), 2);

        let first = source.next_record().unwrap().unwrap();
        let second = source.next_record().unwrap().unwrap();
        assert_eq!(first.value("kw"), Some(1.0));
        assert_eq!(second.timestamp.unwrap().hour(), 0);
        assert!(source.next_record().unwrap().is_none());
        assert_eq!(source.records_read(), 2);
    }
}
