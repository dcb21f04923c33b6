//! ContributionTable: the scorer's CSV output.
//!
//! One row per anomaly. The `ts` column carries the timestamp and every
//! `contribution_<sensor>` column carries one sensor's contribution score.
//! Other columns are kept untouched so the classified export can echo them.

use crate::error::{RuntimeError, RuntimeResult};
use anomtree_core::record::RecordBuilder;
use std::io::Read;
use std::path::Path;

pub const TIMESTAMP_COLUMN: &str = "ts";
pub const CONTRIBUTION_PREFIX: &str = "contribution_";

/// One row ready for the orchestrator.
///
/// Scores stay as raw cells until [`values`](Self::values) is called, so a
/// malformed cell fails only its own row.
#[derive(Debug, Clone, PartialEq)]
pub struct ContributionRow {
    /// Zero-based data row index.
    pub index: usize,
    pub timestamp: String,
    /// Raw score cells in sensor order.
    pub cells: Vec<String>,
}

impl ContributionRow {
    pub fn new(index: usize, timestamp: impl Into<String>, values: &[f64]) -> Self {
        Self {
            index,
            timestamp: timestamp.into(),
            cells: values.iter().map(f64::to_string).collect(),
        }
    }

    /// Parsed scores. Blank cells count as `0.0`.
    pub fn values(&self) -> RuntimeResult<Vec<f64>> {
        self.cells
            .iter()
            .enumerate()
            .map(|(pos, cell)| {
                let cell = cell.trim();
                if cell.is_empty() {
                    return Ok(0.0);
                }
                cell.parse::<f64>().map_err(|_| {
                    RuntimeError::InvalidTable(format!(
                        "row {}: score {} is not a number: {cell:?}",
                        self.index,
                        pos + 1
                    ))
                })
            })
            .collect()
    }
}

/// A parsed contribution CSV.
#[derive(Debug, Clone)]
pub struct ContributionTable {
    headers: csv::StringRecord,
    records: Vec<csv::StringRecord>,
    ts_column: usize,
    /// `(column index, sensor name)` pairs in column order.
    sensor_columns: Vec<(usize, String)>,
}

impl ContributionTable {
    pub fn from_path(path: &Path) -> RuntimeResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| RuntimeError::io(path, e))?;
        Self::read(file).map_err(|e| match e {
            RuntimeError::Csv { source, .. } => RuntimeError::csv(path, source),
            other => other,
        })
    }

    pub fn from_reader<R: Read>(reader: R) -> RuntimeResult<Self> {
        Self::read(reader)
    }

    fn read<R: Read>(reader: R) -> RuntimeResult<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| RuntimeError::csv("<input>", e))?
            .clone();

        let ts_column = headers
            .iter()
            .position(|h| h.trim() == TIMESTAMP_COLUMN)
            .ok_or_else(|| RuntimeError::InvalidTable(format!("missing '{TIMESTAMP_COLUMN}' column")))?;

        let sensor_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| {
                h.trim()
                    .strip_prefix(CONTRIBUTION_PREFIX)
                    .map(|sensor| (i, sensor.to_string()))
            })
            .collect();
        if sensor_columns.is_empty() {
            return Err(RuntimeError::InvalidTable(format!(
                "no '{CONTRIBUTION_PREFIX}*' columns"
            )));
        }

        let records = rdr
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RuntimeError::csv("<input>", e))?;

        Ok(Self {
            headers,
            records,
            ts_column,
            sensor_columns,
        })
    }

    pub fn headers(&self) -> &csv::StringRecord {
        &self.headers
    }

    pub fn sensors(&self) -> Vec<&str> {
        self.sensor_columns.iter().map(|(_, s)| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw cells of a data row.
    pub fn raw_row(&self, index: usize) -> Option<&csv::StringRecord> {
        self.records.get(index)
    }

    /// A record builder for this table's sensor layout.
    pub fn record_builder(&self) -> RecordBuilder {
        RecordBuilder::new(self.sensors().as_slice())
    }

    /// Every data row, in file order.
    pub fn rows(&self) -> Vec<ContributionRow> {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| ContributionRow {
                index,
                timestamp: record.get(self.ts_column).unwrap_or("").trim().to_string(),
                cells: self
                    .sensor_columns
                    .iter()
                    .map(|(col, _)| record.get(*col).unwrap_or("").to_string())
                    .collect(),
            })
            .collect()
    }
}
