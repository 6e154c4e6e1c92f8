//! SCADA table exports (`Pressures.csv`, `Flows.csv`).
//!
//! Files are `;`-delimited with a `,` decimal separator. The first column is
//! `Timestamp` (day-first or ISO); every other column is one sensor or flow
//! source. Empty cells read as NaN.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use tracing::{debug, info};

use aquaguard_core::{parse_timestamp, SensorSeries};

use crate::error::{IngestError, Result};

pub(crate) const TIMESTAMP_COLUMN: &str = "Timestamp";

/// A time-indexed table of named numeric columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScadaTable {
    pub timestamps: Vec<NaiveDateTime>,
    pub columns: IndexMap<String, Vec<f64>>,
}

impl ScadaTable {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }
}

pub fn read_scada(path: &Path) -> Result<ScadaTable> {
    let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
    let table = parse_scada(file, &path.display().to_string())?;
    info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.columns.len(),
        "SCADA table loaded"
    );
    Ok(table)
}

/// Parse a SCADA export from any reader. `label` names the source in errors.
pub fn parse_scada<R: Read>(reader: R, label: &str) -> Result<ScadaTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let ts_col = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(TIMESTAMP_COLUMN))
        .ok_or_else(|| IngestError::MissingColumn {
            file: label.to_string(),
            column: TIMESTAMP_COLUMN.to_string(),
        })?;

    let names: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ts_col)
        .collect();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    let mut timestamps = Vec::new();

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = row + 2;
        let raw = record.get(ts_col).unwrap_or_default();
        let ts = parse_timestamp(raw).ok_or_else(|| IngestError::Timestamp {
            file: label.to_string(),
            line,
            raw: raw.to_string(),
        })?;
        timestamps.push(ts);

        for (column, (i, name)) in values.iter_mut().zip(&names) {
            let cell = record.get(*i).unwrap_or_default();
            let value = parse_decimal(cell).ok_or_else(|| {
                IngestError::parse(label, line, format!("column {name}: not a number: {cell:?}"))
            })?;
            column.push(value);
        }
    }

    Ok(ScadaTable {
        timestamps,
        columns: names
            .into_iter()
            .map(|(_, name)| name.clone())
            .zip(values)
            .collect(),
    })
}

/// Parse a decimal that may use `,` as separator. Empty means NaN.
pub(crate) fn parse_decimal(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(f64::NAN);
    }
    raw.replace(',', ".").parse().ok()
}

/// Join pressure and flow tables into a [`SensorSeries`].
///
/// Both tables must share the time index. Only the `flow_source` column of
/// the flow table is kept.
pub fn load_series(
    pressures: &ScadaTable,
    flows: &ScadaTable,
    flow_source: &str,
) -> Result<SensorSeries> {
    if pressures.timestamps != flows.timestamps {
        let first_diff = pressures
            .timestamps
            .iter()
            .zip(&flows.timestamps)
            .position(|(a, b)| a != b);
        return Err(IngestError::IndexMismatch(match first_diff {
            Some(row) => format!(
                "pressure row {row} is {}, flow row is {}",
                pressures.timestamps[row], flows.timestamps[row]
            ),
            None => format!(
                "{} pressure rows, {} flow rows",
                pressures.len(),
                flows.len()
            ),
        }));
    }
    let flow = flows
        .columns
        .get(flow_source)
        .ok_or_else(|| IngestError::MissingColumn {
            file: "flows".to_string(),
            column: flow_source.to_string(),
        })?;
    debug!(
        flow_source,
        available = ?flows.column_names(),
        "Flow source selected"
    );

    Ok(SensorSeries::new(
        pressures.timestamps.clone(),
        pressures.columns.keys().cloned().collect(),
        pressures.columns.values().cloned().collect(),
        flow_source,
        flow.clone(),
    )?)
}
