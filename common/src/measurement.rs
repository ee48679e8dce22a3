use std::{
    collections::BTreeMap,
    fs::{File, read_dir},
    io::Read,
    path::Path,
};

use csv::{ReaderBuilder, StringRecord, Trim};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    run::RunId,
    table::{DATA_EXTENSION, RUN_FILE},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub timestamp: f64,
    pub value: f64,
    pub run_id: RunId,
}

/// Measurement type (file stem, ie. `CACHETHROUGHPUT`) -> rows of every run
pub type MeasurementTable = BTreeMap<String, Vec<MeasurementRow>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub value: f64,
}

/// One `(timestamp, name, value)` file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    /// Second column of the first row
    pub name: Option<String>,
    pub samples: Vec<Sample>,
}

/// Begin or end marker of an eviction thread interval
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub timestamp: f64,
    pub id: String,
}

fn headerless<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
}

/// `nan` and `inf` parse as f64 but count as non-numeric
fn field_f64(record: &StringRecord, idx: usize) -> Option<f64> {
    record
        .get(idx)
        .and_then(|x| x.parse::<f64>().ok())
        .filter(|x| x.is_finite())
}

fn is_snapshot_file(path: &Path) -> bool {
    path.file_name().and_then(|x| x.to_str()) == Some(RUN_FILE)
        || path.extension().and_then(|x| x.to_str()) == Some(DATA_EXTENSION)
}

/// Parses rows, skipping any row without a numeric timestamp and value
pub fn parse_series<R: Read>(reader: R, source: &str) -> Series {
    let mut series = Series::default();
    for (line, record) in headerless(reader).records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("Skipping row {line} in {source}: {err}");
                continue;
            }
        };
        if series.name.is_none() && line == 0 {
            series.name = record.get(1).map(|x| x.to_owned());
        }
        match (field_f64(&record, 0), field_f64(&record, 2)) {
            (Some(timestamp), Some(value)) => series.samples.push(Sample { timestamp, value }),
            _ => warn!("Skipping row {line} in {source}: {record:?}"),
        }
    }
    series
}

pub fn read_series(path: &Path) -> Result<Series> {
    let file = File::open(path).context(format!("Open {}", path.display()))?;
    Ok(parse_series(file, &path.display().to_string()))
}

/// Appends every measurement file of a run directory to `table`
pub fn load_run(dir: &Path, run_id: RunId, table: &mut MeasurementTable) -> Result<()> {
    let mut files = Vec::new();
    for entry in read_dir(dir).context(format!("Read run dir {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && !is_snapshot_file(&path) {
            files.push(path);
        }
    }

    for path in files {
        let Some(measurement) = path.file_stem().and_then(|x| x.to_str()) else {
            warn!("Skipping non UTF-8 file {}", path.display());
            continue;
        };
        let series = read_series(&path)?;
        let rows = table.entry(measurement.to_owned()).or_default();
        rows.extend(series.samples.into_iter().map(|s| MeasurementRow {
            timestamp: s.timestamp,
            value: s.value,
            run_id,
        }));
        debug!("data {measurement} parsed for run {run_id}");
    }
    Ok(())
}

/// First column of a CSV with a header row
pub fn read_first_column(path: &Path) -> Result<Vec<f64>> {
    let file = File::open(path).context(format!("Open {}", path.display()))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let mut values = Vec::new();
    for (line, record) in reader.records().enumerate() {
        match record.ok().as_ref().and_then(|r| field_f64(r, 0)) {
            Some(value) => values.push(value),
            None => warn!("Skipping row {} in {}", line + 1, path.display()),
        }
    }
    Ok(values)
}

/// `(timestamp, name, id)` rows of an eviction thread marker file
pub fn read_events(path: &Path) -> Result<Vec<Event>> {
    let file = File::open(path).context(format!("Open {}", path.display()))?;
    let mut events = Vec::new();
    for (line, record) in headerless(file).records().enumerate() {
        let parsed = record.ok().and_then(|r| {
            Some(Event {
                timestamp: field_f64(&r, 0)?,
                id: r.get(2)?.to_owned(),
            })
        });
        match parsed {
            Some(event) => events.push(event),
            None => warn!("Skipping row {line} in {}", path.display()),
        }
    }
    Ok(events)
}
