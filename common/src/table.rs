use std::{
    fs::{File, read_dir, remove_file},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use eyre::{Context, ContextCompat, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use crate::{
    decode::decode_compact,
    error::EvalError,
    measurement::{MeasurementRow, MeasurementTable, load_run},
    run::{ConfigKey, DeviceType, RunId, RunRecord},
};

/// Snapshot of the run table
pub const RUN_FILE: &str = "run_file";
/// Extension of the per measurement type snapshots, ie. `GETLATENCY.data`
pub const DATA_EXTENSION: &str = "data";

/// Runs indexed by their id. Ids are dense and start at 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunTable {
    runs: Vec<RunRecord>,
}

impl RunTable {
    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    pub fn get(&self, id: RunId) -> Option<&RunRecord> {
        self.runs.get(id)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Next id to be handed out
    pub fn next_id(&self) -> RunId {
        self.runs.len()
    }

    /// Adds the record built for the next id. Nothing is consumed on error.
    pub fn insert_with<F>(&mut self, build: F) -> Result<RunId, EvalError>
    where
        F: FnOnce(RunId) -> Result<RunRecord, EvalError>,
    {
        let id = self.next_id();
        let record = build(id)?;
        debug_assert_eq!(record.run_id, id);
        self.runs.push(record);
        Ok(id)
    }

    /// Ids of every run with this configuration on `device`
    pub fn matching(&self, key: &ConfigKey, device: DeviceType) -> Vec<RunId> {
        self.runs
            .iter()
            .filter(|run| run.device_type == device && run.config_key() == *key)
            .map(|run| run.run_id)
            .collect()
    }

    fn check_ids(&self) -> Result<(), EvalError> {
        for (idx, run) in self.runs.iter().enumerate() {
            if run.run_id != idx {
                return Err(EvalError::SnapshotInconsistent(format!(
                    "run at position {idx} has id {}",
                    run.run_id
                )));
            }
        }
        Ok(())
    }
}

/// Run metadata together with every measurement of those runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub runs: RunTable,
    pub measurements: MeasurementTable,
}

impl Dataset {
    /// Fresh parse (`reparse`) or restore from the snapshot in `dir`
    pub fn load(dir: &Path, reparse: bool) -> Result<Self> {
        if !dir.is_dir() {
            return Err(EvalError::DirectoryNotFound(dir.display().to_string()).into());
        }
        if reparse {
            let dataset = Self::parse_dir(dir)?;
            dataset.write_snapshot(dir)?;
            Ok(dataset)
        } else {
            Self::restore(dir)
        }
    }

    /// Decodes every run directory in `dir` and loads its measurement files.
    /// Runs whose name cannot be decoded are skipped.
    pub fn parse_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(EvalError::DirectoryNotFound(dir.display().to_string()).into());
        }

        let mut dataset = Dataset::default();
        for entry in read_dir(dir).context(format!("Read {}", dir.display()))? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|x| x.to_str()) else {
                warn!("Skipping non UTF-8 run dir {}", path.display());
                continue;
            };

            let id = match dataset
                .runs
                .insert_with(|id| decode_compact(name, id))
            {
                Ok(id) => id,
                Err(err) => {
                    warn!("Skipping run {name}: {err}");
                    continue;
                }
            };
            load_run(&path, id, &mut dataset.measurements)?;
            println!("run {} done: {}", id + 1, path.display());
        }
        info!(
            "Parsed {} runs, {} measurement types",
            dataset.runs.len(),
            dataset.measurements.len()
        );
        Ok(dataset)
    }

    /// Replaces the snapshot in `dir`. `.data` files of measurement types
    /// absent from this dataset are removed.
    pub fn write_snapshot(&self, dir: &Path) -> Result<()> {
        for entry in read_dir(dir).context(format!("Read {}", dir.display()))? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|x| x.to_str()) == Some(DATA_EXTENSION)
            {
                debug!("Removing stale {}", path.display());
                remove_file(&path).context(format!("Remove {}", path.display()))?;
            }
        }
        write_json(&dir.join(RUN_FILE), &self.runs)?;
        for (measurement, rows) in &self.measurements {
            write_json(
                &dir.join(format!("{measurement}.{DATA_EXTENSION}")),
                rows,
            )?;
        }
        debug!("Snapshot written to {}", dir.display());
        Ok(())
    }

    pub fn restore(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(EvalError::DirectoryNotFound(dir.display().to_string()).into());
        }
        let run_file = dir.join(RUN_FILE);
        if !run_file.exists() {
            eyre::bail!(
                "No {RUN_FILE} in {}, parse the raw data first",
                dir.display()
            );
        }
        let runs: RunTable = read_json(&run_file)?;
        runs.check_ids()?;

        let mut measurements = MeasurementTable::new();
        for entry in read_dir(dir).context(format!("Read {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().and_then(|x| x.to_str()) != Some(DATA_EXTENSION) {
                continue;
            }
            let measurement = path
                .file_stem()
                .and_then(|x| x.to_str())
                .context("Snapshot file name")?
                .to_owned();
            println!("reading {}", path.display());
            let rows: Vec<MeasurementRow> = read_json(&path)?;
            if let Some(row) = rows.iter().find(|row| runs.get(row.run_id).is_none()) {
                return Err(EvalError::SnapshotInconsistent(format!(
                    "{measurement} references unknown run {}",
                    row.run_id
                ))
                .into());
            }
            measurements.insert(measurement, rows);
        }
        Ok(Dataset { runs, measurements })
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).context(format!("Create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).context(format!("Write {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).context(format!("Open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).context(format!("Parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_not_consumed_by_failures() {
        let mut table = RunTable::default();
        let ok = "65536,LAT=1,UNIFORM,RATIO=10,ITER=2,ZONES=8,nvme0n2";
        assert_eq!(table.insert_with(|id| decode_compact(ok, id)), Ok(0));
        assert!(table.insert_with(|id| decode_compact("garbage", id)).is_err());
        assert_eq!(table.insert_with(|id| decode_compact(ok, id)), Ok(1));
        assert_eq!(table.len(), 2);
        assert_eq!(table.matching(&table.runs()[0].config_key(), DeviceType::Zns), vec![0, 1]);
        assert!(table.matching(&table.runs()[0].config_key(), DeviceType::Ssd).is_empty());
    }

    #[test]
    fn missing_dir() {
        let err = Dataset::load(Path::new("/nonexistent/zns-eval"), true).unwrap_err();
        assert_eq!(
            err.downcast_ref::<EvalError>(),
            Some(&EvalError::DirectoryNotFound("/nonexistent/zns-eval".to_owned()))
        );
    }
}
