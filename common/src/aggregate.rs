//! Joins run metadata with measurements and compares devices per
//! configuration, always relative to [`DeviceType::BASELINE`].

use std::{
    collections::{BTreeMap, btree_map::Entry},
    fmt::Write,
    path::PathBuf,
};

use eyre::Result;
use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use crate::{
    decode::decode_label,
    error::EvalError,
    measurement::read_series,
    run::{ConfigKey, DeviceType, RunId},
    stats::{SeriesStats, summarize},
    table::Dataset,
};

pub type DeviceStats = BTreeMap<DeviceType, SeriesStats>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    pub key: ConfigKey,
    pub baseline: SeriesStats,
    pub other: SeriesStats,
}

impl Comparison {
    pub fn new(key: ConfigKey, stats: &DeviceStats) -> Result<Self, EvalError> {
        let baseline = stats
            .get(&DeviceType::BASELINE)
            .ok_or(EvalError::MissingBaseline {
                key,
                baseline: DeviceType::BASELINE,
            })?;
        let other = DeviceType::ALL
            .into_iter()
            .find(|device| *device != DeviceType::BASELINE)
            .and_then(|device| stats.get(&device).map(|s| (device, s)));
        let Some((_, other)) = other else {
            return Err(EvalError::MissingCounterpart {
                key,
                device: DeviceType::Ssd,
            });
        };
        Ok(Comparison {
            key,
            baseline: *baseline,
            other: *other,
        })
    }

    pub fn stats(&self, device: DeviceType) -> &SeriesStats {
        if device == DeviceType::BASELINE {
            &self.baseline
        } else {
            &self.other
        }
    }

    /// Ratio of the device mean over the baseline mean
    pub fn mean_multiplier(&self, device: DeviceType) -> f64 {
        if device == DeviceType::BASELINE {
            1.0
        } else {
            self.other.mean / self.baseline.mean
        }
    }

    pub fn p99_multiplier(&self, device: DeviceType) -> f64 {
        if device == DeviceType::BASELINE {
            1.0
        } else {
            self.other.p99 / self.baseline.p99
        }
    }

    /// `(mean, p99)` multipliers against the baseline
    pub fn multiplier(&self, device: DeviceType) -> (f64, f64) {
        (self.mean_multiplier(device), self.p99_multiplier(device))
    }
}

pub fn compare_groups(groups: &BTreeMap<ConfigKey, DeviceStats>) -> Result<Vec<Comparison>, EvalError> {
    groups
        .iter()
        .map(|(key, stats)| Comparison::new(*key, stats))
        .collect()
}

impl Dataset {
    /// The single run with this configuration on `device`
    pub fn select_run(&self, key: &ConfigKey, device: DeviceType) -> Result<RunId, EvalError> {
        let ids = self.runs.matching(key, device);
        match ids.as_slice() {
            [] => Err(EvalError::JoinMiss { key: *key, device }),
            [id] => Ok(*id),
            _ => Err(EvalError::JoinAmbiguity {
                key: *key,
                device,
                ids,
            }),
        }
    }

    /// Scaled values of one measurement type for a run
    pub fn series(&self, run_id: RunId, measurement: &str, scale: f64) -> Vec<f64> {
        self.measurements
            .get(measurement)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.run_id == run_id)
                    .map(|row| row.value * scale)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn device_stats(
        &self,
        key: &ConfigKey,
        device: DeviceType,
        measurement: &str,
        scale: f64,
    ) -> Result<SeriesStats, EvalError> {
        let run_id = self.select_run(key, device)?;
        let values = self.series(run_id, measurement, scale);
        summarize(&values, &format!("{measurement} of run {run_id} ({key} {device})"))
    }

    /// Stats of every configuration for each device it was run on
    pub fn group_stats(
        &self,
        measurement: &str,
        scale: f64,
    ) -> Result<BTreeMap<ConfigKey, DeviceStats>, EvalError> {
        let mut groups: BTreeMap<ConfigKey, DeviceStats> = BTreeMap::new();
        let pairs = self
            .runs
            .runs()
            .iter()
            .map(|run| (run.config_key(), run.device_type))
            .unique();
        for (key, device) in pairs {
            let stats = self.device_stats(&key, device, measurement, scale)?;
            debug!("{key} {device}: {stats:?}");
            groups.entry(key).or_default().insert(device, stats);
        }
        Ok(groups)
    }

    /// Head-to-head comparison of every configuration. Fails if any
    /// configuration lacks one of the devices.
    pub fn compare(&self, measurement: &str, scale: f64) -> Result<Vec<Comparison>, EvalError> {
        compare_groups(&self.group_stats(measurement, scale)?)
    }
}

/// Mean and p99 per labelled file, grouped by configuration. Each label is
/// a compact run name describing the file with the same index.
pub fn latency_report(
    files: &[PathBuf],
    labels: &[String],
    scale: f64,
) -> Result<Vec<Comparison>> {
    if files.len() != labels.len() {
        return Err(EvalError::ArgumentMismatch {
            what: "labels".to_owned(),
            expected: files.len(),
            got: labels.len(),
        }
        .into());
    }

    let mut groups: BTreeMap<ConfigKey, DeviceStats> = BTreeMap::new();
    let mut origin: BTreeMap<(ConfigKey, DeviceType), usize> = BTreeMap::new();
    for (idx, (file, label)) in files.iter().zip(labels).enumerate() {
        let (key, device) = decode_label(label)?;
        match origin.entry((key, device)) {
            Entry::Occupied(prev) => {
                return Err(EvalError::JoinAmbiguity {
                    key,
                    device,
                    ids: vec![*prev.get(), idx],
                }
                .into());
            }
            Entry::Vacant(slot) => {
                slot.insert(idx);
            }
        }

        let values = read_series(file)?
            .samples
            .into_iter()
            .map(|s| s.value * scale)
            .collect::<Vec<_>>();
        let stats = summarize(&values, &file.display().to_string())?;
        groups.entry(key).or_default().insert(device, stats);
    }
    Ok(compare_groups(&groups)?)
}

/// Markdown table of the comparisons, values in `unit`
pub fn markdown_table(comparisons: &[Comparison], unit: &str) -> String {
    let mut out = format!("| Name | Mean ({unit}) | P99 ({unit}) |\n|------|------|-----|\n");
    for comparison in comparisons {
        for device in DeviceType::ALL {
            let stats = comparison.stats(device);
            let (mean_x, p99_x) = comparison.multiplier(device);
            _ = writeln!(
                out,
                "| {}-{} | {:.2} ({:.2}x) | {:.2} ({:.2}x) |",
                device.report_name(),
                comparison.key,
                stats.mean,
                mean_x,
                stats.p99,
                p99_x,
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::Distribution;

    fn key() -> ConfigKey {
        ConfigKey {
            chunk_size: 65536,
            distribution: Distribution::Uniform,
            working_set_ratio: 10,
        }
    }

    fn stats(mean: f64, p99: f64) -> SeriesStats {
        SeriesStats {
            count: 1,
            mean,
            p99,
        }
    }

    #[test]
    fn multipliers() {
        let mut group = DeviceStats::new();
        group.insert(DeviceType::Zns, stats(2.0, 4.0));
        group.insert(DeviceType::Ssd, stats(3.0, 10.0));
        let cmp = Comparison::new(key(), &group).unwrap();
        assert_eq!(cmp.mean_multiplier(DeviceType::Zns), 1.0);
        assert_eq!(cmp.p99_multiplier(DeviceType::Zns), 1.0);
        assert_eq!(cmp.mean_multiplier(DeviceType::Ssd), 1.5);
        assert_eq!(cmp.p99_multiplier(DeviceType::Ssd), 2.5);
        assert_eq!(cmp.multiplier(DeviceType::Zns), (1.0, 1.0));
        assert_eq!(cmp.multiplier(DeviceType::Ssd), (1.5, 2.5));
    }

    #[test]
    fn single_device_fails() {
        let mut group = DeviceStats::new();
        group.insert(DeviceType::Ssd, stats(3.0, 10.0));
        assert_eq!(
            Comparison::new(key(), &group),
            Err(EvalError::MissingBaseline {
                key: key(),
                baseline: DeviceType::Zns
            })
        );

        let mut group = DeviceStats::new();
        group.insert(DeviceType::Zns, stats(3.0, 10.0));
        assert_eq!(
            Comparison::new(key(), &group),
            Err(EvalError::MissingCounterpart {
                key: key(),
                device: DeviceType::Ssd
            })
        );
    }

    #[test]
    fn table() {
        let mut group = DeviceStats::new();
        group.insert(DeviceType::Zns, stats(2.0, 4.0));
        group.insert(DeviceType::Ssd, stats(3.0, 10.0));
        let cmp = Comparison::new(key(), &group).unwrap();
        let table = markdown_table(&[cmp], "ms");
        let lines = table.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "| Name | Mean (ms) | P99 (ms) |");
        assert_eq!(lines[2], "| ZNS-64K-UNIF-10 | 2.00 (1.00x) | 4.00 (1.00x) |");
        assert_eq!(lines[3], "| Block-64K-UNIF-10 | 3.00 (1.50x) | 10.00 (2.50x) |");
    }
}
