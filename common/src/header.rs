//! Verbose run encoding: a `Key: Value` text header at the top of a raw
//! result file, terminated by a blank line.

use std::{
    fs::{File, copy, create_dir_all, read_dir},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use eyre::{Context, Result};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::{
    decode::{Field, FieldValue, PartialRun, device_path},
    error::EvalError,
    run::{DeviceType, RunId, RunRecord, chunk_label},
};

/// Headers are never longer than this
const HEADER_LINES: usize = 20;
const PROFILE_SUFFIX: &str = ".profile.csv";

static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(Chunk Size:|Distribution Type:|Working Set Ratio:|Iterations:|Number of Zones:|Eviction |Device )\s*(.*?)\s*$",
    )
    .unwrap()
});

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HeaderMetadata {
    pub chunk_size: Option<String>,
    pub distribution: Option<String>,
    pub ratio: Option<String>,
    pub iterations: Option<String>,
    pub zones: Option<String>,
    pub eviction: Option<String>,
    pub device: Option<String>,
}

impl HeaderMetadata {
    pub fn parse(text: &str) -> Self {
        Self::from_lines(text.lines())
    }

    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut meta = HeaderMetadata::default();
        for line in lines.into_iter().take(HEADER_LINES) {
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            let Some(cap) = HEADER_LINE.captures(line) else {
                continue;
            };
            let value = Some(cap[2].to_owned());
            match &cap[1] {
                "Chunk Size:" => meta.chunk_size = value,
                "Distribution Type:" => meta.distribution = value,
                "Working Set Ratio:" => meta.ratio = value,
                "Iterations:" => meta.iterations = value,
                "Number of Zones:" => meta.zones = value,
                "Eviction " => meta.eviction = value,
                "Device " => meta.device = value,
                _ => {}
            }
        }
        meta
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).context(format!("Open {}", path.display()))?;
        let lines = BufReader::new(file)
            .lines()
            .take(HEADER_LINES)
            .collect::<Result<Vec<_>, _>>()
            .context(format!("Read header of {}", path.display()))?;
        Ok(Self::from_lines(lines.iter().map(String::as_str)))
    }

    /// Canonical profile name, ie. `512M-ZIPFIAN-RATIO=2-Iter=4-Zones=100-LRU-ZNS.csv`.
    /// `None` if any part is missing or the device is not recognized.
    pub fn build_filename(&self) -> Option<String> {
        let chunk = self.chunk_size.as_ref().map(|raw| match raw.parse::<u64>() {
            Ok(bytes) => chunk_label(bytes),
            Err(_) => raw.clone(),
        })?;
        let device = DeviceType::from_device(self.device.as_deref()?).ok()?;
        let parts = [
            chunk,
            self.distribution.clone()?,
            format!("RATIO={}", self.ratio.as_ref()?),
            format!("Iter={}", self.iterations.as_ref()?),
            format!("Zones={}", self.zones.as_ref()?),
            self.eviction.clone()?,
            device.to_string(),
        ];
        Some(format!("{}.csv", parts.join("-")))
    }

    pub fn to_run_record(&self, run_id: RunId) -> Result<RunRecord, EvalError> {
        let source = format!("{self:?}");
        let mut partial = PartialRun::default();
        let fields = [
            (Field::ChunkSize, &self.chunk_size),
            (Field::Distribution, &self.distribution),
            (Field::Ratio, &self.ratio),
            (Field::Iterations, &self.iterations),
            (Field::Zones, &self.zones),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                partial.parse_into(field, value)?;
            }
        }
        if let Some(device) = &self.device {
            partial.set(Field::Device, device_path(Field::Device, device)?)?;
        }
        if let Some(eviction) = &self.eviction {
            partial.set(
                Field::Device,
                FieldValue::Device {
                    device_type: partial
                        .device_type
                        .ok_or_else(|| EvalError::malformed("device", &source, "missing"))?,
                    eviction: Some(eviction.clone()),
                },
            )?;
        }
        partial.build(run_id, &source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoProfile,
    IncompleteHeader,
    /// Header could not be read, ie. not UTF-8
    UnreadableHeader,
}

#[derive(Debug, Default)]
pub struct RenameReport {
    pub copied: Vec<(PathBuf, PathBuf)>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

/// Copies each `<file>.profile.csv` in `dir` to `dir/out/<canonical name>`,
/// using the header of `<file>` to build the name.
pub fn rename_profiles(dir: &Path) -> Result<RenameReport> {
    if !dir.is_dir() {
        return Err(EvalError::DirectoryNotFound(dir.display().to_string()).into());
    }

    let out_dir = dir.join("out");
    create_dir_all(&out_dir).context("Create out dir")?;

    let mut report = RenameReport::default();
    for entry in read_dir(dir).context("Read profile dir")? {
        let path = entry?.path();
        let Some(filename) = path.file_name().and_then(|x| x.to_str()) else {
            continue;
        };
        if filename.ends_with(".csv") || !path.is_file() {
            continue;
        }

        let profile = dir.join(format!("{filename}{PROFILE_SUFFIX}"));
        if !profile.exists() {
            println!("Skipping {filename}: no matching {PROFILE_SUFFIX} file found.");
            report.skipped.push((path, SkipReason::NoProfile));
            continue;
        }

        let header = match HeaderMetadata::read(&path) {
            Ok(header) => header,
            Err(err) => {
                warn!("Skipping {filename}: {err:#}");
                report.skipped.push((path, SkipReason::UnreadableHeader));
                continue;
            }
        };
        debug!("{filename}: {header:?}");
        let Some(new_filename) = header.build_filename() else {
            println!("Skipping {filename}: header is missing required fields.");
            report.skipped.push((path, SkipReason::IncompleteHeader));
            continue;
        };

        let destination = out_dir.join(&new_filename);
        println!("Copying:\n  {filename}{PROFILE_SUFFIX} → out/{new_filename}");
        copy(&profile, &destination).context(format!("Copy {}", profile.display()))?;
        report.copied.push((profile, destination));
    }
    info!(
        "Copied {} profiles, skipped {}",
        report.copied.len(),
        report.skipped.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::Distribution;

    const HEADER: &str = "Chunk Size: 536870912
Distribution Type: ZIPFIAN
Working Set Ratio: 2
Iterations: 4
Number of Zones: 100
Eviction PROMOTIONAL
Device /dev/nvme0n2

0.1,GETLATENCY,5
";

    #[test]
    fn filename_from_header() {
        let meta = HeaderMetadata::parse(HEADER);
        assert_eq!(
            meta.build_filename().as_deref(),
            Some("512M-ZIPFIAN-RATIO=2-Iter=4-Zones=100-PROMOTIONAL-ZNS.csv")
        );
    }

    #[test]
    fn missing_device_gives_no_filename() {
        let meta = HeaderMetadata::parse(&HEADER.replace("Device /dev/nvme0n2\n", ""));
        assert_eq!(meta.device, None);
        assert_eq!(meta.build_filename(), None);
    }

    #[test]
    fn unknown_device_gives_no_filename() {
        let meta = HeaderMetadata::parse(&HEADER.replace("nvme0n2", "sdb"));
        assert_eq!(meta.build_filename(), None);
        assert_eq!(
            meta.to_run_record(0),
            Err(EvalError::malformed(
                "device",
                "/dev/sdb",
                "unrecognized device"
            ))
        );
    }

    #[test]
    fn header_stops_at_blank_line() {
        let meta = HeaderMetadata::parse("Chunk Size: 65536\n\nIterations: 3\n");
        assert_eq!(meta.chunk_size.as_deref(), Some("65536"));
        assert_eq!(meta.iterations, None);
    }

    #[test]
    fn header_record_matches_compact_shape() {
        let run = HeaderMetadata::parse(HEADER).to_run_record(7).unwrap();
        assert_eq!(run.run_id, 7);
        assert_eq!(run.chunk_size, 536870912);
        assert_eq!(run.latency, None);
        assert_eq!(run.distribution, Distribution::Zipfian);
        assert_eq!(run.working_set_ratio, 2);
        assert_eq!(run.iterations, 4);
        assert_eq!(run.zone_count, 100);
        assert_eq!(run.device_type, DeviceType::Zns);
        assert_eq!(run.eviction_policy.as_deref(), Some("PROMOTIONAL"));
        assert_eq!(
            HeaderMetadata::parse(HEADER).to_run_record(7),
            HeaderMetadata::parse(HEADER).to_run_record(7)
        );
    }

    #[test]
    fn header_record_without_zones_is_rejected() {
        let meta = HeaderMetadata::parse(&HEADER.replace("Number of Zones: 100\n", ""));
        assert!(matches!(
            meta.to_run_record(0),
            Err(EvalError::MalformedMetadata { field: "zones", .. })
        ));
    }
}
