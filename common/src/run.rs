use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

pub type RunId = usize;

/// Known device names, after stripping `/dev/`.
const DEVICE_SUFFIXES: &[(&str, DeviceType)] = &[
    ("nvme0n2", DeviceType::Zns),
    ("nvme1n1p1", DeviceType::Ssd),
    ("nvme1n1", DeviceType::Ssd),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "ZNS")]
    Zns,
    #[serde(rename = "SSD")]
    Ssd,
}

impl DeviceType {
    /// Every comparison is expressed relative to this device.
    pub const BASELINE: DeviceType = DeviceType::Zns;
    pub const ALL: [DeviceType; 2] = [DeviceType::Zns, DeviceType::Ssd];

    pub fn from_device(device: &str) -> Result<Self, EvalError> {
        let name = device.trim();
        let name = name.strip_prefix("/dev/").unwrap_or(name);
        DEVICE_SUFFIXES
            .iter()
            .find(|(suffix, _)| *suffix == name)
            .map(|(_, device_type)| *device_type)
            .ok_or_else(|| EvalError::malformed("device", device, "unrecognized device"))
    }

    /// Name used in latency reports
    pub fn report_name(&self) -> &'static str {
        match self {
            DeviceType::Zns => "ZNS",
            DeviceType::Ssd => "Block",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceType::Zns => "ZNS",
            DeviceType::Ssd => "SSD",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Distribution {
    Zipfian,
    Uniform,
    Sequential,
    Random,
}

impl Distribution {
    pub fn short_name(&self) -> &'static str {
        match self {
            Distribution::Zipfian => "ZIPF",
            Distribution::Uniform => "UNIF",
            Distribution::Sequential => "SEQ",
            Distribution::Random => "RAND",
        }
    }

    /// Name used in plot legends
    pub fn pretty_name(&self) -> &'static str {
        match self {
            Distribution::Zipfian => "Zipfian",
            Distribution::Uniform => "Uniform",
            Distribution::Sequential => "Sequential",
            Distribution::Random => "Random",
        }
    }
}

impl FromStr for Distribution {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ZIPFIAN" => Ok(Distribution::Zipfian),
            "UNIFORM" => Ok(Distribution::Uniform),
            "SEQUENTIAL" => Ok(Distribution::Sequential),
            "RANDOM" => Ok(Distribution::Random),
            _ => Err(EvalError::malformed(
                "distribution",
                s,
                "expected ZIPFIAN, UNIFORM, SEQUENTIAL or RANDOM",
            )),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Distribution::Zipfian => "ZIPFIAN",
            Distribution::Uniform => "UNIFORM",
            Distribution::Sequential => "SEQUENTIAL",
            Distribution::Random => "RANDOM",
        })
    }
}

/// Metadata of a single benchmark run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub chunk_size: u64,
    /// Only carried by the compact directory-name encoding
    pub latency: Option<u64>,
    pub distribution: Distribution,
    pub working_set_ratio: u32,
    pub iterations: u64,
    pub zone_count: u32,
    pub device_type: DeviceType,
    pub eviction_policy: Option<String>,
}

impl RunRecord {
    pub fn config_key(&self) -> ConfigKey {
        ConfigKey {
            chunk_size: self.chunk_size,
            distribution: self.distribution,
            working_set_ratio: self.working_set_ratio,
        }
    }
}

/// The experimental configuration two devices are compared under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigKey {
    pub chunk_size: u64,
    pub distribution: Distribution,
    pub working_set_ratio: u32,
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            chunk_label(self.chunk_size),
            self.distribution.short_name(),
            self.working_set_ratio
        )
    }
}

/// Human readable chunk size, ie. `536870912` -> `512M`
pub fn chunk_label(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}M", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}K", bytes / KIB)
    } else {
        bytes.to_string()
    }
}
