//! Decoding of the compact run encoding used for run directory names, ie.
//! `536870912,LAT=10,ZIPFIAN,RATIO=2,ITER=4,ZONES=100,nvme0n2-promote`.
//!
//! Every token position is bound to a [`Field`] and a parser in
//! [`COMPACT_FIELDS`]. Parsed values are collected into a [`PartialRun`]
//! which only turns into a [`RunRecord`] once every required field is set.

use crate::{
    error::EvalError,
    run::{ConfigKey, DeviceType, Distribution, RunId, RunRecord},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ChunkSize,
    Latency,
    Distribution,
    Ratio,
    Iterations,
    Zones,
    Device,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::ChunkSize => "chunk_size",
            Field::Latency => "latency",
            Field::Distribution => "distribution",
            Field::Ratio => "ratio",
            Field::Iterations => "iterations",
            Field::Zones => "zones",
            Field::Device => "device",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(u64),
    Distribution(Distribution),
    Device {
        device_type: DeviceType,
        eviction: Option<String>,
    },
}

pub type FieldParser = fn(Field, &str) -> Result<FieldValue, EvalError>;

/// Token layout of the compact encoding, in order
pub const COMPACT_FIELDS: [(Field, FieldParser); 7] = [
    (Field::ChunkSize, plain_int),
    (Field::Latency, key_value_int),
    (Field::Distribution, distribution),
    (Field::Ratio, key_value_int),
    (Field::Iterations, key_value_int),
    (Field::Zones, key_value_int),
    (Field::Device, device_token),
];

pub fn plain_int(field: Field, token: &str) -> Result<FieldValue, EvalError> {
    token
        .trim()
        .parse::<u64>()
        .map(FieldValue::Int)
        .map_err(|err| EvalError::malformed(field.name(), token, err))
}

/// Integer after the first `=`; a token without `=` is read whole
pub fn key_value_int(field: Field, token: &str) -> Result<FieldValue, EvalError> {
    let value = token.split_once('=').map(|(_, v)| v).unwrap_or(token);
    plain_int(field, value).map_err(|err| match err {
        EvalError::MalformedMetadata { field, reason, .. } => EvalError::MalformedMetadata {
            field,
            input: token.to_owned(),
            reason,
        },
        other => other,
    })
}

pub fn distribution(_: Field, token: &str) -> Result<FieldValue, EvalError> {
    token.parse().map(FieldValue::Distribution)
}

/// `<device>[-<eviction policy>]`
pub fn device_token(field: Field, token: &str) -> Result<FieldValue, EvalError> {
    let (device, eviction) = match token.trim().split_once('-') {
        Some((device, rest)) if !rest.is_empty() => (device, Some(rest.to_owned())),
        Some((device, _)) => (device, None),
        None => (token.trim(), None),
    };
    if device.is_empty() {
        return Err(EvalError::malformed(field.name(), token, "empty device"));
    }
    Ok(FieldValue::Device {
        device_type: DeviceType::from_device(device)?,
        eviction,
    })
}

/// Full device path, ie. `/dev/nvme0n2`
pub fn device_path(_: Field, token: &str) -> Result<FieldValue, EvalError> {
    Ok(FieldValue::Device {
        device_type: DeviceType::from_device(token)?,
        eviction: None,
    })
}

fn parser_for(field: Field) -> FieldParser {
    COMPACT_FIELDS
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, parser)| *parser)
        .unwrap_or(plain_int)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartialRun {
    pub chunk_size: Option<u64>,
    pub latency: Option<u64>,
    pub distribution: Option<Distribution>,
    pub working_set_ratio: Option<u32>,
    pub iterations: Option<u64>,
    pub zone_count: Option<u32>,
    pub device_type: Option<DeviceType>,
    pub eviction_policy: Option<String>,
}

impl PartialRun {
    pub fn set(&mut self, field: Field, value: FieldValue) -> Result<(), EvalError> {
        match (field, value) {
            (Field::ChunkSize, FieldValue::Int(v)) => self.chunk_size = Some(v),
            (Field::Latency, FieldValue::Int(v)) => self.latency = Some(v),
            (Field::Distribution, FieldValue::Distribution(d)) => self.distribution = Some(d),
            (Field::Ratio, FieldValue::Int(v)) => self.working_set_ratio = Some(narrow(field, v)?),
            (Field::Iterations, FieldValue::Int(v)) => self.iterations = Some(v),
            (Field::Zones, FieldValue::Int(v)) => self.zone_count = Some(narrow(field, v)?),
            (
                Field::Device,
                FieldValue::Device {
                    device_type,
                    eviction,
                },
            ) => {
                self.device_type = Some(device_type);
                if eviction.is_some() {
                    self.eviction_policy = eviction;
                }
            }
            (field, value) => {
                return Err(EvalError::malformed(
                    field.name(),
                    &format!("{value:?}"),
                    "value of the wrong kind",
                ));
            }
        }
        Ok(())
    }

    /// Parses `token` with the parser registered for `field` and stores it
    pub fn parse_into(&mut self, field: Field, token: &str) -> Result<(), EvalError> {
        let value = parser_for(field)(field, token)?;
        self.set(field, value)
    }

    /// Builds the record, failing on the first absent required field.
    /// Latency and eviction policy are optional.
    pub fn build(self, run_id: RunId, input: &str) -> Result<RunRecord, EvalError> {
        let missing = |field: Field| EvalError::malformed(field.name(), input, "missing");
        Ok(RunRecord {
            run_id,
            chunk_size: self.chunk_size.ok_or_else(|| missing(Field::ChunkSize))?,
            latency: self.latency,
            distribution: self
                .distribution
                .ok_or_else(|| missing(Field::Distribution))?,
            working_set_ratio: self
                .working_set_ratio
                .ok_or_else(|| missing(Field::Ratio))?,
            iterations: self.iterations.ok_or_else(|| missing(Field::Iterations))?,
            zone_count: self.zone_count.ok_or_else(|| missing(Field::Zones))?,
            device_type: self.device_type.ok_or_else(|| missing(Field::Device))?,
            eviction_policy: self.eviction_policy,
        })
    }
}

fn narrow(field: Field, value: u64) -> Result<u32, EvalError> {
    u32::try_from(value).map_err(|err| EvalError::malformed(field.name(), &value.to_string(), err))
}

/// Decodes a compact run name. All seven tokens must be present and valid.
pub fn decode_compact(input: &str, run_id: RunId) -> Result<RunRecord, EvalError> {
    let tokens = input.split(',').collect::<Vec<_>>();
    if tokens.len() > COMPACT_FIELDS.len() {
        return Err(EvalError::malformed(
            "tokens",
            input,
            format!(
                "expected {} tokens, got {}",
                COMPACT_FIELDS.len(),
                tokens.len()
            ),
        ));
    }

    let mut partial = PartialRun::default();
    for (i, (field, parser)) in COMPACT_FIELDS.iter().enumerate() {
        let token = tokens
            .get(i)
            .ok_or_else(|| EvalError::malformed(field.name(), input, "missing token"))?;
        partial.set(*field, parser(*field, token)?)?;
    }
    if partial.latency.is_none() {
        return Err(EvalError::malformed(Field::Latency.name(), input, "missing"));
    }
    partial.build(run_id, input)
}

/// Reads only the comparison-relevant tokens of a compact label:
/// chunk size, distribution, ratio and the trailing device token.
pub fn decode_label(label: &str) -> Result<(ConfigKey, DeviceType), EvalError> {
    let tokens = label.trim().split(',').collect::<Vec<_>>();
    let token = |i: usize, field: Field| {
        tokens
            .get(i)
            .copied()
            .ok_or_else(|| EvalError::malformed(field.name(), label, "missing token"))
    };

    let mut partial = PartialRun::default();
    partial.parse_into(Field::ChunkSize, token(0, Field::ChunkSize)?)?;
    partial.parse_into(Field::Distribution, token(2, Field::Distribution)?)?;
    partial.parse_into(Field::Ratio, token(3, Field::Ratio)?)?;
    let last = tokens.len().saturating_sub(1).max(4);
    partial.parse_into(Field::Device, token(last, Field::Device)?)?;

    let missing = |field: Field| EvalError::malformed(field.name(), label, "missing");
    let key = ConfigKey {
        chunk_size: partial.chunk_size.ok_or_else(|| missing(Field::ChunkSize))?,
        distribution: partial
            .distribution
            .ok_or_else(|| missing(Field::Distribution))?,
        working_set_ratio: partial
            .working_set_ratio
            .ok_or_else(|| missing(Field::Ratio))?,
    };
    let device = partial.device_type.ok_or_else(|| missing(Field::Device))?;
    Ok((key, device))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZNS_RUN: &str = "536870912,LAT=10,ZIPFIAN,RATIO=2,ITER=4,ZONES=100,nvme0n2";

    #[test]
    fn compact_run() {
        let run = decode_compact(ZNS_RUN, 3).unwrap();
        assert_eq!(
            run,
            RunRecord {
                run_id: 3,
                chunk_size: 536870912,
                latency: Some(10),
                distribution: Distribution::Zipfian,
                working_set_ratio: 2,
                iterations: 4,
                zone_count: 100,
                device_type: DeviceType::Zns,
                eviction_policy: None,
            }
        );
    }

    #[test]
    fn compact_is_deterministic() {
        let name = "65536,LAT=1,UNIFORM,RATIO=10,ITER=2,ZONES=8,nvme1n1p1-lru";
        assert_eq!(decode_compact(name, 0), decode_compact(name, 0));
        let run = decode_compact(name, 0).unwrap();
        assert_eq!(run.device_type, DeviceType::Ssd);
        assert_eq!(run.eviction_policy.as_deref(), Some("lru"));
    }

    #[test]
    fn key_value_without_equals_reads_whole_token() {
        assert_eq!(
            key_value_int(Field::Ratio, "10"),
            Ok(FieldValue::Int(10))
        );
        assert_eq!(
            key_value_int(Field::Ratio, "RATIO=10"),
            Ok(FieldValue::Int(10))
        );
    }

    #[test]
    fn malformed_field_is_named() {
        let err = decode_compact(
            "536870912,LAT=10,ZIPFIAN,RATIO=two,ITER=4,ZONES=100,nvme0n2",
            0,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EvalError::MalformedMetadata { field: "ratio", .. }
        ));
    }

    #[test]
    fn missing_token_rejects_record() {
        let err = decode_compact("536870912,LAT=10,ZIPFIAN,RATIO=2", 0).unwrap_err();
        assert!(matches!(
            err,
            EvalError::MalformedMetadata {
                field: "iterations",
                ..
            }
        ));
    }

    #[test]
    fn too_many_tokens_rejects_record() {
        let err = decode_compact(&format!("{ZNS_RUN},extra"), 0).unwrap_err();
        assert!(matches!(
            err,
            EvalError::MalformedMetadata { field: "tokens", .. }
        ));
    }

    #[test]
    fn unknown_device_is_an_error() {
        let err = decode_compact(
            "536870912,LAT=10,ZIPFIAN,RATIO=2,ITER=4,ZONES=100,sda1",
            0,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EvalError::MalformedMetadata {
                field: "device",
                ref input,
                ..
            } if input == "sda1"
        ));
    }

    #[test]
    fn label() {
        let (key, device) =
            decode_label("536870912,LAT=10,ZIPFIAN,RATIO=2,ITER=4,ZONES=100,nvme1n1p1-x")
                .unwrap();
        assert_eq!(device, DeviceType::Ssd);
        assert_eq!(key.chunk_size, 536870912);
        assert_eq!(key.distribution, Distribution::Zipfian);
        assert_eq!(key.working_set_ratio, 2);
        assert!(decode_label("536870912,LAT=10").is_err());
    }
}
