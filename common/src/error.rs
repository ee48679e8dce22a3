use thiserror::Error;

use crate::run::{ConfigKey, DeviceType, RunId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Malformed metadata field '{field}' in '{input}': {reason}")]
    MalformedMetadata {
        field: &'static str,
        input: String,
        reason: String,
    },
    #[error("No run found for {key} on {device}")]
    JoinMiss { key: ConfigKey, device: DeviceType },
    #[error("Ambiguous run selection for {key} on {device}: runs {ids:?}")]
    JoinAmbiguity {
        key: ConfigKey,
        device: DeviceType,
        ids: Vec<RunId>,
    },
    #[error("Baseline {baseline} missing for {key}")]
    MissingBaseline { key: ConfigKey, baseline: DeviceType },
    #[error("No {device} measurements to compare against for {key}")]
    MissingCounterpart { key: ConfigKey, device: DeviceType },
    #[error("Expected {expected} {what}, got {got}")]
    ArgumentMismatch {
        what: String,
        expected: usize,
        got: usize,
    },
    #[error("No samples in {0}")]
    EmptySeries(String),
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("Snapshot inconsistent: {0}")]
    SnapshotInconsistent(String),
}

impl EvalError {
    pub(crate) fn malformed(field: &'static str, input: &str, reason: impl ToString) -> Self {
        EvalError::MalformedMetadata {
            field,
            input: input.to_owned(),
            reason: reason.to_string(),
        }
    }
}
