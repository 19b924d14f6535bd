//! Detector list validation

use muse_foundation::{Error, Result};
use serde_json::Value;

/// Sort ascending and drop duplicates
pub fn normalize_detectors(mut detectors: Vec<u32>) -> Vec<u32> {
    detectors.sort_unstable();
    detectors.dedup();
    detectors
}

/// Parse a scripting-layer detector list
///
/// Only a JSON array of non-negative integers is accepted. A string is
/// rejected outright even when it looks like digits: `"12"` is not `[1, 2]`.
pub fn parse_detector_list(value: &Value) -> Result<Vec<u32>> {
    let items = match value {
        Value::Array(items) => items,
        Value::String(s) => {
            return Err(Error::InvalidDetectorList(format!(
                "detectors must be a list of integers, got string {s:?}"
            )))
        }
        other => {
            return Err(Error::InvalidDetectorList(format!(
                "detectors must be a list of integers, got {}",
                json_type_name(other)
            )))
        }
    };

    let detectors = items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|id| u32::try_from(id).ok())
                .ok_or_else(|| {
                    Error::InvalidDetectorList(format!(
                        "detector id {item} is not a non-negative 32-bit integer"
                    ))
                })
        })
        .collect::<Result<Vec<u32>>>()?;

    Ok(normalize_detectors(detectors))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
