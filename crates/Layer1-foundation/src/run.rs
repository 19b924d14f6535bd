//! Run identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Canonical key for a run or a co-added list of runs
///
/// Sorted ascending, deduplicated, comma-joined: `[19491, 19489]` and
/// `[19489, 19491, 19489]` both become `"19489,19491"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunKey(String);

impl RunKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Run numbers this key was built from, ascending
    pub fn runs(&self) -> Vec<u32> {
        self.0.split(',').filter_map(|r| r.parse().ok()).collect()
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RunKey {
    type Error = Error;

    /// Re-canonicalizes, so `"19491,19489"` reads back as `"19489,19491"`
    fn try_from(value: String) -> Result<Self> {
        let runs = value
            .split(',')
            .map(|r| {
                r.trim()
                    .parse::<u32>()
                    .map_err(|_| Error::InvalidParameter(format!("invalid run number {r:?}")))
            })
            .collect::<Result<Vec<_>>>()?;
        run_key(&runs)
    }
}

impl From<RunKey> for String {
    fn from(key: RunKey) -> Self {
        key.0
    }
}

/// Build the canonical key for a run-number list
pub fn run_key(run_numbers: &[u32]) -> Result<RunKey> {
    if run_numbers.is_empty() {
        return Err(Error::InvalidParameter(
            "run list must contain at least one run number".to_string(),
        ));
    }

    let mut runs = run_numbers.to_vec();
    runs.sort_unstable();
    runs.dedup();

    let joined = runs
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    Ok(RunKey(joined))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_key_sorted_and_deduplicated() {
        let key = run_key(&[19491, 19489, 19491]).unwrap();
        assert_eq!(key.as_str(), "19489,19491");
        assert_eq!(key.runs(), vec![19489, 19491]);
    }

    #[test]
    fn test_run_key_order_independent() {
        assert_eq!(run_key(&[2, 1]).unwrap(), run_key(&[1, 2]).unwrap());
    }

    #[test]
    fn test_single_run() {
        assert_eq!(run_key(&[19489]).unwrap().to_string(), "19489");
    }

    #[test]
    fn test_empty_run_list_rejected() {
        assert!(matches!(run_key(&[]), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_deserialize_canonicalizes() {
        let key: RunKey = serde_json::from_str("\"19491,19489,19491\"").unwrap();
        assert_eq!(key, run_key(&[19489, 19491]).unwrap());
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"19489,19491\"");

        assert!(serde_json::from_str::<RunKey>("\"\"").is_err());
        assert!(serde_json::from_str::<RunKey>("\"19489,x\"").is_err());
    }
}
