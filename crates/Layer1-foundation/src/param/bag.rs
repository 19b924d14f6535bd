//! Parameter bag
//!
//! Insertion order is kept for display; canonical form sorts keys so the
//! same key/value pairs always serialize identically.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::value::ParamValue;
use crate::{Error, Result};

/// Separator between entries in the canonical form
const ENTRY_SEPARATOR: char = ';';

/// Ordered mapping from parameter name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterBag {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter, keeping its original position on replace
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Copy every entry of `section` into this bag as `prefix.key`
    pub fn merge_section(&mut self, prefix: &str, section: &ParameterBag) {
        for (key, value) in section.iter() {
            self.insert(format!("{prefix}.{key}"), value.clone());
        }
    }

    /// Build a bag from a JSON object (scripting-layer entry point)
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::InvalidParameter("parameter bag must be a JSON object".to_string())
        })?;

        let mut bag = Self::new();
        for (key, value) in object {
            bag.insert(key.clone(), ParamValue::from_json(key, value)?);
        }
        Ok(bag)
    }

    /// Deterministic serialization: `key=value` pairs, keys sorted
    pub fn canonicalize(&self) -> Result<String> {
        let mut sorted: Vec<&(String, ParamValue)> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = String::new();
        for (i, (key, value)) in sorted.into_iter().enumerate() {
            if key.is_empty() {
                return Err(Error::InvalidParameter(
                    "parameter name must not be empty".to_string(),
                ));
            }
            if key.contains(['=', ENTRY_SEPARATOR]) {
                return Err(Error::InvalidParameter(format!(
                    "parameter name {key:?} contains a reserved character"
                )));
            }
            if i > 0 {
                out.push(ENTRY_SEPARATOR);
            }
            out.push_str(key);
            out.push('=');
            value.write_canonical(&mut out)?;
        }
        Ok(out)
    }
}

impl fmt::Display for ParameterBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParameterBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (k, v) in iter {
            bag.insert(k, v);
        }
        bag
    }
}
