//! Parameter fingerprints
//!
//! A fingerprint is the SHA-224 digest of a bag's canonical form. Two bags
//! share a fingerprint exactly when their canonical forms are identical.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};
use std::fmt;

use crate::param::ParameterBag;
use crate::{Error, Result};

/// Domain tag; bump when the canonical encoding changes
pub const FINGERPRINT_VERSION: &str = "MUSEFP1";

/// Fixed-length lowercase hex digest identifying a parameter bag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest length in hex characters
    pub const HEX_LEN: usize = 56;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        let valid = value.len() == Self::HEX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(value))
        } else {
            Err(Error::InvalidParameter(format!(
                "{value:?} is not a {}-character lowercase hex fingerprint",
                Self::HEX_LEN
            )))
        }
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical serialization of a bag
pub fn canonicalize(bag: &ParameterBag) -> Result<String> {
    bag.canonicalize()
}

/// Fingerprint a bag
///
/// Pure and deterministic; fails only when a value cannot be serialized.
pub fn fingerprint(bag: &ParameterBag) -> Result<Fingerprint> {
    let canonical = canonicalize(bag)?;
    Ok(fingerprint_canonical(&canonical))
}

/// Fingerprint an already canonical string
pub fn fingerprint_canonical(canonical: &str) -> Fingerprint {
    let mut hasher = Sha224::new();
    hasher.update(FINGERPRINT_VERSION.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}
