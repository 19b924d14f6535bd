//! Configuration
//!
//! - `SessionState`: user choices that feed parameter assembly
//! - `SessionConfig`: a whole analysis session (state, grouping scheme,
//!   runs, cache settings), loadable from TOML or JSON

mod session;

pub use session::{DeadTimeSource, RebinMode, RebinSpec, SessionState};

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::{Error, Result};

// ============================================================================
// Grouping scheme
// ============================================================================

/// A detector group definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    pub detectors: Vec<u32>,
}

/// A forward/backward pair definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSpec {
    pub name: String,
    pub forward: String,
    pub backward: String,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

fn default_alpha() -> f64 {
    1.0
}

// ============================================================================
// Run data
// ============================================================================

/// Per-run values read from a loaded file
///
/// Loading is outside this crate; drivers describe loaded runs with this
/// record so the session can be reproduced without the instrument files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub runs: Vec<u32>,

    /// Identity of the loaded data; changes when the data is reloaded
    pub workspace: String,

    #[serde(default)]
    pub first_good_data: f64,

    #[serde(default)]
    pub time_zero: f64,

    /// Largest recorded time value
    pub x_max: f64,

    /// Original bin width
    pub x_step: f64,

    /// Dead-time table stored in the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_time_table: Option<String>,

    #[serde(default = "default_periods")]
    pub periods: u32,
}

fn default_periods() -> u32 {
    1
}

// ============================================================================
// Cache settings
// ============================================================================

/// Cache behavior settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Produce the rebinned variant when rebinning is enabled
    #[serde(default = "default_compute_rebinned")]
    pub compute_rebinned: bool,

    /// Log cache hits at debug level instead of trace
    #[serde(default)]
    pub log_hits: bool,
}

fn default_compute_rebinned() -> bool {
    true
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            compute_rebinned: default_compute_rebinned(),
            log_hits: false,
        }
    }
}

// ============================================================================
// Session config
// ============================================================================

/// A complete analysis session description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub session: SessionState,

    #[serde(default)]
    pub groups: Vec<GroupSpec>,

    #[serde(default)]
    pub pairs: Vec<PairSpec>,

    #[serde(default)]
    pub runs: Vec<RunSpec>,

    #[serde(default)]
    pub cache: CacheSettings,
}

impl SessionConfig {
    /// Load from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            other => {
                return Err(Error::Config(format!(
                    "Unsupported config format {:?} for {}",
                    other.unwrap_or(""),
                    path.display()
                )))
            }
        };

        debug!(
            path = %path.display(),
            groups = config.groups.len(),
            pairs = config.pairs.len(),
            runs = config.runs.len(),
            "Loaded session config"
        );
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that do not need the collection
    pub fn validate(&self) -> Result<()> {
        for run in &self.runs {
            if run.runs.is_empty() {
                return Err(Error::Config(format!(
                    "run entry {:?} lists no run numbers",
                    run.workspace
                )));
            }
            if run.periods == 0 {
                return Err(Error::Config(format!(
                    "run entry {:?} must have at least one period",
                    run.workspace
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[session]
first_good_data_from_file = false
first_good_data = 0.2
dead_time = { source = "from_file" }
rebin = { mode = "fixed", fixed_factor = 2.0 }

[[groups]]
name = "fwd"
detectors = [1, 2, 3]

[[groups]]
name = "bwd"
detectors = [4, 5, 6]

[[pairs]]
name = "long"
forward = "fwd"
backward = "bwd"

[[runs]]
runs = [19489]
workspace = "EMU19489"
first_good_data = 0.11
x_max = 31.761
x_step = 0.016
"#;

    #[test]
    fn test_parse_toml() {
        let config = SessionConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.groups.len(), 2);
        assert_eq!(config.pairs[0].alpha, 1.0);
        assert_eq!(config.runs[0].periods, 1);
        assert_eq!(config.session.dead_time, DeadTimeSource::FromFile);
        assert!(config.session.rebin.is_enabled());
        assert!(config.session.last_good_data_from_file);
        assert!(config.cache.compute_rebinned);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(SAMPLE.as_bytes())
            .unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.groups[1].name, "bwd");

        let json_path = dir.path().join("session.json");
        std::fs::write(&json_path, serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(SessionConfig::load(&json_path).unwrap(), config);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yaml");
        std::fs::write(&path, "groups: []").unwrap();

        assert!(matches!(SessionConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_run_entry_rejected() {
        let content = r#"
[[runs]]
runs = []
workspace = "EMU0"
x_max = 1.0
x_step = 0.1
"#;
        assert!(matches!(
            SessionConfig::from_toml_str(content),
            Err(Error::Config(_))
        ));
    }
}
