//! # muse-foundation
//!
//! Foundation layer for muse:
//! - Param: parameter bags and values assembled per computation request
//! - Fingerprint: content hash of a bag, the only cache-validity signal
//! - Run: canonical run keys
//! - Config: session state, grouping scheme and cache settings
//! - Error: the shared error taxonomy
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  SessionConfig ──► SessionState + RunSpec               │
//! │                     │                                   │
//! │                     ▼  (assembler, muse-core)           │
//! │               ParameterBag                              │
//! │                     │                                   │
//! │                     ▼                                   │
//! │   canonicalize ──► SHA-224 ──► Fingerprint              │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod param;
pub mod run;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Parameters & Fingerprints
// ============================================================================
pub use fingerprint::{canonicalize, fingerprint, Fingerprint, FINGERPRINT_VERSION};
pub use param::{ParamValue, ParameterBag, Scalar};

// ============================================================================
// Runs
// ============================================================================
pub use run::{run_key, RunKey};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    CacheSettings, DeadTimeSource, GroupSpec, PairSpec, RebinMode, RebinSpec, RunSpec,
    SessionConfig, SessionState,
};
