//! Derived entities
//!
//! One computed data product together with the fingerprint of the
//! parameters that produced it and its display state.

use chrono::{DateTime, Utc};
use muse_foundation::Fingerprint;
use std::sync::Arc;

/// A versioned holder for one computed product
///
/// The product is shared out as an `Arc` so a cache hit hands back the very
/// same allocation. Replacing the product drops the slot's reference; a
/// caller still holding the old `Arc` keeps a snapshot, never a live alias.
#[derive(Debug)]
pub struct DerivedEntity<T> {
    data: Arc<T>,
    fingerprint: Fingerprint,
    visible: bool,
    display_name: Option<String>,
    version: u64,
    computed_at: DateTime<Utc>,
}

impl<T> DerivedEntity<T> {
    pub fn new(data: Arc<T>, fingerprint: Fingerprint) -> Self {
        Self {
            data,
            fingerprint,
            visible: false,
            display_name: None,
            version: 1,
            computed_at: Utc::now(),
        }
    }

    /// Overwrite product and fingerprint
    ///
    /// Display state survives: a recomputed entity that was shown stays shown.
    pub fn replace(&mut self, data: Arc<T>, fingerprint: Fingerprint) {
        self.data = data;
        self.fingerprint = fingerprint;
        self.version += 1;
        self.computed_at = Utc::now();
    }

    /// Whether this entity was produced by parameters with `fingerprint`
    #[inline]
    pub fn matches(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprint == *fingerprint
    }

    pub fn data(&self) -> &Arc<T> {
        &self.data
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Number of times this slot has been computed
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    // ========================================================================
    // Display state (never touches data or fingerprint)
    // ========================================================================

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = Some(name.into());
    }

    /// Make visible under `name`
    pub fn show(&mut self, name: impl Into<String>) {
        self.set_display_name(name);
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}
