//! Grouping records
//!
//! - `GroupRecord`: a named detector set with counts and asymmetry slots
//! - `PairRecord`: a forward/backward group pair with asymmetry slots
//! - `DerivedSlots`: the seam the computation cache works against

mod detectors;
mod group;
mod pair;

pub use detectors::{normalize_detectors, parse_detector_list};
pub use group::GroupRecord;
pub use pair::PairRecord;

use muse_foundation::{Fingerprint, Result, RunKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::entity::DerivedEntity;

// ============================================================================
// Slot addressing
// ============================================================================

/// Which output of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Counts,
    Asymmetry,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Counts => write!(f, "counts"),
            OutputKind::Asymmetry => write!(f, "asymmetry"),
        }
    }
}

/// Unbinned or rebinned product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Raw,
    Rebinned,
}

impl Variant {
    pub fn from_rebin(rebin: bool) -> Self {
        if rebin {
            Variant::Rebinned
        } else {
            Variant::Raw
        }
    }

    pub fn is_rebinned(self) -> bool {
        self == Variant::Rebinned
    }

    pub fn counterpart(self) -> Self {
        match self {
            Variant::Raw => Variant::Rebinned,
            Variant::Rebinned => Variant::Raw,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Raw => write!(f, "raw"),
            Variant::Rebinned => write!(f, "rebinned"),
        }
    }
}

/// Address of one derived entity inside a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub kind: OutputKind,
    pub run: RunKey,
    pub variant: Variant,
}

impl SlotKey {
    pub fn new(kind: OutputKind, run: RunKey, variant: Variant) -> Self {
        Self { kind, run, variant }
    }

    pub fn counts(run: RunKey, variant: Variant) -> Self {
        Self::new(OutputKind::Counts, run, variant)
    }

    pub fn asymmetry(run: RunKey, variant: Variant) -> Self {
        Self::new(OutputKind::Asymmetry, run, variant)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.run, self.variant)
    }
}

// ============================================================================
// DerivedSlots
// ============================================================================

/// Storage of derived entities addressed by [`SlotKey`]
pub trait DerivedSlots<T> {
    /// Name of the owning record
    fn record_name(&self) -> &str;

    /// Whether this record produces `kind` at all
    fn supports(&self, kind: OutputKind) -> bool;

    /// Lookup; absence is a normal outcome and triggers nothing
    fn get_entity(&self, key: &SlotKey) -> Option<&DerivedEntity<T>>;

    fn get_entity_mut(&mut self, key: &SlotKey) -> Option<&mut DerivedEntity<T>>;

    /// Construct or replace the entity at `key`
    fn update(
        &mut self,
        key: &SlotKey,
        data: Arc<T>,
        fingerprint: Fingerprint,
    ) -> Result<&DerivedEntity<T>>;

    /// Set visibility of the entity at `key`, returning whether it exists
    fn set_visible(&mut self, key: &SlotKey, visible: bool) -> bool {
        match self.get_entity_mut(key) {
            Some(entity) => {
                entity.set_visible(visible);
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// OutputSlots (raw + rebinned maps for one output kind)
// ============================================================================

/// Per-run entities of one output kind, unbinned and rebinned
#[derive(Debug)]
pub(crate) struct OutputSlots<T> {
    raw: BTreeMap<RunKey, DerivedEntity<T>>,
    rebinned: BTreeMap<RunKey, DerivedEntity<T>>,
}

impl<T> Default for OutputSlots<T> {
    fn default() -> Self {
        Self {
            raw: BTreeMap::new(),
            rebinned: BTreeMap::new(),
        }
    }
}

impl<T> OutputSlots<T> {
    fn map(&self, variant: Variant) -> &BTreeMap<RunKey, DerivedEntity<T>> {
        match variant {
            Variant::Raw => &self.raw,
            Variant::Rebinned => &self.rebinned,
        }
    }

    fn map_mut(&mut self, variant: Variant) -> &mut BTreeMap<RunKey, DerivedEntity<T>> {
        match variant {
            Variant::Raw => &mut self.raw,
            Variant::Rebinned => &mut self.rebinned,
        }
    }

    pub(crate) fn get(&self, run: &RunKey, variant: Variant) -> Option<&DerivedEntity<T>> {
        self.map(variant).get(run)
    }

    pub(crate) fn get_mut(
        &mut self,
        run: &RunKey,
        variant: Variant,
    ) -> Option<&mut DerivedEntity<T>> {
        self.map_mut(variant).get_mut(run)
    }

    pub(crate) fn upsert(
        &mut self,
        run: &RunKey,
        variant: Variant,
        data: Arc<T>,
        fingerprint: Fingerprint,
    ) -> &DerivedEntity<T> {
        let map = self.map_mut(variant);
        match map.get_mut(run) {
            Some(entity) => entity.replace(data, fingerprint),
            None => {
                map.insert(run.clone(), DerivedEntity::new(data, fingerprint));
            }
        }
        &map[run]
    }

    /// Display names of visible entities for `runs`, in the order given
    pub(crate) fn visible_names(&self, runs: &[RunKey], variant: Variant) -> Vec<String> {
        let map = self.map(variant);
        runs.iter()
            .filter_map(|run| map.get(run))
            .filter(|entity| entity.is_visible())
            .filter_map(|entity| entity.display_name().map(str::to_string))
            .collect()
    }

    /// Display name of the other variant for the entity shown as `name`
    pub(crate) fn counterpart_name(&self, name: &str, from: Variant) -> Option<&str> {
        let (run, _) = self
            .map(from)
            .iter()
            .find(|(_, entity)| entity.display_name() == Some(name))?;
        self.map(from.counterpart())
            .get(run)
            .and_then(DerivedEntity::display_name)
    }

    pub(crate) fn len(&self) -> usize {
        self.raw.len() + self.rebinned.len()
    }

    pub(crate) fn clear(&mut self) {
        self.raw.clear();
        self.rebinned.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muse_foundation::{fingerprint, run_key, ParameterBag};

    fn fp(tag: &str) -> Fingerprint {
        fingerprint(&ParameterBag::new().with("tag", tag)).unwrap()
    }

    #[test]
    fn test_slot_key_display() {
        let key = SlotKey::asymmetry(run_key(&[19489]).unwrap(), Variant::Rebinned);
        assert_eq!(key.to_string(), "asymmetry/19489/rebinned");
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let mut slots = OutputSlots::default();
        let run = run_key(&[1]).unwrap();

        slots.upsert(&run, Variant::Raw, Arc::new(1), fp("a"));
        let entity = slots.upsert(&run, Variant::Raw, Arc::new(2), fp("b"));

        assert_eq!(entity.version(), 2);
        assert_eq!(slots.len(), 1);
        assert!(slots.get(&run, Variant::Rebinned).is_none());
    }

    #[test]
    fn test_counterpart_name() {
        let mut slots = OutputSlots::default();
        let run = run_key(&[1]).unwrap();
        slots.upsert(&run, Variant::Raw, Arc::new(1), fp("a"));
        slots.upsert(&run, Variant::Rebinned, Arc::new(2), fp("b"));
        slots.get_mut(&run, Variant::Raw).unwrap().show("fwd #1");
        slots.get_mut(&run, Variant::Rebinned).unwrap().show("fwd Rebin #1");

        assert_eq!(slots.counterpart_name("fwd #1", Variant::Raw), Some("fwd Rebin #1"));
        assert_eq!(
            slots.counterpart_name("fwd Rebin #1", Variant::Rebinned),
            Some("fwd #1")
        );
        assert_eq!(slots.counterpart_name("bwd #1", Variant::Raw), None);
    }
}
