//! Detector group record

use muse_foundation::{Error, Fingerprint, Result, RunKey};
use serde_json::Value;
use std::sync::Arc;

use super::detectors::{normalize_detectors, parse_detector_list};
use super::{DerivedSlots, OutputKind, OutputSlots, SlotKey, Variant};
use crate::entity::DerivedEntity;

/// A named set of detectors and the products derived from it
///
/// The name is fixed at construction. Detector ids are always stored sorted
/// and free of duplicates.
#[derive(Debug)]
pub struct GroupRecord<T> {
    name: String,
    detectors: Vec<u32>,
    counts: OutputSlots<T>,
    asymmetry: OutputSlots<T>,
}

impl<T> GroupRecord<T> {
    pub fn new(name: impl Into<String>, detectors: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            detectors: normalize_detectors(detectors),
            counts: OutputSlots::default(),
            asymmetry: OutputSlots::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Always fails: a group keeps the name it was created with
    pub fn rename(&mut self, new_name: impl Into<String>) -> Result<()> {
        Err(Error::immutable("name", self.name.clone(), new_name))
    }

    pub fn detectors(&self) -> &[u32] {
        &self.detectors
    }

    pub fn n_detectors(&self) -> usize {
        self.detectors.len()
    }

    pub fn set_detectors(&mut self, detectors: Vec<u32>) {
        self.detectors = normalize_detectors(detectors);
    }

    /// Assign from an untyped scripting value; unchanged on error
    pub fn set_detectors_from_value(&mut self, value: &Value) -> Result<()> {
        self.detectors = parse_detector_list(value)?;
        Ok(())
    }

    /// Comma-joined detector ids, as passed to the grouping transform
    pub fn grouping_string(&self) -> String {
        self.detectors
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    fn slots(&self, kind: OutputKind) -> &OutputSlots<T> {
        match kind {
            OutputKind::Counts => &self.counts,
            OutputKind::Asymmetry => &self.asymmetry,
        }
    }

    fn slots_mut(&mut self, kind: OutputKind) -> &mut OutputSlots<T> {
        match kind {
            OutputKind::Counts => &mut self.counts,
            OutputKind::Asymmetry => &mut self.asymmetry,
        }
    }

    /// Display names of visible asymmetry entities for `runs`
    pub fn visible_asymmetry_names(&self, runs: &[RunKey], variant: Variant) -> Vec<String> {
        self.asymmetry.visible_names(runs, variant)
    }

    /// Given the display name of one variant, the display name of the other
    ///
    /// Asymmetry entities are searched before counts, unbinned before
    /// rebinned.
    pub fn counterpart_display_name(&self, name: &str) -> Option<&str> {
        self.asymmetry
            .counterpart_name(name, Variant::Raw)
            .or_else(|| self.counts.counterpart_name(name, Variant::Raw))
            .or_else(|| self.asymmetry.counterpart_name(name, Variant::Rebinned))
            .or_else(|| self.counts.counterpart_name(name, Variant::Rebinned))
    }

    /// Show the counts and asymmetry entities of one run/variant
    pub fn show(
        &mut self,
        run: &RunKey,
        variant: Variant,
        counts_name: impl Into<String>,
        asymmetry_name: impl Into<String>,
    ) {
        if let Some(entity) = self.counts.get_mut(run, variant) {
            entity.show(counts_name);
        }
        if let Some(entity) = self.asymmetry.get_mut(run, variant) {
            entity.show(asymmetry_name);
        }
    }

    /// Number of stored entities across all slots
    pub fn entity_count(&self) -> usize {
        self.counts.len() + self.asymmetry.len()
    }

    /// Drop every derived entity
    pub fn clear_entities(&mut self) {
        self.counts.clear();
        self.asymmetry.clear();
    }
}

impl<T> DerivedSlots<T> for GroupRecord<T> {
    fn record_name(&self) -> &str {
        &self.name
    }

    fn supports(&self, _kind: OutputKind) -> bool {
        true
    }

    fn get_entity(&self, key: &SlotKey) -> Option<&DerivedEntity<T>> {
        self.slots(key.kind).get(&key.run, key.variant)
    }

    fn get_entity_mut(&mut self, key: &SlotKey) -> Option<&mut DerivedEntity<T>> {
        self.slots_mut(key.kind).get_mut(&key.run, key.variant)
    }

    fn update(
        &mut self,
        key: &SlotKey,
        data: Arc<T>,
        fingerprint: Fingerprint,
    ) -> Result<&DerivedEntity<T>> {
        Ok(self
            .slots_mut(key.kind)
            .upsert(&key.run, key.variant, data, fingerprint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muse_foundation::{fingerprint, run_key, ParameterBag};
    use serde_json::json;

    fn fp(time_min: f64) -> Fingerprint {
        fingerprint(&ParameterBag::new().with("TimeMin", time_min)).unwrap()
    }

    #[test]
    fn test_detectors_sorted_and_deduplicated() {
        let mut group: GroupRecord<()> = GroupRecord::new("fwd", vec![]);
        group.set_detectors(vec![3, 1, 2, 1]);

        assert_eq!(group.detectors(), &[1, 2, 3]);
        assert_eq!(group.n_detectors(), 3);
        assert_eq!(group.grouping_string(), "1,2,3");
    }

    #[test]
    fn test_string_detectors_rejected_and_unchanged() {
        let mut group: GroupRecord<()> = GroupRecord::new("fwd", vec![5, 6]);

        let err = group.set_detectors_from_value(&json!("12")).unwrap_err();

        assert!(matches!(err, Error::InvalidDetectorList(_)));
        assert_eq!(group.detectors(), &[5, 6]);
    }

    #[test]
    fn test_detectors_from_value() {
        let mut group: GroupRecord<()> = GroupRecord::new("fwd", vec![]);
        group.set_detectors_from_value(&json!([3, 1, 2, 1])).unwrap();
        assert_eq!(group.detectors(), &[1, 2, 3]);
    }

    #[test]
    fn test_name_is_immutable() {
        let mut group: GroupRecord<()> = GroupRecord::new("fwd", vec![1]);

        let err = group.rename("bwd").unwrap_err();

        assert!(matches!(err, Error::ImmutableField { field: "name", .. }));
        assert_eq!(group.name(), "fwd");
    }

    #[test]
    fn test_get_entity_absent_then_present() {
        let mut group = GroupRecord::new("fwd", vec![1, 2]);
        let key = SlotKey::counts(run_key(&[19489]).unwrap(), Variant::Raw);

        assert!(group.get_entity(&key).is_none());

        group.update(&key, Arc::new(10u64), fp(0.1)).unwrap();

        let entity = group.get_entity(&key).unwrap();
        assert_eq!(**entity.data(), 10);
        assert!(group
            .get_entity(&SlotKey::asymmetry(key.run.clone(), Variant::Raw))
            .is_none());
        assert!(group
            .get_entity(&SlotKey::counts(key.run.clone(), Variant::Rebinned))
            .is_none());
    }

    #[test]
    fn test_show_and_visible_names() {
        let mut group = GroupRecord::new("fwd", vec![1]);
        let run = run_key(&[19489]).unwrap();
        let other = run_key(&[19490]).unwrap();
        group
            .update(&SlotKey::counts(run.clone(), Variant::Raw), Arc::new(1), fp(0.1))
            .unwrap();
        group
            .update(&SlotKey::asymmetry(run.clone(), Variant::Raw), Arc::new(2), fp(0.1))
            .unwrap();
        group
            .update(&SlotKey::asymmetry(other.clone(), Variant::Raw), Arc::new(3), fp(0.1))
            .unwrap();

        group.show(&run, Variant::Raw, "fwd counts", "fwd asym");

        assert_eq!(
            group.visible_asymmetry_names(&[run.clone(), other.clone()], Variant::Raw),
            vec!["fwd asym".to_string()]
        );
        assert!(group
            .visible_asymmetry_names(&[run], Variant::Rebinned)
            .is_empty());
        assert_eq!(group.entity_count(), 3);
    }

    #[test]
    fn test_counterpart_display_name() {
        let mut group = GroupRecord::new("fwd", vec![1]);
        let run = run_key(&[19489]).unwrap();
        for variant in [Variant::Raw, Variant::Rebinned] {
            group
                .update(&SlotKey::counts(run.clone(), variant), Arc::new(1), fp(0.1))
                .unwrap();
            group
                .update(&SlotKey::asymmetry(run.clone(), variant), Arc::new(1), fp(0.1))
                .unwrap();
        }
        group.show(&run, Variant::Raw, "counts", "asym");
        group.show(&run, Variant::Rebinned, "counts rebin", "asym rebin");

        assert_eq!(group.counterpart_display_name("asym"), Some("asym rebin"));
        assert_eq!(group.counterpart_display_name("counts rebin"), Some("counts"));
        assert_eq!(group.counterpart_display_name("missing"), None);
    }
}
