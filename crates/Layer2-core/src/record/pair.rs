//! Forward/backward pair record

use muse_foundation::{Error, Fingerprint, Result, RunKey};
use std::sync::Arc;

use super::{DerivedSlots, OutputKind, OutputSlots, SlotKey, Variant};
use crate::entity::DerivedEntity;

/// Two groups combined with a balance factor
///
/// The groups are referenced by name and resolved through the owning
/// collection; a pair never owns its groups.
#[derive(Debug)]
pub struct PairRecord<T> {
    name: String,
    forward_group: String,
    backward_group: String,
    alpha: f64,
    asymmetry: OutputSlots<T>,
}

impl<T> PairRecord<T> {
    /// Fails if `alpha` is not a positive finite number
    pub fn new(
        name: impl Into<String>,
        forward_group: impl Into<String>,
        backward_group: impl Into<String>,
        alpha: f64,
    ) -> Result<Self> {
        check_alpha(alpha)?;
        Ok(Self {
            name: name.into(),
            forward_group: forward_group.into(),
            backward_group: backward_group.into(),
            alpha,
            asymmetry: OutputSlots::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Always fails: a pair keeps the name it was created with
    pub fn rename(&mut self, new_name: impl Into<String>) -> Result<()> {
        Err(Error::immutable("name", self.name.clone(), new_name))
    }

    pub fn forward_group(&self) -> &str {
        &self.forward_group
    }

    pub fn backward_group(&self) -> &str {
        &self.backward_group
    }

    /// Whether `group` is one of the two referenced groups
    pub fn references(&self, group: &str) -> bool {
        self.forward_group == group || self.backward_group == group
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        check_alpha(alpha)?;
        self.alpha = alpha;
        Ok(())
    }

    pub fn visible_asymmetry_names(&self, runs: &[RunKey], variant: Variant) -> Vec<String> {
        self.asymmetry.visible_names(runs, variant)
    }

    pub fn counterpart_display_name(&self, name: &str) -> Option<&str> {
        self.asymmetry
            .counterpart_name(name, Variant::Raw)
            .or_else(|| self.asymmetry.counterpart_name(name, Variant::Rebinned))
    }

    pub fn show(&mut self, run: &RunKey, variant: Variant, name: impl Into<String>) {
        if let Some(entity) = self.asymmetry.get_mut(run, variant) {
            entity.show(name);
        }
    }

    pub fn entity_count(&self) -> usize {
        self.asymmetry.len()
    }

    pub fn clear_entities(&mut self) {
        self.asymmetry.clear();
    }
}

impl<T> DerivedSlots<T> for PairRecord<T> {
    fn record_name(&self) -> &str {
        &self.name
    }

    fn supports(&self, kind: OutputKind) -> bool {
        kind == OutputKind::Asymmetry
    }

    fn get_entity(&self, key: &SlotKey) -> Option<&DerivedEntity<T>> {
        if !self.supports(key.kind) {
            return None;
        }
        self.asymmetry.get(&key.run, key.variant)
    }

    fn get_entity_mut(&mut self, key: &SlotKey) -> Option<&mut DerivedEntity<T>> {
        if !self.supports(key.kind) {
            return None;
        }
        self.asymmetry.get_mut(&key.run, key.variant)
    }

    fn update(
        &mut self,
        key: &SlotKey,
        data: Arc<T>,
        fingerprint: Fingerprint,
    ) -> Result<&DerivedEntity<T>> {
        if !self.supports(key.kind) {
            return Err(Error::InvalidParameter(format!(
                "pair {} has no {} output",
                self.name, key.kind
            )));
        }
        Ok(self
            .asymmetry
            .upsert(&key.run, key.variant, data, fingerprint))
    }
}

fn check_alpha(alpha: f64) -> Result<()> {
    if alpha.is_finite() && alpha > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "alpha must be a positive finite number, got {alpha}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muse_foundation::{fingerprint, run_key, ParameterBag};

    fn fp() -> Fingerprint {
        fingerprint(&ParameterBag::new().with("Alpha", 1.0)).unwrap()
    }

    #[test]
    fn test_pair_references() {
        let pair: PairRecord<()> = PairRecord::new("long", "fwd", "bwd", 1.0).unwrap();
        assert!(pair.references("fwd"));
        assert!(pair.references("bwd"));
        assert!(!pair.references("top"));
    }

    #[test]
    fn test_pair_rejects_counts() {
        let mut pair = PairRecord::new("long", "fwd", "bwd", 1.0).unwrap();
        let key = SlotKey::counts(run_key(&[1]).unwrap(), Variant::Raw);

        assert!(matches!(
            pair.update(&key, Arc::new(0), fp()),
            Err(Error::InvalidParameter(_))
        ));
        assert!(pair.get_entity(&key).is_none());
        assert_eq!(pair.entity_count(), 0);
    }

    #[test]
    fn test_pair_name_is_immutable() {
        let mut pair: PairRecord<()> = PairRecord::new("long", "fwd", "bwd", 1.0).unwrap();
        assert!(matches!(pair.rename("short"), Err(Error::ImmutableField { .. })));
        assert_eq!(pair.name(), "long");
    }

    #[test]
    fn test_alpha_validation() {
        let mut pair: PairRecord<()> = PairRecord::new("long", "fwd", "bwd", 1.0).unwrap();
        pair.set_alpha(1.2).unwrap();
        assert_eq!(pair.alpha(), 1.2);
        assert!(pair.set_alpha(0.0).is_err());
        assert!(pair.set_alpha(f64::NAN).is_err());
        assert_eq!(pair.alpha(), 1.2);
    }

    #[test]
    fn test_constructor_rejects_bad_alpha() {
        assert!(matches!(
            PairRecord::<()>::new("long", "fwd", "bwd", 0.0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(PairRecord::<()>::new("long", "fwd", "bwd", -1.0).is_err());
        assert!(PairRecord::<()>::new("long", "fwd", "bwd", f64::NAN).is_err());
    }

    #[test]
    fn test_set_visible_via_slots() {
        let mut pair = PairRecord::new("long", "fwd", "bwd", 1.0).unwrap();
        let key = SlotKey::asymmetry(run_key(&[1]).unwrap(), Variant::Raw);
        assert!(!pair.set_visible(&key, true));

        pair.update(&key, Arc::new(0.5f64), fp()).unwrap();
        assert!(pair.set_visible(&key, true));
        assert!(pair.get_entity(&key).unwrap().is_visible());
    }
}
