//! Computation cache
//!
//! Lookup-or-compute for one slot. The fingerprint of the request bag is the
//! only staleness signal:
//!
//! 1. Fingerprint the bag (invalid bags fail before any compute)
//! 2. Stored entity with the same fingerprint: return it untouched
//! 3. Otherwise compute; on failure leave the slot as it was
//! 4. On success construct or replace the slot's entity
//!
//! There is no dependency graph and no invalidation call: a request is
//! either a hit or a full recompute.

use muse_foundation::{fingerprint, CacheSettings, Error, ParameterBag, Result};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::record::{DerivedSlots, SlotKey};
use crate::transform::ComputeResult;

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from a stored entity
    pub hits: u64,
    /// Requests that invoked the transform
    pub misses: u64,
    /// Transform invocations that failed
    pub failures: u64,
}

impl CacheStats {
    /// Calculate hit rate over all requests
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// Record one request outcome
    pub(crate) fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Hit => self.hits += 1,
            Outcome::Computed => self.misses += 1,
            Outcome::Failed => {
                self.misses += 1;
                self.failures += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Outcome {
    Hit,
    Computed,
    Failed,
}

/// Fingerprint-validated lookup-or-compute over [`DerivedSlots`]
#[derive(Debug, Default)]
pub struct ComputationCache {
    settings: CacheSettings,
    stats: CacheStats,
}

impl ComputationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: CacheSettings) -> Self {
        Self {
            settings,
            stats: CacheStats::default(),
        }
    }

    /// Return the product for `key`, computing it only when the stored
    /// fingerprint differs from the bag's
    pub fn get_or_compute<T, R, F>(
        &mut self,
        record: &mut R,
        key: &SlotKey,
        bag: &ParameterBag,
        compute: F,
    ) -> Result<Arc<T>>
    where
        R: DerivedSlots<T> + ?Sized,
        F: FnOnce(&ParameterBag) -> ComputeResult<T>,
    {
        let fp = fingerprint(bag)?;

        if let Some(entity) = record.get_entity(key) {
            if entity.matches(&fp) {
                self.stats.record(Outcome::Hit);
                log_hit(&self.settings, record.record_name(), key, entity.version());
                return Ok(Arc::clone(entity.data()));
            }
        }

        if !record.supports(key.kind) {
            return Err(Error::InvalidParameter(format!(
                "{} has no {} output",
                record.record_name(),
                key.kind
            )));
        }

        debug!(
            record = %record.record_name(),
            slot = %key,
            fingerprint = %fp.short(),
            "Computing derived product"
        );

        let data = match compute(bag) {
            Ok(data) => Arc::new(data),
            Err(failure) => {
                self.stats.record(Outcome::Failed);
                let unit = format!("{}/{}", record.record_name(), key);
                warn!(unit = %unit, error = %failure, "Computation failed, cached entity kept");
                return Err(Error::computation(unit, failure.message));
            }
        };

        self.stats.record(Outcome::Computed);
        record.update(key, Arc::clone(&data), fp)?;
        Ok(data)
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }
}

pub(crate) fn log_hit(settings: &CacheSettings, record: &str, key: &SlotKey, version: u64) {
    if settings.log_hits {
        debug!(record = %record, slot = %key, version, "Cache hit");
    } else {
        trace!(record = %record, slot = %key, version, "Cache hit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{GroupRecord, PairRecord, Variant};
    use crate::transform::ComputeFailure;
    use muse_foundation::run_key;
    use std::cell::Cell;

    fn key() -> SlotKey {
        SlotKey::counts(run_key(&[19489]).unwrap(), Variant::Raw)
    }

    fn bag(time_min: f64) -> ParameterBag {
        ParameterBag::new()
            .with("TimeMin", time_min)
            .with("TimeMax", 5.0)
    }

    #[test]
    fn test_hit_computes_once_and_returns_same_product() {
        let mut cache = ComputationCache::new();
        let mut group = GroupRecord::new("fwd", vec![1, 2]);
        let calls = Cell::new(0);
        let compute = |_: &ParameterBag| {
            calls.set(calls.get() + 1);
            Ok(vec![1.0, 2.0])
        };

        let first = cache.get_or_compute(&mut group, &key(), &bag(0.1), compute).unwrap();
        let second = cache.get_or_compute(&mut group, &key(), &bag(0.1), compute).unwrap();

        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(group.get_entity(&key()).unwrap().version(), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
        assert!((cache.stats().hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_ignores_insertion_order() {
        let mut cache = ComputationCache::new();
        let mut group = GroupRecord::new("fwd", vec![1]);
        let calls = Cell::new(0);
        let compute = |_: &ParameterBag| {
            calls.set(calls.get() + 1);
            Ok(0u8)
        };

        let reversed = ParameterBag::new().with("TimeMax", 5.0).with("TimeMin", 0.1);
        cache.get_or_compute(&mut group, &key(), &bag(0.1), compute).unwrap();
        cache.get_or_compute(&mut group, &key(), &reversed, compute).unwrap();

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_changed_field_forces_one_recompute() {
        let mut cache = ComputationCache::new();
        let mut group = GroupRecord::new("fwd", vec![1]);
        let calls = Cell::new(0);
        let compute = |b: &ParameterBag| {
            calls.set(calls.get() + 1);
            Ok(b.get("TimeMin").map(ToString::to_string).unwrap_or_default())
        };

        cache.get_or_compute(&mut group, &key(), &bag(0.1), compute).unwrap();
        let changed = cache.get_or_compute(&mut group, &key(), &bag(0.2), compute).unwrap();
        cache.get_or_compute(&mut group, &key(), &bag(0.2), compute).unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(*changed, "0.2");
        assert_eq!(group.get_entity(&key()).unwrap().version(), 2);
    }

    #[test]
    fn test_failure_preserves_existing_entity() {
        let mut cache = ComputationCache::new();
        let mut group = GroupRecord::new("fwd", vec![1]);

        let good = cache
            .get_or_compute(&mut group, &key(), &bag(0.1), |_| Ok("good".to_string()))
            .unwrap();
        let fp_before = group.get_entity(&key()).unwrap().fingerprint().clone();

        let err = cache
            .get_or_compute(&mut group, &key(), &bag(0.2), |_| {
                Err(ComputeFailure::new("transform crashed"))
            })
            .unwrap_err();

        match &err {
            Error::Computation { unit, message } => {
                assert_eq!(unit, "fwd/counts/19489/raw");
                assert_eq!(message, "transform crashed");
            }
            other => panic!("unexpected error: {other}"),
        }

        let entity = group.get_entity(&key()).unwrap();
        assert_eq!(entity.fingerprint(), &fp_before);
        assert!(Arc::ptr_eq(entity.data(), &good));
        assert_eq!(entity.version(), 1);
        assert_eq!(cache.stats().failures, 1);
    }

    #[test]
    fn test_failure_on_absent_slot_stores_nothing() {
        let mut cache = ComputationCache::new();
        let mut group: GroupRecord<u8> = GroupRecord::new("fwd", vec![1]);

        let result = cache.get_or_compute(&mut group, &key(), &bag(0.1), |_| Err("nope".into()));

        assert!(result.is_err());
        assert!(group.get_entity(&key()).is_none());
    }

    #[test]
    fn test_invalid_bag_fails_before_compute() {
        let mut cache = ComputationCache::new();
        let mut group: GroupRecord<u8> = GroupRecord::new("fwd", vec![1]);
        let called = Cell::new(false);

        let err = cache
            .get_or_compute(&mut group, &key(), &bag(f64::NAN), |_| {
                called.set(true);
                Ok(0)
            })
            .unwrap_err();

        assert!(matches!(err, Error::InvalidParameter(_)));
        assert!(!called.get());
        assert_eq!(cache.stats(), &CacheStats::default());
    }

    #[test]
    fn test_unsupported_kind_fails_before_compute() {
        let mut cache = ComputationCache::new();
        let mut pair: PairRecord<u8> = PairRecord::new("long", "fwd", "bwd", 1.0).unwrap();
        let called = Cell::new(false);

        let result = cache.get_or_compute(&mut pair, &key(), &bag(0.1), |_| {
            called.set(true);
            Ok(0)
        });

        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert!(!called.get());
    }

    #[test]
    fn test_visibility_change_does_not_recompute() {
        let mut cache = ComputationCache::new();
        let mut group = GroupRecord::new("fwd", vec![1]);
        let calls = Cell::new(0);
        let compute = |_: &ParameterBag| {
            calls.set(calls.get() + 1);
            Ok(1u32)
        };

        cache.get_or_compute(&mut group, &key(), &bag(0.1), compute).unwrap();
        group.set_visible(&key(), true);
        group.set_visible(&key(), false);
        cache.get_or_compute(&mut group, &key(), &bag(0.1), compute).unwrap();

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_works_through_trait_object() {
        let mut cache = ComputationCache::new();
        let mut group = GroupRecord::new("fwd", vec![1]);
        let slots: &mut dyn DerivedSlots<u8> = &mut group;

        let value = cache.get_or_compute(slots, &key(), &bag(0.1), |_| Ok(9)).unwrap();

        assert_eq!(*value, 9);
    }
}
