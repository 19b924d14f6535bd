//! Shared collection for off-thread computation
//!
//! The collection sits behind a `parking_lot::Mutex` that is only held for
//! lookups and updates, never across an `.await`. Each slot additionally has
//! an async lock so the lookup-compute-update sequence for one slot runs at
//! most once at a time: concurrent requests for the same slot compute once,
//! requests for different slots proceed in parallel.
//!
//! Dropping a request future before it completes leaves the slot untouched.

use muse_foundation::{fingerprint, CacheSettings, Error, Fingerprint, ParameterBag, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex as SlotMutex;
use tracing::{debug, warn};

use crate::cache::{log_hit, CacheStats, Outcome};
use crate::collection::GroupPairCollection;
use crate::record::SlotKey;
use crate::transform::ComputeResult;

type SlotLocks = HashMap<(String, SlotKey), Arc<SlotMutex<()>>>;

/// Cloneable handle to a collection shared between tasks
pub struct SharedCollection<T> {
    collection: Arc<Mutex<GroupPairCollection<T>>>,
    slot_locks: Arc<Mutex<SlotLocks>>,
    stats: Arc<Mutex<CacheStats>>,
    settings: Arc<CacheSettings>,
}

impl<T> Clone for SharedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
            slot_locks: Arc::clone(&self.slot_locks),
            stats: Arc::clone(&self.stats),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<T> SharedCollection<T> {
    pub fn new(collection: GroupPairCollection<T>) -> Self {
        Self::with_settings(collection, CacheSettings::default())
    }

    pub fn with_settings(collection: GroupPairCollection<T>, settings: CacheSettings) -> Self {
        Self {
            collection: Arc::new(Mutex::new(collection)),
            slot_locks: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(Mutex::new(CacheStats::default())),
            settings: Arc::new(settings),
        }
    }

    /// Run `f` with the collection locked; `f` must not block
    pub fn with_collection<R>(&self, f: impl FnOnce(&mut GroupPairCollection<T>) -> R) -> R {
        f(&mut self.collection.lock())
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    fn slot_lock(&self, record: &str, key: &SlotKey) -> Arc<SlotMutex<()>> {
        let mut locks = self.slot_locks.lock();
        Arc::clone(
            locks
                .entry((record.to_string(), key.clone()))
                .or_insert_with(|| Arc::new(SlotMutex::new(()))),
        )
    }

    /// Stored product when its fingerprint matches, after checking that the
    /// record exists and supports the slot's kind
    fn lookup(
        &self,
        record: &str,
        key: &SlotKey,
        fp: &Fingerprint,
    ) -> Result<Option<Arc<T>>> {
        let collection = self.collection.lock();
        let slots = collection.slots(record)?;

        if let Some(entity) = slots.get_entity(key) {
            if entity.matches(fp) {
                log_hit(&self.settings, record, key, entity.version());
                return Ok(Some(Arc::clone(entity.data())));
            }
        }
        if !slots.supports(key.kind) {
            return Err(Error::InvalidParameter(format!(
                "{record} has no {} output",
                key.kind
            )));
        }
        Ok(None)
    }

    /// Async counterpart of [`crate::ComputationCache::get_or_compute`]
    ///
    /// The record is addressed by name because no borrow of the collection
    /// can live across the computation.
    pub async fn get_or_compute<F, Fut>(
        &self,
        record: &str,
        key: SlotKey,
        bag: ParameterBag,
        compute: F,
    ) -> Result<Arc<T>>
    where
        F: FnOnce(ParameterBag) -> Fut,
        Fut: Future<Output = ComputeResult<T>>,
    {
        let fp = fingerprint(&bag)?;

        let lock = self.slot_lock(record, &key);
        let _slot = lock.lock().await;

        if let Some(data) = self.lookup(record, &key, &fp)? {
            self.stats.lock().record(Outcome::Hit);
            return Ok(data);
        }

        debug!(record = %record, slot = %key, fingerprint = %fp.short(), "Computing derived product");

        let data = match compute(bag).await {
            Ok(data) => Arc::new(data),
            Err(failure) => {
                self.stats.lock().record(Outcome::Failed);
                let unit = format!("{record}/{key}");
                warn!(unit = %unit, error = %failure, "Computation failed, cached entity kept");
                return Err(Error::computation(unit, failure.message));
            }
        };

        self.stats.lock().record(Outcome::Computed);
        let mut collection = self.collection.lock();
        collection
            .slots_mut(record)?
            .update(&key, Arc::clone(&data), fp)?;
        Ok(data)
    }
}
