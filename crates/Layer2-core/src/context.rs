//! Analysis context
//!
//! Ties the grouping collection, session state, loaded runs, the transform
//! and the computation cache together. Every request assembles a fresh
//! parameter bag and goes through [`ComputationCache::get_or_compute`].
//!
//! ## Usage
//! ```ignore
//! let mut ctx = AnalysisContextBuilder::new()
//!     .state(SessionState::default().rebin(RebinSpec::fixed(2.0)))
//!     .group("fwd", (1..=48).collect())
//!     .group("bwd", (49..=96).collect())
//!     .pair("long", "fwd", "bwd", 1.0)
//!     .run(run_spec)
//!     .build(transform)?;
//!
//! let report = ctx.calculate_all_groups();
//! for failure in &report.failures {
//!     eprintln!("{failure}");
//! }
//! ```

use muse_foundation::{
    CacheSettings, Error, GroupSpec, PairSpec, Result, RunKey, RunSpec, SessionConfig,
    SessionState,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assembler::{ParameterAssembler, RunCatalog, RunDataSource};
use crate::cache::{CacheStats, ComputationCache};
use crate::collection::GroupPairCollection;
use crate::record::{OutputKind, SlotKey, Variant};
use crate::transform::Transform;

// ============================================================================
// Batch results
// ============================================================================

/// One independently computed unit of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitId {
    pub record: String,
    pub kind: OutputKind,
    pub run: RunKey,
    pub variant: Variant,
}

impl UnitId {
    pub fn new(record: impl Into<String>, kind: OutputKind, run: RunKey, variant: Variant) -> Self {
        Self {
            record: record.into(),
            kind,
            run,
            variant,
        }
    }

    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.kind, self.run.clone(), self.variant)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.record, self.kind, self.run, self.variant)
    }
}

/// A unit that did not complete
#[derive(Debug)]
pub struct UnitFailure {
    pub unit: UnitId,
    pub error: Error,
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.unit, self.error)
    }
}

/// Outcome of a batch; failing units never abort their siblings
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<UnitId>,
    pub failures: Vec<UnitFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Names of records with at least one failed unit, in failure order
    pub fn failed_records(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for failure in &self.failures {
            if !names.contains(&failure.unit.record.as_str()) {
                names.push(&failure.unit.record);
            }
        }
        names
    }

    fn push(&mut self, unit: UnitId, result: Result<()>) {
        match result {
            Ok(()) => self.completed.push(unit),
            Err(error) => self.failures.push(UnitFailure { unit, error }),
        }
    }

    fn log(&self, what: &str) {
        if self.is_success() {
            debug!(batch = what, completed = self.completed.len(), "Batch finished");
        } else {
            warn!(
                batch = what,
                completed = self.completed.len(),
                failed = self.failures.len(),
                "Batch finished with failures"
            );
        }
    }
}

/// Both outputs of one group for one run/variant, attempted independently
#[derive(Debug)]
pub struct GroupOutput<T> {
    pub counts: Result<Arc<T>>,
    pub asymmetry: Result<Arc<T>>,
}

// ============================================================================
// AnalysisContext
// ============================================================================

/// The application core of one analysis session
pub struct AnalysisContext<X: Transform> {
    collection: GroupPairCollection<X::Product>,
    state: SessionState,
    runs: RunCatalog,
    transform: X,
    cache: ComputationCache,
}

impl<X: Transform> AnalysisContext<X> {
    pub fn new(transform: X) -> Self {
        Self {
            collection: GroupPairCollection::new(),
            state: SessionState::default(),
            runs: RunCatalog::new(),
            transform,
            cache: ComputationCache::new(),
        }
    }

    /// Build from a loaded session description
    pub fn from_config(config: &SessionConfig, transform: X) -> Result<Self> {
        config.validate()?;
        let context = Self {
            collection: GroupPairCollection::from_specs(&config.groups, &config.pairs)?,
            state: config.session.clone(),
            runs: RunCatalog::from_specs(config.runs.iter().cloned())?,
            transform,
            cache: ComputationCache::with_settings(config.cache.clone()),
        };
        info!(
            groups = context.collection.group_names().len(),
            pairs = context.collection.pair_names().len(),
            runs = context.runs.len(),
            rebin = context.do_rebin(),
            "Analysis context ready"
        );
        Ok(context)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn collection(&self) -> &GroupPairCollection<X::Product> {
        &self.collection
    }

    pub fn collection_mut(&mut self) -> &mut GroupPairCollection<X::Product> {
        &mut self.collection
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Session state; changes are picked up by the next request's fingerprint
    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn runs(&self) -> &RunCatalog {
        &self.runs
    }

    pub fn load_run(&mut self, spec: RunSpec) -> Result<RunKey> {
        let key = self.runs.load(spec)?;
        debug!(run = %key, "Loaded run data");
        Ok(key)
    }

    pub fn unload_run(&mut self, run: &RunKey) -> Option<RunSpec> {
        self.runs.unload(run)
    }

    pub fn current_runs(&self) -> Vec<RunKey> {
        self.runs.current_runs()
    }

    pub fn transform(&self) -> &X {
        &self.transform
    }

    pub fn cache_stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    pub fn cache_settings(&self) -> &CacheSettings {
        self.cache.settings()
    }

    /// Replace the grouping scheme, dropping every derived entity
    pub fn reset_grouping(&mut self, groups: &[GroupSpec], pairs: &[PairSpec]) -> Result<()> {
        self.collection.reset(groups, pairs)
    }

    fn assembler(&self) -> ParameterAssembler<'_> {
        ParameterAssembler::new(&self.state, &self.runs)
    }

    pub fn first_good_data(&self, run: &RunKey) -> f64 {
        self.assembler().first_good_data(run)
    }

    pub fn last_good_data(&self, run: &RunKey) -> f64 {
        self.assembler().last_good_data(run)
    }

    pub fn do_rebin(&self) -> bool {
        self.assembler().do_rebin()
    }

    /// Variants produced by the batch drivers
    pub fn variants(&self) -> Vec<Variant> {
        if self.do_rebin() && self.cache.settings().compute_rebinned {
            vec![Variant::Raw, Variant::Rebinned]
        } else {
            vec![Variant::Raw]
        }
    }

    // ========================================================================
    // Single requests
    // ========================================================================

    /// Counts or asymmetry of one group
    pub fn calculate_group_output(
        &mut self,
        name: &str,
        run: &RunKey,
        variant: Variant,
        kind: OutputKind,
    ) -> Result<Arc<X::Product>> {
        let assembler = ParameterAssembler::new(&self.state, &self.runs);
        let group = self.collection.group_mut(name)?;
        let bag = match kind {
            OutputKind::Counts => assembler.group_counts_request(group, run, variant)?,
            OutputKind::Asymmetry => assembler.group_asymmetry_request(group, run, variant)?,
        };

        let transform = &self.transform;
        self.cache.get_or_compute(
            group,
            &SlotKey::new(kind, run.clone(), variant),
            &bag,
            |params| match kind {
                OutputKind::Counts => transform.group_counts(params),
                OutputKind::Asymmetry => transform.group_asymmetry(params),
            },
        )
    }

    /// Counts and asymmetry of one group; a counts failure does not skip
    /// the asymmetry
    pub fn calculate_group(
        &mut self,
        name: &str,
        run: &RunKey,
        variant: Variant,
    ) -> GroupOutput<X::Product> {
        GroupOutput {
            counts: self.calculate_group_output(name, run, variant, OutputKind::Counts),
            asymmetry: self.calculate_group_output(name, run, variant, OutputKind::Asymmetry),
        }
    }

    /// Asymmetry of one pair
    pub fn calculate_pair(
        &mut self,
        name: &str,
        run: &RunKey,
        variant: Variant,
    ) -> Result<Arc<X::Product>> {
        let assembler = ParameterAssembler::new(&self.state, &self.runs);
        let bag = {
            let pair = self.collection.pair(name)?;
            assembler.pair_asymmetry_request(pair, &self.collection, run, variant)?
        };

        let transform = &self.transform;
        let pair = self.collection.pair_mut(name)?;
        self.cache.get_or_compute(
            pair,
            &SlotKey::asymmetry(run.clone(), variant),
            &bag,
            |params| transform.pair_asymmetry(params),
        )
    }

    // ========================================================================
    // Batches
    // ========================================================================

    /// Every group × current run × variant, counts and asymmetry separately
    pub fn calculate_all_groups(&mut self) -> BatchReport {
        let mut report = BatchReport::default();
        let variants = self.variants();

        for run in self.current_runs() {
            for name in self.collection.group_names() {
                for &variant in &variants {
                    for kind in [OutputKind::Counts, OutputKind::Asymmetry] {
                        let result = self
                            .calculate_group_output(&name, &run, variant, kind)
                            .map(|_| ());
                        report.push(UnitId::new(&name, kind, run.clone(), variant), result);
                    }
                }
            }
        }

        report.log("groups");
        report
    }

    /// Every pair × current run × variant
    pub fn calculate_all_pairs(&mut self) -> BatchReport {
        let mut report = BatchReport::default();
        let variants = self.variants();

        for run in self.current_runs() {
            for name in self.collection.pair_names() {
                for &variant in &variants {
                    let result = self.calculate_pair(&name, &run, variant).map(|_| ());
                    report.push(
                        UnitId::new(&name, OutputKind::Asymmetry, run.clone(), variant),
                        result,
                    );
                }
            }
        }

        report.log("pairs");
        report
    }

    /// Calculate all groups, then show every completed unit under the name
    /// returned by `naming`
    pub fn show_all_groups<F>(&mut self, naming: F) -> BatchReport
    where
        F: FnMut(&UnitId) -> String,
    {
        let report = self.calculate_all_groups();
        self.show_completed(&report, naming);
        report
    }

    pub fn show_all_pairs<F>(&mut self, naming: F) -> BatchReport
    where
        F: FnMut(&UnitId) -> String,
    {
        let report = self.calculate_all_pairs();
        self.show_completed(&report, naming);
        report
    }

    fn show_completed<F>(&mut self, report: &BatchReport, mut naming: F)
    where
        F: FnMut(&UnitId) -> String,
    {
        for unit in &report.completed {
            let Ok(slots) = self.collection.slots_mut(&unit.record) else {
                continue;
            };
            if let Some(entity) = slots.get_entity_mut(&unit.slot_key()) {
                entity.show(naming(unit));
            }
        }
    }

    // ========================================================================
    // Display state
    // ========================================================================

    /// Set visibility of one entity; `Ok(false)` when the slot is empty
    pub fn set_visible(&mut self, record: &str, key: &SlotKey, visible: bool) -> Result<bool> {
        Ok(self.collection.slots_mut(record)?.set_visible(key, visible))
    }

    /// Display names of visible asymmetry entities across groups then
    /// pairs, for the current runs
    pub fn visible_asymmetry_names(&self, variant: Variant) -> Vec<String> {
        let runs = self.current_runs();
        let groups = self
            .collection
            .groups()
            .flat_map(|g| g.visible_asymmetry_names(&runs, variant));
        let pairs = self
            .collection
            .pairs()
            .flat_map(|p| p.visible_asymmetry_names(&runs, variant));
        groups.chain(pairs).collect()
    }

    /// Display name of the other variant of the entity shown as `name`
    pub fn counterpart_display_name(&self, name: &str) -> Option<&str> {
        self.collection
            .groups()
            .find_map(|g| g.counterpart_display_name(name))
            .or_else(|| {
                self.collection
                    .pairs()
                    .find_map(|p| p.counterpart_display_name(name))
            })
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`AnalysisContext`]
#[derive(Debug, Default)]
pub struct AnalysisContextBuilder {
    config: SessionConfig,
}

impl AnalysisContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: SessionState) -> Self {
        self.config.session = state;
        self
    }

    pub fn group(mut self, name: impl Into<String>, detectors: Vec<u32>) -> Self {
        self.config.groups.push(GroupSpec {
            name: name.into(),
            detectors,
        });
        self
    }

    pub fn pair(
        mut self,
        name: impl Into<String>,
        forward: impl Into<String>,
        backward: impl Into<String>,
        alpha: f64,
    ) -> Self {
        self.config.pairs.push(PairSpec {
            name: name.into(),
            forward: forward.into(),
            backward: backward.into(),
            alpha,
        });
        self
    }

    pub fn run(mut self, spec: RunSpec) -> Self {
        self.config.runs.push(spec);
        self
    }

    pub fn cache_settings(mut self, settings: CacheSettings) -> Self {
        self.config.cache = settings;
        self
    }

    pub fn build<X: Transform>(self, transform: X) -> Result<AnalysisContext<X>> {
        AnalysisContext::from_config(&self.config, transform)
    }
}
