//! Parameter assembly
//!
//! Builds the request bag for one unit of work from explicit inputs only:
//! the [`SessionState`], the per-run values of a [`RunDataSource`] and the
//! records of the collection. Every input the transform reads ends up in the
//! bag, so a fingerprint match is a sufficient reuse test.

use muse_foundation::{
    run_key, DeadTimeSource, Error, ParamValue, ParameterBag, RebinMode, Result, RunKey,
    RunSpec, SessionState,
};

use crate::collection::GroupPairCollection;
use crate::record::{GroupRecord, PairRecord, Variant};

/// Section prefixes inside a request bag
pub const PRE_PROCESSING: &str = "pre_processing";
pub const GROUP_COUNTS: &str = "group_counts";
pub const GROUP_ASYMMETRY: &str = "group_asymmetry";
pub const PAIR_ASYMMETRY: &str = "pair_asymmetry";

// ============================================================================
// Run data
// ============================================================================

/// Read-only values of the loaded runs
pub trait RunDataSource {
    /// Loaded data for `run`, if any
    fn run_data(&self, run: &RunKey) -> Option<&RunSpec>;

    /// Runs currently selected for analysis, in display order
    fn current_runs(&self) -> Vec<RunKey>;

    fn workspace_id(&self, run: &RunKey) -> Option<&str> {
        self.run_data(run).map(|r| r.workspace.as_str())
    }

    fn first_good_data(&self, run: &RunKey) -> Option<f64> {
        self.run_data(run).map(|r| r.first_good_data)
    }

    fn time_zero(&self, run: &RunKey) -> Option<f64> {
        self.run_data(run).map(|r| r.time_zero)
    }

    fn x_max(&self, run: &RunKey) -> Option<f64> {
        self.run_data(run).map(|r| r.x_max)
    }

    fn x_step(&self, run: &RunKey) -> Option<f64> {
        self.run_data(run).map(|r| r.x_step)
    }

    fn dead_time_table(&self, run: &RunKey) -> Option<&str> {
        self.run_data(run).and_then(|r| r.dead_time_table.as_deref())
    }

    fn num_periods(&self, run: &RunKey) -> Option<u32> {
        self.run_data(run).map(|r| r.periods)
    }
}

/// In-memory run data keyed by [`RunKey`], in load order
#[derive(Debug, Clone, Default)]
pub struct RunCatalog {
    runs: Vec<(RunKey, RunSpec)>,
}

impl RunCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: impl IntoIterator<Item = RunSpec>) -> Result<Self> {
        let mut catalog = Self::new();
        for spec in specs {
            catalog.load(spec)?;
        }
        Ok(catalog)
    }

    /// Add or reload a run; a reload keeps the run's position
    pub fn load(&mut self, spec: RunSpec) -> Result<RunKey> {
        let key = run_key(&spec.runs)?;
        match self.runs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = spec,
            None => self.runs.push((key.clone(), spec)),
        }
        Ok(key)
    }

    pub fn unload(&mut self, run: &RunKey) -> Option<RunSpec> {
        let index = self.runs.iter().position(|(k, _)| k == run)?;
        Some(self.runs.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl RunDataSource for RunCatalog {
    fn run_data(&self, run: &RunKey) -> Option<&RunSpec> {
        self.runs.iter().find(|(k, _)| k == run).map(|(_, spec)| spec)
    }

    fn current_runs(&self) -> Vec<RunKey> {
        self.runs.iter().map(|(k, _)| k.clone()).collect()
    }
}

// ============================================================================
// Assembler
// ============================================================================

/// Session state plus run data, turned into parameter bags
pub struct ParameterAssembler<'a> {
    state: &'a SessionState,
    data: &'a dyn RunDataSource,
}

impl<'a> ParameterAssembler<'a> {
    pub fn new(state: &'a SessionState, data: &'a dyn RunDataSource) -> Self {
        Self { state, data }
    }

    /// First good data for `run`; 0.0 when nothing is loaded
    pub fn first_good_data(&self, run: &RunKey) -> f64 {
        let Some(file_value) = self.data.first_good_data(run) else {
            return 0.0;
        };
        if self.state.first_good_data_from_file {
            return file_value;
        }
        self.state.first_good_data.unwrap_or(file_value)
    }

    /// Last good data for `run`; 0.0 when nothing is loaded
    pub fn last_good_data(&self, run: &RunKey) -> f64 {
        let Some(x_max) = self.data.x_max(run) else {
            return 0.0;
        };
        let file_value = round_2dp(x_max);
        if self.state.last_good_data_from_file {
            return file_value;
        }
        self.state.last_good_data.unwrap_or(file_value)
    }

    /// Shift applied to the time axis; zero when using the file's time zero
    pub fn time_offset(&self, run: &RunKey) -> f64 {
        if self.state.time_zero_from_file {
            return 0.0;
        }
        match (self.data.time_zero(run), self.state.time_zero) {
            (Some(file), Some(user)) => file - user,
            _ => 0.0,
        }
    }

    pub fn dead_time_table(&self, run: &RunKey) -> Option<&'a str> {
        match &self.state.dead_time {
            DeadTimeSource::None => None,
            DeadTimeSource::FromTable { table } => Some(table.as_str()),
            DeadTimeSource::FromFile => self.data.dead_time_table(run),
        }
    }

    pub fn is_multi_period(&self, run: &RunKey) -> bool {
        self.data.num_periods(run).is_some_and(|n| n > 1)
    }

    /// Whether a rebinned variant is requested at all
    pub fn do_rebin(&self) -> bool {
        self.state.rebin.is_enabled()
    }

    // ========================================================================
    // Sections
    // ========================================================================

    /// Pre-processing parameters shared by every unit of one run/variant
    pub fn pre_processing(&self, run: &RunKey, variant: Variant) -> Result<ParameterBag> {
        let workspace = self
            .data
            .workspace_id(run)
            .ok_or_else(|| Error::NotFound(format!("no data loaded for run {run}")))?;

        let mut bag = ParameterBag::new()
            .with("InputWorkspace", workspace)
            .with("TimeMin", self.first_good_data(run))
            .with("TimeMax", self.last_good_data(run))
            .with("TimeOffset", self.time_offset(run));

        if let Some(table) = self.dead_time_table(run) {
            bag.insert("DeadTimeTable", table);
        }

        if variant.is_rebinned() {
            if let Some(args) = self.rebin_args(run) {
                bag.insert("RebinArgs", args);
            }
        }
        Ok(bag)
    }

    fn rebin_args(&self, run: &RunKey) -> Option<ParamValue> {
        let rebin = &self.state.rebin;
        match rebin.mode {
            RebinMode::None => None,
            RebinMode::Fixed => rebin
                .fixed_factor
                .filter(|f| *f != 0.0)
                .zip(self.data.x_step(run))
                .map(|(f, step)| ParamValue::from(f * step)),
            RebinMode::Variable => rebin
                .variable
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(ParamValue::from),
        }
    }

    fn insert_periods(&self, bag: &mut ParameterBag, run: &RunKey) {
        let multi = self.is_multi_period(run);
        let summed = match (&self.state.summed_periods, multi) {
            (Some(summed), true) => summed.as_str(),
            _ => "1",
        };
        let subtracted = match (&self.state.subtracted_periods, multi) {
            (Some(subtracted), true) => subtracted.as_str(),
            _ => "",
        };
        bag.insert("SummedPeriods", summed);
        bag.insert("SubtractedPeriods", subtracted);
    }

    pub fn group_counts<T>(&self, group: &GroupRecord<T>, run: &RunKey) -> ParameterBag {
        let mut bag = ParameterBag::new();
        self.insert_periods(&mut bag, run);
        bag.insert("GroupName", group.name());
        bag.insert("Grouping", group.grouping_string());
        bag
    }

    pub fn group_asymmetry<T>(&self, group: &GroupRecord<T>, run: &RunKey) -> ParameterBag {
        let time_min = self
            .state
            .group_range_min
            .unwrap_or_else(|| self.data.first_good_data(run).unwrap_or(0.0));
        let time_max = self
            .state
            .group_range_max
            .unwrap_or_else(|| self.data.x_max(run).unwrap_or(0.0));

        let mut bag = ParameterBag::new()
            .with("AsymmetryTimeMin", time_min)
            .with("AsymmetryTimeMax", time_max);
        self.insert_periods(&mut bag, run);
        bag.insert("GroupName", group.name());
        bag.insert("Grouping", group.grouping_string());
        bag
    }

    /// Pair parameters; the referenced groups are resolved by name
    pub fn pair_asymmetry<T>(
        &self,
        pair: &PairRecord<T>,
        collection: &GroupPairCollection<T>,
        run: &RunKey,
    ) -> Result<ParameterBag> {
        let forward = collection.group(pair.forward_group())?;
        let backward = collection.group(pair.backward_group())?;

        let mut bag = ParameterBag::new();
        self.insert_periods(&mut bag, run);
        bag.insert("SpecifyGroupsManually", true);
        bag.insert("PairName", pair.name());
        bag.insert("Group1", detector_list(forward));
        bag.insert("Group2", detector_list(backward));
        bag.insert("Alpha", pair.alpha());
        Ok(bag)
    }

    // ========================================================================
    // Request bags
    // ========================================================================

    pub fn group_counts_request<T>(
        &self,
        group: &GroupRecord<T>,
        run: &RunKey,
        variant: Variant,
    ) -> Result<ParameterBag> {
        let mut bag = ParameterBag::new();
        bag.merge_section(PRE_PROCESSING, &self.pre_processing(run, variant)?);
        bag.merge_section(GROUP_COUNTS, &self.group_counts(group, run));
        Ok(bag)
    }

    pub fn group_asymmetry_request<T>(
        &self,
        group: &GroupRecord<T>,
        run: &RunKey,
        variant: Variant,
    ) -> Result<ParameterBag> {
        let mut bag = ParameterBag::new();
        bag.merge_section(PRE_PROCESSING, &self.pre_processing(run, variant)?);
        bag.merge_section(GROUP_ASYMMETRY, &self.group_asymmetry(group, run));
        Ok(bag)
    }

    pub fn pair_asymmetry_request<T>(
        &self,
        pair: &PairRecord<T>,
        collection: &GroupPairCollection<T>,
        run: &RunKey,
        variant: Variant,
    ) -> Result<ParameterBag> {
        let mut bag = ParameterBag::new();
        bag.merge_section(PRE_PROCESSING, &self.pre_processing(run, variant)?);
        bag.merge_section(PAIR_ASYMMETRY, &self.pair_asymmetry(pair, collection, run)?);
        Ok(bag)
    }
}

fn detector_list<T>(group: &GroupRecord<T>) -> ParamValue {
    group.detectors().iter().copied().collect()
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use muse_foundation::{fingerprint, RebinSpec, Scalar};

    fn emu_run() -> RunSpec {
        RunSpec {
            runs: vec![19489],
            workspace: "EMU19489_raw".to_string(),
            first_good_data: 0.113,
            time_zero: 0.55,
            x_max: 32.768_4,
            x_step: 0.016,
            dead_time_table: Some("EMU19489_dt".to_string()),
            periods: 1,
        }
    }

    fn catalog() -> RunCatalog {
        RunCatalog::from_specs([emu_run()]).unwrap()
    }

    fn run() -> RunKey {
        run_key(&[19489]).unwrap()
    }

    #[test]
    fn test_catalog_reload_keeps_position() {
        let mut catalog = RunCatalog::from_specs([
            emu_run(),
            RunSpec {
                runs: vec![19490],
                workspace: "EMU19490_raw".to_string(),
                ..emu_run()
            },
        ])
        .unwrap();

        let key = catalog
            .load(RunSpec {
                workspace: "EMU19489_reloaded".to_string(),
                ..emu_run()
            })
            .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.current_runs()[0], key);
        assert_eq!(catalog.workspace_id(&key), Some("EMU19489_reloaded"));
    }

    #[test]
    fn test_good_data_from_file() {
        let state = SessionState::default();
        let catalog = catalog();
        let assembler = ParameterAssembler::new(&state, &catalog);

        assert_eq!(assembler.first_good_data(&run()), 0.113);
        assert_eq!(assembler.last_good_data(&run()), 32.77);
    }

    #[test]
    fn test_good_data_override_and_unloaded() {
        let state = SessionState::default().first_good_data(0.5).last_good_data(10.0);
        let catalog = catalog();
        let assembler = ParameterAssembler::new(&state, &catalog);

        assert_eq!(assembler.first_good_data(&run()), 0.5);
        assert_eq!(assembler.last_good_data(&run()), 10.0);

        let missing = run_key(&[1]).unwrap();
        assert_eq!(assembler.first_good_data(&missing), 0.0);
        assert_eq!(assembler.last_good_data(&missing), 0.0);
    }

    #[test]
    fn test_override_without_value_falls_back_to_file() {
        let state = SessionState {
            first_good_data_from_file: false,
            ..SessionState::default()
        };
        let catalog = catalog();
        let assembler = ParameterAssembler::new(&state, &catalog);

        assert_eq!(assembler.first_good_data(&run()), 0.113);
        assert_eq!(state.first_good_data, None);
    }

    #[test]
    fn test_time_offset() {
        let catalog = catalog();

        let from_file = SessionState::default();
        assert_eq!(ParameterAssembler::new(&from_file, &catalog).time_offset(&run()), 0.0);

        let user = SessionState::default().time_zero(0.5);
        let offset = ParameterAssembler::new(&user, &catalog).time_offset(&run());
        assert!((offset - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_dead_time_sources() {
        let catalog = catalog();

        let none = SessionState::default();
        let bag = ParameterAssembler::new(&none, &catalog)
            .pre_processing(&run(), Variant::Raw)
            .unwrap();
        assert!(!bag.contains_key("DeadTimeTable"));

        let file = SessionState::default().dead_time(DeadTimeSource::FromFile);
        let bag = ParameterAssembler::new(&file, &catalog)
            .pre_processing(&run(), Variant::Raw)
            .unwrap();
        assert_eq!(bag.get("DeadTimeTable"), Some(&ParamValue::from("EMU19489_dt")));

        let table = SessionState::default().dead_time(DeadTimeSource::FromTable {
            table: "user_dt".to_string(),
        });
        let bag = ParameterAssembler::new(&table, &catalog)
            .pre_processing(&run(), Variant::Raw)
            .unwrap();
        assert_eq!(bag.get("DeadTimeTable"), Some(&ParamValue::from("user_dt")));
    }

    #[test]
    fn test_rebin_args_only_for_rebinned_variant() {
        let catalog = catalog();
        let state = SessionState::default().rebin(RebinSpec::fixed(2.0));
        let assembler = ParameterAssembler::new(&state, &catalog);

        let raw = assembler.pre_processing(&run(), Variant::Raw).unwrap();
        let rebinned = assembler.pre_processing(&run(), Variant::Rebinned).unwrap();

        assert!(!raw.contains_key("RebinArgs"));
        assert_eq!(rebinned.get("RebinArgs"), Some(&ParamValue::from(0.032)));

        let variable = SessionState::default().rebin(RebinSpec::variable("0,0.1,10"));
        let bag = ParameterAssembler::new(&variable, &catalog)
            .pre_processing(&run(), Variant::Rebinned)
            .unwrap();
        assert_eq!(bag.get("RebinArgs"), Some(&ParamValue::from("0,0.1,10")));
    }

    /// Source that serves a corrected workspace with a coarser binning
    struct Corrected(RunCatalog);

    impl RunDataSource for Corrected {
        fn run_data(&self, run: &RunKey) -> Option<&RunSpec> {
            self.0.run_data(run)
        }

        fn current_runs(&self) -> Vec<RunKey> {
            self.0.current_runs()
        }

        fn workspace_id(&self, run: &RunKey) -> Option<&str> {
            self.run_data(run).map(|_| "EMU19489_corrected")
        }

        fn x_step(&self, run: &RunKey) -> Option<f64> {
            self.run_data(run).map(|_| 0.5)
        }
    }

    #[test]
    fn test_pre_processing_reads_through_source_accessors() {
        let source = Corrected(catalog());
        let state = SessionState::default().rebin(RebinSpec::fixed(2.0));

        let bag = ParameterAssembler::new(&state, &source)
            .pre_processing(&run(), Variant::Rebinned)
            .unwrap();

        assert_eq!(bag.get("InputWorkspace"), Some(&ParamValue::from("EMU19489_corrected")));
        assert_eq!(bag.get("RebinArgs"), Some(&ParamValue::from(1.0)));
    }

    #[test]
    fn test_pre_processing_requires_loaded_run() {
        let state = SessionState::default();
        let catalog = RunCatalog::new();
        let result = ParameterAssembler::new(&state, &catalog)
            .pre_processing(&run(), Variant::Raw);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_periods_only_for_multi_period_data() {
        let state = SessionState::default().periods("1,2", "3");
        let group: GroupRecord<()> = GroupRecord::new("fwd", vec![2, 1]);

        let single = catalog();
        let bag = ParameterAssembler::new(&state, &single).group_counts(&group, &run());
        assert_eq!(bag.get("SummedPeriods"), Some(&ParamValue::from("1")));
        assert_eq!(bag.get("SubtractedPeriods"), Some(&ParamValue::from("")));
        assert_eq!(bag.get("Grouping"), Some(&ParamValue::from("1,2")));

        let multi = RunCatalog::from_specs([RunSpec {
            periods: 4,
            ..emu_run()
        }])
        .unwrap();
        let bag = ParameterAssembler::new(&state, &multi).group_counts(&group, &run());
        assert_eq!(bag.get("SummedPeriods"), Some(&ParamValue::from("1,2")));
        assert_eq!(bag.get("SubtractedPeriods"), Some(&ParamValue::from("3")));
    }

    #[test]
    fn test_group_asymmetry_range() {
        let catalog = catalog();
        let group: GroupRecord<()> = GroupRecord::new("fwd", vec![1]);

        let default = SessionState::default();
        let bag = ParameterAssembler::new(&default, &catalog).group_asymmetry(&group, &run());
        assert_eq!(bag.get("AsymmetryTimeMin"), Some(&ParamValue::from(0.113)));
        assert_eq!(bag.get("AsymmetryTimeMax"), Some(&ParamValue::from(32.768_4)));

        let ranged = SessionState::default().group_range(1.0, 8.0);
        let bag = ParameterAssembler::new(&ranged, &catalog).group_asymmetry(&group, &run());
        assert_eq!(bag.get("AsymmetryTimeMin"), Some(&ParamValue::from(1.0)));
        assert_eq!(bag.get("AsymmetryTimeMax"), Some(&ParamValue::from(8.0)));
    }

    #[test]
    fn test_pair_asymmetry_resolves_groups() {
        let mut collection: GroupPairCollection<()> = GroupPairCollection::new();
        collection.add_group(GroupRecord::new("fwd", vec![1, 2])).unwrap();
        collection.add_group(GroupRecord::new("bwd", vec![3])).unwrap();
        collection
            .add_pair(PairRecord::new("long", "fwd", "bwd", 1.2).unwrap())
            .unwrap();

        let state = SessionState::default();
        let catalog = catalog();
        let assembler = ParameterAssembler::new(&state, &catalog);
        let pair = collection.pair("long").unwrap();

        let bag = assembler.pair_asymmetry(pair, &collection, &run()).unwrap();

        assert_eq!(bag.get("SpecifyGroupsManually"), Some(&ParamValue::from(true)));
        assert_eq!(
            bag.get("Group1"),
            Some(&ParamValue::List(vec![Scalar::Int(1), Scalar::Int(2)]))
        );
        assert_eq!(bag.get("Alpha"), Some(&ParamValue::from(1.2)));
    }

    #[test]
    fn test_request_changes_with_group_detectors() {
        let state = SessionState::default();
        let catalog = catalog();
        let assembler = ParameterAssembler::new(&state, &catalog);
        let mut group: GroupRecord<()> = GroupRecord::new("fwd", vec![1, 2]);

        let before = assembler
            .group_counts_request(&group, &run(), Variant::Raw)
            .unwrap();
        group.set_detectors(vec![1, 2, 3]);
        let after = assembler
            .group_counts_request(&group, &run(), Variant::Raw)
            .unwrap();

        assert!(before.contains_key("pre_processing.TimeMin"));
        assert!(before.contains_key("group_counts.Grouping"));
        assert_ne!(fingerprint(&before).unwrap(), fingerprint(&after).unwrap());
    }

    #[test]
    fn test_request_changes_with_reloaded_data() {
        let state = SessionState::default();
        let mut catalog = catalog();
        let group: GroupRecord<()> = GroupRecord::new("fwd", vec![1]);

        let before = ParameterAssembler::new(&state, &catalog)
            .group_asymmetry_request(&group, &run(), Variant::Raw)
            .unwrap();
        catalog
            .load(RunSpec {
                workspace: "EMU19489_reloaded".to_string(),
                ..emu_run()
            })
            .unwrap();
        let after = ParameterAssembler::new(&state, &catalog)
            .group_asymmetry_request(&group, &run(), Variant::Raw)
            .unwrap();

        assert_ne!(fingerprint(&before).unwrap(), fingerprint(&after).unwrap());
    }
}
