//! muse-core: derived-data cache for detector-group analysis
//!
//! Layer2 - records, cache and orchestration
//!
//! # Modules
//!
//! - `entity`: a computed product with its fingerprint and display state
//! - `record`: group and pair records and the `DerivedSlots` seam
//! - `collection`: all records of one grouping scheme
//! - `cache`: fingerprint-validated lookup-or-compute
//! - `assembler`: session state and run data turned into parameter bags
//! - `context`: single requests and batch drivers
//! - `shared`: async access with per-slot serialization
//! - `transform`: the numeric transform seam
//!
//! # Example
//!
//! ```ignore
//! use muse_core::{AnalysisContext, Variant};
//!
//! let mut ctx = AnalysisContext::from_config(&config, transform)?;
//! let run = ctx.current_runs()[0].clone();
//!
//! // computed once, then served from the cache
//! let first = ctx.calculate_pair("long", &run, Variant::Raw)?;
//! let again = ctx.calculate_pair("long", &run, Variant::Raw)?;
//! assert!(Arc::ptr_eq(&first, &again));
//!
//! // a session change flows into the bag and forces one recompute
//! ctx.state_mut().first_good_data_from_file = false;
//! ctx.state_mut().first_good_data = Some(0.2);
//! let fresh = ctx.calculate_pair("long", &run, Variant::Raw)?;
//! ```

pub mod assembler;
pub mod cache;
pub mod collection;
pub mod context;
pub mod entity;
pub mod record;
pub mod shared;
pub mod transform;

// Re-exports: Records
pub use entity::DerivedEntity;
pub use record::{
    normalize_detectors, parse_detector_list, DerivedSlots, GroupRecord, OutputKind, PairRecord,
    SlotKey, Variant,
};

// Re-exports: Collection
pub use collection::{GroupPairCollection, GroupingEntry};

// Re-exports: Cache
pub use cache::{CacheStats, ComputationCache};
pub use shared::SharedCollection;

// Re-exports: Assembly
pub use assembler::{ParameterAssembler, RunCatalog, RunDataSource};

// Re-exports: Context
pub use context::{
    AnalysisContext, AnalysisContextBuilder, BatchReport, GroupOutput, UnitFailure, UnitId,
};

// Re-exports: Transform
pub use transform::{ComputeFailure, ComputeResult, Transform};
