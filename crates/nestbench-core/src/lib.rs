//! # nestbench core
//!
//! Network-free building blocks of the nestbench benchmarker:
//! - `asset` - ground-truth chairs and estates and the concurrent store holding them
//! - `condition` - valid search filters for generating satisfiable queries
//! - `geometry` - convex hulls for the spatial search
//! - `fails` - error severities and the run-wide error aggregator
//! - `score` - score counter and load level controller
//! - `parameter` - tunable timings, page sizes and the worker ramp
//!
//! ```text
//!   fixtures ──► AssetStore ─────┐
//!            └─► ConditionCatalog ┴─► scenarios ──► ErrorAggregator
//!                                          └──────► LevelController
//! ```

pub mod asset;
pub mod condition;
pub mod error;
pub mod fails;
pub mod geometry;
pub mod parameter;
pub mod score;

pub use error::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::asset::{
        AssetStore, Chair, ChairAttributes, Estate, EstateAttributes, Stockable, Viewable,
    };
    pub use crate::condition::{ChairSearchCondition, ConditionCatalog, EstateSearchCondition};
    pub use crate::error::{AssetKind, BenchError, Result};
    pub use crate::fails::{ErrorAggregator, ScenarioError, ScenarioLabel, Severity};
    pub use crate::geometry::Point;
    pub use crate::parameter::{Parameters, WorkerMix};
    pub use crate::score::LevelController;
}
