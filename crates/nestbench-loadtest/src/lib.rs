//! # nestbench load testing
//!
//! Drives a chair and estate search service the way its users would and
//! checks every answer against an in-memory ground truth.
//!
//! ## Phases
//!
//! 1. **Prepare**: load fixture assets, search conditions and draft files
//! 2. **Initialize**: `POST /initialize` resets the target
//! 3. **Verify**: replay captured request/response snapshots; any mismatch ends the run
//! 4. **Load**: waves of simulated users, growing with the load level
//! 5. **Score**: successful flows minus the application-error penalty
//!
//! ## Usage
//!
//! ```bash
//! nestbench --target-url http://127.0.0.1:8000 \
//!     --data-dir initial-data --fixture-dir ../webapp/fixture
//!
//! # shorter load phase, debug logs
//! nestbench --load-secs 10 --verbose
//! ```

pub mod client;
pub mod config;
pub mod load;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod verify;

pub use client::{ClientFactory, Target, WebappClient};
pub use config::{BenchConfig, ConfigError, LogFormat};
pub use load::{LoadOrchestrator, LoadSummary};
pub use metrics::{MetricsSummary, RequestMetrics};
pub use report::BenchResult;
pub use runner::{BenchRunner, RunError, RunReport};
pub use verify::SnapshotVerifier;
