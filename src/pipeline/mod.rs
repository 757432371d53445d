//! Recipe run orchestration.
//!
//! # Pipeline Flow
//!
//! 1. **Load**: the recipe file is read and filtered by recipe name
//! 2. **Validate**: every recipe is checked; any problem aborts the run
//! 3. **Expand**: list-valued properties become separate jobs
//! 4. **Sequence**: jobs get observation times and artifact names
//! 5. **Dispatch**: the engine runs each job, bounded by the worker count
//! 6. **Calibrate**: darks and flats are inferred from the science jobs,
//!    optionally dumped, then sequenced and dispatched on the same timeline
//! 7. **Reconcile**: artifact headers are corrected in place
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rawforge::pipeline::{RecipeRunner, RunConfig};
//! use rawforge::simulation::{JsonArtifactStore, ProcessSimulator, SimulationContext};
//!
//! let config = RunConfig::from_env()?
//!     .with_input("YAML/recipes.yaml")
//!     .with_calibration_count(1)
//!     .with_worker_count(4);
//!
//! let context = Arc::new(SimulationContext::new());
//! let simulator = Arc::new(ProcessSimulator::new(Arc::clone(&context)));
//! let runner = RecipeRunner::new(config, context, simulator, Arc::new(JsonArtifactStore));
//!
//! let summary = runner.run().await?;
//! println!("{} artifacts", summary.files.len());
//! ```

pub mod config;
pub mod runner;

pub use config::{parse_timing, split_list, ConfigError, RunConfig};
pub use runner::{expand, schedule, RecipeRunner, RunError, RunSummary};
