//! Job sequencing and dispatch.
//!
//! This module turns expanded jobs into executed simulations:
//!
//! - **TimeSequencer**: assigns observation times and output filenames
//! - **FilenameGenerator**: deterministic artifact names
//! - **JobDispatcher**: runs the engine for each job with bounded concurrency
//!
//! # Architecture
//!
//! ```text
//!   ExpandedJob ──► TimeSequencer ──► TimestampedJob ──► JobDispatcher
//!                    (time, name)                          │
//!                                       ┌──────────────────┼──────────────────┐
//!                                       ▼                  ▼                  ▼
//!                                  ┌─────────┐        ┌─────────┐        ┌─────────┐
//!                                  │ Engine 1│        │ Engine 2│        │ Engine N│
//!                                  └─────────┘        └─────────┘        └─────────┘
//! ```
//!
//! Times and names are fixed before anything runs, so the order in which
//! engines finish never matters.

pub mod dispatcher;
pub mod filename;
pub mod job;
pub mod sequencer;

pub use dispatcher::{DispatchConfig, DispatchReport, FailurePolicy, JobDispatcher, JobOutcome};
pub use filename::FilenameGenerator;
pub use job::{ProducedFile, TimestampedJob};
pub use sequencer::{TimeSequencer, TimingMode, DEFAULT_SEQUENCE_START};
