//! rawforge: simulated raw-frame generator for the METIS instrument.
//!
//! This library turns observation recipes into time-stamped simulation
//! jobs, drives an external simulation engine for each, infers the
//! calibrations the science frames need, and corrects artifact headers.

pub mod calibration;
pub mod cli;
pub mod error;
pub mod export;
pub mod headers;
pub mod pipeline;
pub mod recipe;
pub mod scheduler;
pub mod simulation;
pub mod validation;

// Re-export commonly used error types
pub use error::{
    DesignError, DispatchError, HeaderError, RecipeError, SequenceError, SimulationError,
    SummaryError,
};
