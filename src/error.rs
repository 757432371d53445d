//! Error types for rawforge operations.
//!
//! Defines error types for the major subsystems:
//! - Recipe loading and category filtering
//! - Observation time sequencing
//! - Simulation engine invocation and job dispatch
//! - Artifact header reconciliation
//! - Design-document consistency checks
//! - Artifact summary tables

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading and selecting recipes.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Failed to parse recipe file '{path}': {message}")]
    ParseError { path: String, message: String },

    #[error("Recipe file '{0}' must be a mapping of recipe name to template")]
    NotAMapping(String),

    #[error("'{0}' is not a supported product category")]
    UnknownCategoryFilter(String),

    #[error("Invalid recipe '{recipe}': {message}")]
    InvalidTemplate { recipe: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised while assigning observation timestamps.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("No usable start time for recipe '{recipe}': set dateobs or enable sequence mode")]
    MissingStartTime { recipe: String },

    #[error("Invalid timestamp '{value}': expected YYYY-MM-DD HH:MM:SS")]
    InvalidTimestamp { value: String },

    #[error("Observation time overflowed while sequencing recipe '{recipe}'")]
    Overflow { recipe: String },
}

/// Errors raised by a simulation engine for a single job.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Failed to start simulation engine '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Simulation engine exited with {status}: {stderr}")]
    EngineFailed { status: String, stderr: String },

    #[error("Simulation engine timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Simulation engine returned an unreadable artifact: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while dispatching a batch of jobs.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Job '{filename}' failed: {source}")]
    JobFailed {
        filename: String,
        #[source]
        source: SimulationError,
    },

    #[error("{failed} of {total} jobs failed")]
    BatchFailed { failed: usize, total: usize },

    #[error("Worker task panicked: {0}")]
    WorkerPanicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading, correcting or writing artifacts.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("Artifact '{0}' has no primary header")]
    EmptyArtifact(PathBuf),

    #[error("Failed to read artifact '{path}': {message}")]
    ReadFailed { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while loading the design-document model.
#[derive(Debug, Error)]
pub enum DesignError {
    #[error("Failed to parse design document '{path}': {message}")]
    ParseError { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while writing an artifact summary table.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Failed to read artifact: {0}")]
    Header(#[from] HeaderError),

    #[error("Failed to write summary: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
