//! Boundary to the external optical/detector simulation engine.
//!
//! The engine is a black box: it receives a [`SimulationRequest`] and writes
//! one artifact. [`Simulator`] is the seam; [`ProcessSimulator`] drives an
//! engine executable, and tests plug in in-process fakes.
//!
//! Process-wide engine settings live in a [`SimulationContext`] built once
//! and shared through an `Arc`.

pub mod artifact;
pub mod process;

pub use artifact::{Artifact, ArtifactStore, Card, Hdu, Header, HeaderValue, JsonArtifactStore};
pub use process::ProcessSimulator;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::recipe::{InstrumentMode, SourceSpec};
use crate::scheduler::filename::DEFAULT_INSTRUMENT;

/// Seed passed to every engine run so datasets are reproducible.
pub const DEFAULT_RANDOM_SEED: u64 = 9001;

/// Default engine executable.
pub const DEFAULT_ENGINE_PROGRAM: &str = "metis-simulate";

/// Arguments for one engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Destination file, or `None` to skip persistence.
    pub output_path: Option<PathBuf>,
    pub mode: InstrumentMode,
    /// Flat namespaced configuration (`OBS.dit`, `SIM.random.seed`, ...).
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub source: SourceSpec,
    /// Shrink the detector for fast validation runs.
    pub small: bool,
    /// Local instrument package directory, if not the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<PathBuf>,
}

impl SimulationRequest {
    /// Label used in logs and errors.
    pub fn label(&self) -> String {
        self.output_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("<{} in memory>", self.mode))
    }
}

/// External simulation engine.
#[async_trait]
pub trait Simulator: Send + Sync {
    /// Runs one simulation, returning the artifact that was written.
    async fn simulate(&self, request: &SimulationRequest) -> Result<Artifact, SimulationError>;
}

/// How to launch the engine executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for EngineCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_ENGINE_PROGRAM.to_string(),
            args: Vec::new(),
        }
    }
}

/// Process-wide simulation settings.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    pub engine: EngineCommand,
    pub packages: Option<PathBuf>,
    pub random_seed: u64,
    pub instrument: String,
}

impl Default for SimulationContext {
    fn default() -> Self {
        Self {
            engine: EngineCommand::default(),
            packages: None,
            random_seed: DEFAULT_RANDOM_SEED,
            instrument: DEFAULT_INSTRUMENT.to_string(),
        }
    }
}

impl SimulationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.engine = EngineCommand {
            program: program.into(),
            args,
        };
        self
    }

    pub fn with_packages(mut self, packages: impl Into<PathBuf>) -> Self {
        self.packages = Some(packages.into());
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_instrument(mut self, instrument: impl Into<String>) -> Self {
        self.instrument = instrument.into();
        self
    }
}
