//! End-to-end recipe run.
//!
//! Load, select and validate recipes; expand and time-stamp the science
//! jobs; dispatch them; derive, dump and dispatch calibrations on the same
//! timeline; finally reconcile the headers of every produced artifact.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::config::{ConfigError, RunConfig};
use crate::calibration::{CalibSet, CalibrationInferenceEngine};
use crate::error::{DispatchError, HeaderError, RecipeError, SequenceError};
use crate::headers::HeaderReconciler;
use crate::recipe::{ExpandedJob, ParameterExpander, RecipeLoader, RecipeSet};
use crate::scheduler::{
    DispatchConfig, DispatchReport, FilenameGenerator, JobDispatcher, TimeSequencer,
    TimestampedJob,
};
use crate::simulation::{ArtifactStore, SimulationContext, Simulator};
use crate::validation::{RecipeValidator, ValidationReport};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Recipe error: {0}")]
    Recipe(#[from] RecipeError),

    /// Recipes failed validation; every problem has been logged.
    #[error("Recipe validation failed with {problems} problem(s)")]
    Validation { problems: usize },

    #[error("Sequencing error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Header reconciliation error: {0}")]
    Header(#[from] HeaderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub science: DispatchReport,
    pub calibration: Option<DispatchReport>,
    /// Inferred calibration recipes; empty when calibrations are disabled.
    pub calibrations: CalibSet,
    /// Names of the artifacts produced (planned, on a dry run), sorted.
    pub files: Vec<String>,
    /// Artifacts whose headers were rewritten.
    pub reconciled: usize,
}

impl RunSummary {
    pub fn failed_count(&self) -> usize {
        self.science.failed_count()
            + self.calibration.as_ref().map_or(0, DispatchReport::failed_count)
    }

    pub fn job_count(&self) -> usize {
        self.science.produced.len()
            + self.calibration.as_ref().map_or(0, |r| r.produced.len())
    }
}

/// Drives one recipe run.
pub struct RecipeRunner {
    config: RunConfig,
    context: Arc<SimulationContext>,
    simulator: Arc<dyn Simulator>,
    store: Arc<dyn ArtifactStore>,
}

impl RecipeRunner {
    pub fn new(
        config: RunConfig,
        context: Arc<SimulationContext>,
        simulator: Arc<dyn Simulator>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            config,
            context,
            simulator,
            store,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Loads, selects and validates the configured recipe file.
    pub fn load_recipes(&self) -> Result<(RecipeSet, ValidationReport), RunError> {
        let raw = RecipeLoader::load_file(&self.config.input)?
            .select(self.config.categories.as_deref())?;
        let report = RecipeValidator::validate(&raw);
        report.log();
        if !report.is_valid() {
            return Err(RunError::Validation {
                problems: report.problems.len(),
            });
        }
        Ok((raw.into_recipe_set()?, report))
    }

    /// Runs the whole pipeline.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        self.config.validate()?;
        let (recipes, _) = self.load_recipes()?;
        info!(
            input = %self.config.input.display(),
            recipes = recipes.len(),
            dry_run = self.config.dry_run,
            "Starting recipe run"
        );

        let expander = ParameterExpander::new(self.config.expandable_keys.clone());
        let mut sequencer = TimeSequencer::new(self.config.timing, &self.config.output_dir)
            .with_filenames(FilenameGenerator::new(self.context.instrument.clone()));

        let science_jobs = expand(&expander, &recipes);
        let science = schedule(&mut sequencer, science_jobs.iter().cloned())?;

        if !self.config.dry_run {
            tokio::fs::create_dir_all(&self.config.output_dir).await?;
        }

        let dispatcher = JobDispatcher::new(
            Arc::clone(&self.simulator),
            Arc::clone(&self.context),
            DispatchConfig::default()
                .with_dry_run(self.config.dry_run)
                .with_worker_count(self.config.worker_count)
                .with_small(self.config.small)
                .with_failure_policy(self.config.failure_policy),
        );
        let science_report = dispatcher.dispatch(&science).await?;

        let mut calibrations = CalibSet::new();
        let mut calibration_report = None;
        if self.config.calibrations_enabled() {
            calibrations = CalibrationInferenceEngine::new(self.config.calibration_count)
                .infer(&science_jobs);
            info!(calibrations = calibrations.len(), "Calculated calibration set");

            if let Some(path) = &self.config.calib_dump {
                calibrations.write_yaml(path)?;
                info!(file = %path.display(), "Calibration recipes written");
            }

            sequencer.continue_in_sequence();
            let calibration_jobs =
                schedule(&mut sequencer, expand(&expander, &calibrations))?;
            calibration_report = Some(dispatcher.dispatch(&calibration_jobs).await?);
        }

        let reconciled = if self.config.dry_run {
            0
        } else {
            let reconciler = HeaderReconciler::new(Arc::clone(&self.store));
            let mut files = science_report.succeeded_files();
            if let Some(report) = &calibration_report {
                files.extend(report.succeeded_files());
            }
            reconciler.apply_all(files).await?
        };

        let mut files: Vec<String> = science_report
            .succeeded_files()
            .into_iter()
            .chain(calibration_report.iter().flat_map(|r| r.succeeded_files()))
            .map(|f| f.file_name())
            .collect();
        files.sort();
        for file in &files {
            info!(file = %file, "Artifact");
        }

        let summary = RunSummary {
            science: science_report,
            calibration: calibration_report,
            calibrations,
            files,
            reconciled,
        };

        let failed = summary.failed_count();
        if failed > 0 {
            warn!(failed, total = summary.job_count(), "Some simulations failed");
            return Err(DispatchError::BatchFailed {
                failed,
                total: summary.job_count(),
            }
            .into());
        }

        info!(
            jobs = summary.job_count(),
            reconciled = summary.reconciled,
            "Recipe run complete"
        );
        Ok(summary)
    }
}

/// Expands every recipe of a set, in set order.
pub fn expand(expander: &ParameterExpander, recipes: &RecipeSet) -> Vec<ExpandedJob> {
    recipes
        .iter()
        .flat_map(|(name, template)| expander.expand(name, template))
        .collect()
}

/// Time-stamps jobs in order on one sequencer.
pub fn schedule<I>(
    sequencer: &mut TimeSequencer,
    jobs: I,
) -> Result<Vec<TimestampedJob>, SequenceError>
where
    I: IntoIterator<Item = ExpandedJob>,
{
    let mut scheduled = Vec::new();
    for job in jobs {
        scheduled.extend(sequencer.schedule(job)?);
    }
    Ok(scheduled)
}
