//! Bounded-concurrency dispatch of simulation jobs.
//!
//! Timestamps and filenames are fixed before dispatch, so completion order
//! never affects the produced files. Each job yields its own `Result`; the
//! [`FailurePolicy`] decides whether one failure aborts the batch.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::job::{ProducedFile, TimestampedJob};
use crate::error::{DispatchError, SimulationError};
use crate::simulation::{SimulationContext, Simulator};

/// What to do when a simulation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the remaining batch and kill in-flight engines.
    #[default]
    FailFast,
    /// Run every job and report failures afterwards.
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(FailurePolicy::FailFast),
            "continue" | "keep-going" => Ok(FailurePolicy::Continue),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Prepare every request but run nothing.
    pub dry_run: bool,
    /// Maximum simulations in flight.
    pub worker_count: usize,
    /// Ask the engine for reduced-size detectors.
    pub small: bool,
    pub failure_policy: FailurePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            worker_count: 1,
            small: false,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl DispatchConfig {
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    pub fn with_small(mut self, small: bool) -> Self {
        self.small = small;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// Result of one executed job.
#[derive(Debug)]
pub struct JobOutcome {
    /// Submission index.
    pub index: usize,
    pub filename: String,
    pub result: Result<(), SimulationError>,
}

/// Everything a dispatch produced.
#[derive(Debug)]
pub struct DispatchReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    /// Files in submission order, recorded before execution.
    pub produced: Vec<ProducedFile>,
    /// Per-job results ordered by submission index. Empty on a dry run.
    pub outcomes: Vec<JobOutcome>,
}

impl DispatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Files whose simulation succeeded (all of them on a dry run).
    pub fn succeeded_files(&self) -> Vec<&ProducedFile> {
        if self.dry_run {
            return self.produced.iter().collect();
        }
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .filter_map(|o| self.produced.get(o.index))
            .collect()
    }
}

/// Runs time-stamped jobs through a [`Simulator`].
pub struct JobDispatcher {
    simulator: Arc<dyn Simulator>,
    context: Arc<SimulationContext>,
    config: DispatchConfig,
}

impl JobDispatcher {
    pub fn new(
        simulator: Arc<dyn Simulator>,
        context: Arc<SimulationContext>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            simulator,
            context,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Builds one request per job and, unless dry-running, executes them
    /// with at most `worker_count` in flight.
    pub async fn dispatch(&self, jobs: &[TimestampedJob]) -> Result<DispatchReport, DispatchError> {
        let run_id = Uuid::new_v4();
        let produced: Vec<ProducedFile> = jobs.iter().map(TimestampedJob::produced_file).collect();

        let mut requests = Vec::with_capacity(jobs.len());
        for job in jobs {
            let request = job
                .to_request(&self.context, self.config.small)
                .map_err(|e| DispatchError::JobFailed {
                    filename: job.filename.clone(),
                    source: SimulationError::from(e),
                })?;
            debug!(
                run_id = %run_id,
                file = %job.filename,
                dit = job.job.config.dit,
                ndit = job.job.config.ndit,
                tech = %job.job.config.tech,
                obs_type = %job.job.config.obs_type,
                filter = %job.job.config.filter_name,
                "Prepared simulation"
            );
            requests.push(request);
        }

        if self.config.dry_run {
            info!(run_id = %run_id, jobs = requests.len(), "Dry run: simulations prepared, none executed");
            return Ok(DispatchReport {
                run_id,
                dry_run: true,
                produced,
                outcomes: Vec::new(),
            });
        }

        let total = requests.len();
        let workers = self.config.worker_count.max(1);
        info!(run_id = %run_id, jobs = total, workers, "Dispatching simulations");

        let limiter = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let simulator = Arc::clone(&self.simulator);
            let limiter = Arc::clone(&limiter);
            tasks.spawn(async move {
                // The limiter is never closed.
                let _permit = limiter.acquire_owned().await.ok();
                let result = simulator.simulate(&request).await.map(|_| ());
                (index, request.label(), result)
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            let (index, filename, result) =
                joined.map_err(|e| DispatchError::WorkerPanicked(e.to_string()))?;
            match result {
                Ok(()) => {
                    debug!(run_id = %run_id, file = %filename, "Simulation finished");
                    outcomes.push(JobOutcome {
                        index,
                        filename,
                        result: Ok(()),
                    });
                }
                Err(source) => {
                    error!(run_id = %run_id, file = %filename, error = %source, "Simulation failed");
                    if self.config.failure_policy == FailurePolicy::FailFast {
                        tasks.abort_all();
                        return Err(DispatchError::JobFailed { filename, source });
                    }
                    outcomes.push(JobOutcome {
                        index,
                        filename,
                        result: Err(source),
                    });
                }
            }
        }
        outcomes.sort_by_key(|o| o.index);

        let report = DispatchReport {
            run_id,
            dry_run: false,
            produced,
            outcomes,
        };
        info!(
            run_id = %run_id,
            succeeded = total - report.failed_count(),
            failed = report.failed_count(),
            "Dispatch complete"
        );
        Ok(report)
    }
}
