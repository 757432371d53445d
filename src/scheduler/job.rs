//! Time-stamped simulation jobs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::recipe::{ExpandedJob, ObsTime};
use crate::simulation::{SimulationContext, SimulationRequest};

/// An expanded job with its observation time and output name assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedJob {
    pub job: ExpandedJob,
    /// Authoritative observation time.
    pub timestamp: ObsTime,
    /// Observation time of the first exposure of this job's recipe.
    pub template_start: ObsTime,
    /// 0-based exposure counter within the recipe.
    pub exposure_number: u32,
    pub filename: String,
    pub output_path: PathBuf,
}

impl TimestampedJob {
    /// Modified Julian date of the observation.
    pub fn mjd(&self) -> f64 {
        self.timestamp.mjd()
    }

    /// Flattened `OBS.<key>` engine configuration plus the engine seed.
    pub fn parameters(
        &self,
        random_seed: u64,
    ) -> Result<BTreeMap<String, serde_json::Value>, serde_json::Error> {
        let mut obs = match serde_json::to_value(&self.job.config)? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        obs.insert("dateobs".into(), self.timestamp.to_string().into());
        obs.insert("MJD-OBS".into(), self.mjd().into());
        obs.insert("tplstart".into(), self.template_start.to_string().into());
        obs.insert("tplexpno".into(), self.exposure_number.into());

        let mut parameters: BTreeMap<String, serde_json::Value> = obs
            .into_iter()
            .map(|(key, value)| (format!("OBS.{}", key), value))
            .collect();
        parameters.insert("SIM.random.seed".into(), random_seed.into());
        Ok(parameters)
    }

    /// Builds the engine request for this job.
    pub fn to_request(
        &self,
        context: &SimulationContext,
        small: bool,
    ) -> Result<SimulationRequest, serde_json::Error> {
        Ok(SimulationRequest {
            output_path: Some(self.output_path.clone()),
            mode: self.job.mode,
            parameters: self.parameters(context.random_seed)?,
            source: self.job.resolved_source(),
            small,
            packages: context.packages.clone(),
        })
    }

    /// Record handed to the header reconciler.
    pub fn produced_file(&self) -> ProducedFile {
        ProducedFile {
            path: self.output_path.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// An artifact path and the timestamp that must end up in its header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducedFile {
    pub path: PathBuf,
    pub timestamp: ObsTime,
}

impl ProducedFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
