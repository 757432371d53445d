//! Cartesian expansion of recipe templates into concrete jobs.
//!
//! Only the configured expandable keys fan out. Any other list-valued
//! property contributes its first element, matching how the instrument
//! templates use list-valued `dateobs`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::obstime::ObsTime;
use super::schema::{RecipeTemplate, SourceSpec, DEFAULT_ND_FILTER};
use super::vocabulary::{Category, InstrumentMode, ObsType, Technique};

/// Property keys that may fan out into several jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpandableKey {
    Dit,
    DateObs,
}

impl ExpandableKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ExpandableKey::Dit => "dit",
            ExpandableKey::DateObs => "dateobs",
        }
    }
}

impl fmt::Display for ExpandableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpandableKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dit" | "detector_integration_time" => Ok(ExpandableKey::Dit),
            "dateobs" | "observation_datetime" => Ok(ExpandableKey::DateObs),
            other => Err(format!("'{}' is not an expandable property", other)),
        }
    }
}

/// Fully resolved, immutable observation parameters of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobConfig {
    pub dit: f64,
    pub ndit: u32,
    pub filter_name: String,
    pub ndfilter_name: String,
    pub catg: Category,
    pub tech: Technique,
    #[serde(rename = "type")]
    pub obs_type: ObsType,
    #[serde(rename = "nObs")]
    pub n_obs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dateobs: Option<ObsTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tplname: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl JobConfig {
    /// Wall-clock seconds consumed by one exposure, including overheads.
    pub fn exposure_overhead_secs(&self) -> f64 {
        self.dit * f64::from(self.ndit) * 1.2 + 1.0
    }
}

/// One concrete unit of work produced by expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedJob {
    /// Name of the recipe this job came from.
    pub recipe: String,
    pub do_category: String,
    pub mode: InstrumentMode,
    pub source: Option<SourceSpec>,
    pub config: JobConfig,
}

impl ExpandedJob {
    /// Source handed to the engine, derived from the type when unset.
    pub fn resolved_source(&self) -> SourceSpec {
        self.source
            .clone()
            .unwrap_or_else(|| SourceSpec::new(self.config.obs_type.default_source()))
    }
}

/// Expands templates over a fixed set of expandable keys.
#[derive(Debug, Clone)]
pub struct ParameterExpander {
    keys: Vec<ExpandableKey>,
}

impl Default for ParameterExpander {
    fn default() -> Self {
        Self {
            keys: vec![ExpandableKey::Dit],
        }
    }
}

impl ParameterExpander {
    pub fn new(keys: Vec<ExpandableKey>) -> Self {
        let mut unique = Vec::with_capacity(keys.len());
        for key in keys {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        Self { keys: unique }
    }

    pub fn keys(&self) -> &[ExpandableKey] {
        &self.keys
    }

    /// Lazily yields one job per combination of the template's list-valued
    /// expandable properties, in declared key order with the last key
    /// varying fastest.
    pub fn expand<'a>(&self, name: &'a str, template: &'a RecipeTemplate) -> Expansion<'a> {
        let props = &template.properties;
        let axes: Vec<Axis> = self
            .keys
            .iter()
            .filter_map(|key| {
                let len = match key {
                    ExpandableKey::Dit => props.dit.is_list().then(|| props.dit.as_slice().len()),
                    ExpandableKey::DateObs => props
                        .dateobs
                        .as_ref()
                        .filter(|d| d.is_list())
                        .map(|d| d.as_slice().len()),
                }?;
                Some(Axis { key: *key, len })
            })
            .collect();

        let exhausted = axes.iter().any(|axis| axis.len == 0);
        Expansion {
            name,
            template,
            cursor: vec![0; axes.len()],
            axes,
            exhausted,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Axis {
    key: ExpandableKey,
    len: usize,
}

/// Iterator over the expansion of one template.
///
/// A clone taken before iteration replays the same sequence; calling
/// [`ParameterExpander::expand`] again also starts a fresh pass.
#[derive(Debug, Clone)]
pub struct Expansion<'a> {
    name: &'a str,
    template: &'a RecipeTemplate,
    axes: Vec<Axis>,
    cursor: Vec<usize>,
    exhausted: bool,
}

impl Expansion<'_> {
    /// Total number of jobs this expansion yields from the start.
    pub fn total(&self) -> usize {
        self.axes.iter().map(|axis| axis.len).product()
    }

    fn index_of(&self, key: ExpandableKey) -> Option<usize> {
        self.axes
            .iter()
            .position(|axis| axis.key == key)
            .map(|pos| self.cursor[pos])
    }

    fn build(&self) -> ExpandedJob {
        let props = &self.template.properties;

        let dit = match self.index_of(ExpandableKey::Dit) {
            Some(i) => props.dit.as_slice()[i],
            None => props.dit.first().copied().unwrap_or_default(),
        };
        let dateobs = props.dateobs.as_ref().and_then(|d| {
            match self.index_of(ExpandableKey::DateObs) {
                Some(i) => d.as_slice().get(i).copied(),
                None => d.first().copied(),
            }
        });

        ExpandedJob {
            recipe: self.name.to_string(),
            do_category: self.template.do_category.clone(),
            mode: self.template.mode,
            source: self.template.source.clone(),
            config: JobConfig {
                dit,
                ndit: props.ndit,
                filter_name: props.filter_name.clone(),
                ndfilter_name: props
                    .ndfilter_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ND_FILTER.to_string()),
                catg: props.catg,
                tech: props.tech,
                obs_type: props.obs_type,
                n_obs: props.n_obs,
                dateobs,
                tplname: props.tplname.clone(),
                extra: props.extra.clone(),
            },
        }
    }

    fn advance(&mut self) {
        for pos in (0..self.axes.len()).rev() {
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.axes[pos].len {
                return;
            }
            self.cursor[pos] = 0;
        }
        self.exhausted = true;
    }
}

impl Iterator for Expansion<'_> {
    type Item = ExpandedJob;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let job = self.build();
        self.advance();
        Some(job)
    }
}
