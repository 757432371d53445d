//! Typed recipe templates.
//!
//! A recipe file maps recipe names to [`RecipeTemplate`]s. Property keys use
//! the instrument's historical short names (`dit`, `ndit`, `nObs`, ...); the
//! descriptive names are accepted as aliases when reading.

use std::collections::BTreeMap;
use std::path::Path;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::obstime::ObsTime;
use super::vocabulary::{Category, InstrumentMode, ObsType, Technique};
use crate::error::RecipeError;

/// ND filter used when a recipe does not name one.
pub const DEFAULT_ND_FILTER: &str = "open";

/// A scalar or a list of scalars. Lists mark values to expand into jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value),
            OneOrMany::Many(values) => values,
        }
    }

    pub fn first(&self) -> Option<&T> {
        self.as_slice().first()
    }

    pub fn is_list(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        OneOrMany::One(value)
    }
}

/// Source descriptor handed to the simulation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Name of the engine-side source model (e.g. `empty_sky`).
    pub name: String,
    /// Keyword overrides for the source model.
    #[serde(default)]
    pub kwargs: serde_json::Map<String, serde_json::Value>,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kwargs: serde_json::Map::new(),
        }
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }
}

/// Observation properties of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeProperties {
    /// Detector integration time in seconds.
    #[serde(alias = "detector_integration_time")]
    pub dit: OneOrMany<f64>,
    /// Number of co-added integrations.
    #[serde(alias = "num_integrations")]
    pub ndit: u32,
    pub filter_name: String,
    #[serde(
        default,
        alias = "nd_filter_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub ndfilter_name: Option<String>,
    #[serde(alias = "category")]
    pub catg: Category,
    #[serde(alias = "technique")]
    pub tech: Technique,
    #[serde(rename = "type")]
    pub obs_type: ObsType,
    /// Number of exposures per expanded parameter set.
    #[serde(rename = "nObs", alias = "observation_count")]
    pub n_obs: u32,
    #[serde(
        default,
        alias = "observation_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub dateobs: Option<OneOrMany<ObsTime>>,
    #[serde(
        default,
        alias = "template_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub tplname: Option<String>,
    #[serde(
        default,
        alias = "exposure_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub tplexpno: Option<u32>,
    /// Engine keywords without special meaning here, passed through verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One declarative observation template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeTemplate {
    /// Output product classification (e.g. `IMAGE_LM_RAW`).
    #[serde(rename = "do.catg", alias = "category_tag")]
    pub do_category: String,
    pub mode: InstrumentMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSpec>,
    pub properties: RecipeProperties,
}

/// An ordered, named collection of recipe templates.
///
/// Serializes as a mapping in insertion order, which is the format of the
/// input recipe files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeSet {
    entries: Vec<(String, RecipeTemplate)>,
}

impl RecipeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a template, replacing any existing entry with the same name.
    pub fn insert(&mut self, name: impl Into<String>, template: RecipeTemplate) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = template,
            None => self.entries.push((name, template)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RecipeTemplate> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, template)| template)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecipeTemplate)> {
        self.entries.iter().map(|(name, t)| (name.as_str(), t))
    }

    /// Renders the set in recipe-file format.
    pub fn to_yaml_string(&self) -> Result<String, RecipeError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Writes the set in recipe-file format, creating parent directories.
    pub fn write_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), RecipeError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_yaml_string()?)?;
        Ok(())
    }
}

impl Serialize for RecipeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, template) in &self.entries {
            map.serialize_entry(name, template)?;
        }
        map.end()
    }
}

impl<'a> IntoIterator for &'a RecipeSet {
    type Item = &'a (String, RecipeTemplate);
    type IntoIter = std::slice::Iter<'a, (String, RecipeTemplate)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
