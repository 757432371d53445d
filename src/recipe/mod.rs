//! Recipe loading, typed templates and parameter expansion.
//!
//! A recipe file is a YAML mapping from recipe name to template:
//!
//! ```yaml
//! LM_IMAGE_SCI_RAW:
//!   do.catg: LM_IMAGE_SCI_RAW
//!   mode: img_lm
//!   source:
//!     name: simple_star
//!     kwargs: {}
//!   properties:
//!     dit: [1.0, 2.0]
//!     ndit: 1
//!     filter_name: Lp
//!     catg: SCIENCE
//!     tech: IMAGE,LM
//!     type: OBJECT
//!     nObs: 1
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rawforge::recipe::RecipeLoader;
//!
//! let raw = RecipeLoader::load_file("recipes.yaml")?;
//! let selected = raw.select(Some(&["LM_IMAGE_SCI_RAW".to_string()]))?;
//! let recipes = selected.into_recipe_set()?;
//! ```

pub mod expand;
pub mod obstime;
pub mod schema;
pub mod vocabulary;

pub use expand::{Expansion, ExpandableKey, ExpandedJob, JobConfig, ParameterExpander};
pub use obstime::ObsTime;
pub use schema::{OneOrMany, RecipeProperties, RecipeSet, RecipeTemplate, SourceSpec};
pub use vocabulary::{
    Category, DarkKind, DetectorFamily, InstrumentMode, ObsType, Technique, UnknownTerm,
};

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::RecipeError;

/// Recipes as read from disk, before typing.
///
/// Kept untyped so the validator can report every defect of every recipe
/// instead of stopping at the first deserialization error.
#[derive(Debug, Clone, Default)]
pub struct RawRecipes {
    origin: String,
    entries: Vec<(String, serde_yaml::Value)>,
}

impl RawRecipes {
    /// Where these recipes were read from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn entries(&self) -> &[(String, serde_yaml::Value)] {
        &self.entries
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

    /// Keeps only the named recipes, in the order requested.
    ///
    /// `None` keeps everything. A name absent from the file is a user error
    /// and aborts with [`RecipeError::UnknownCategoryFilter`].
    pub fn select(self, allow: Option<&[String]>) -> Result<Self, RecipeError> {
        let Some(allow) = allow else {
            return Ok(self);
        };

        let mut selected = Vec::with_capacity(allow.len());
        for wanted in allow {
            let wanted = wanted.trim();
            let entry = self
                .entries
                .iter()
                .find(|(name, _)| name == wanted)
                .ok_or_else(|| RecipeError::UnknownCategoryFilter(wanted.to_string()))?;
            if !selected.iter().any(|(name, _): &(String, _)| name == wanted) {
                selected.push(entry.clone());
            }
        }

        debug!(kept = selected.len(), total = self.entries.len(), "Filtered recipes");
        Ok(Self {
            origin: self.origin,
            entries: selected,
        })
    }

    /// Converts every entry into a typed [`RecipeTemplate`].
    pub fn into_recipe_set(self) -> Result<RecipeSet, RecipeError> {
        let mut set = RecipeSet::new();
        for (name, value) in self.entries {
            let template: RecipeTemplate =
                serde_yaml::from_value(value).map_err(|e| RecipeError::InvalidTemplate {
                    recipe: name.clone(),
                    message: e.to_string(),
                })?;
            set.insert(name, template);
        }
        Ok(set)
    }
}

/// Reads recipe files.
pub struct RecipeLoader;

impl RecipeLoader {
    /// Loads a recipe file from disk.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<RawRecipes, RecipeError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::load_str(&content, &path.display().to_string())
    }

    /// Parses recipe YAML. `origin` names the source in error messages.
    pub fn load_str(content: &str, origin: &str) -> Result<RawRecipes, RecipeError> {
        let document: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| RecipeError::ParseError {
                path: origin.to_string(),
                message: e.to_string(),
            })?;

        let mapping = match document {
            serde_yaml::Value::Mapping(mapping) => mapping,
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            _ => return Err(RecipeError::NotAMapping(origin.to_string())),
        };

        let mut entries = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let name = match key {
                serde_yaml::Value::String(name) => name,
                other => {
                    return Err(RecipeError::ParseError {
                        path: origin.to_string(),
                        message: format!("recipe names must be strings, found {:?}", other),
                    })
                }
            };
            entries.push((name, value));
        }

        debug!(origin, recipes = entries.len(), "Loaded recipe file");
        Ok(RawRecipes {
            origin: origin.to_string(),
            entries,
        })
    }
}
