//! Consistency check of recipes against the data-reduction design model.
//!
//! The design model is a YAML document:
//!
//! ```yaml
//! dataitems:
//!   LM_IMAGE_SCI_RAW:
//!     dpr_catg: SCIENCE
//!     dpr_tech: IMAGE,LM
//!     dpr_type: OBJECT
//!     templates: [metis_img_lm_obs_autojitter]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DesignError;
use crate::recipe::{RecipeSet, Technique};

/// Raw products the simulations need but the design model does not list yet.
pub const KNOWN_MISSING_DO_CATG: &[&str] = &[
    "N_IMAGE_SKY_RAW",
    "LM_IMAGE_SKY_RAW",
    "N_LSS_SKY_RAW",
    "LM_LSS_SKY_RAW",
    "IFU_RSRF_PINH_RAW",
];

/// (do.catg, template) pairs produced here but not declared in the model.
pub const KNOWN_EXTRA_TEMPLATES: &[(&str, &str)] = &[("IFU_SKY_RAW", "metis_ifu_cal_standard")];

/// One data item of the design model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    #[serde(default)]
    pub dpr_catg: Option<String>,
    #[serde(default)]
    pub dpr_tech: Option<String>,
    #[serde(default)]
    pub dpr_type: Option<String>,
    #[serde(default)]
    pub templates: Vec<String>,
}

/// Data items keyed by do-category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignModel {
    #[serde(default)]
    pub dataitems: BTreeMap<String, DataItem>,
}

impl DesignModel {
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, DesignError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::load_str(&content, &path.display().to_string())
    }

    pub fn load_str(content: &str, origin: &str) -> Result<Self, DesignError> {
        serde_yaml::from_str(content).map_err(|e| DesignError::ParseError {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Raw-frame do-categories declared by the model.
    pub fn raw_categories(&self) -> BTreeSet<&str> {
        self.dataitems
            .keys()
            .map(String::as_str)
            .filter(|k| k.ends_with("_RAW"))
            .collect()
    }
}

/// Known, accepted gaps between recipes and the design model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    pub missing_do_catg: BTreeSet<String>,
    pub extra_templates: BTreeSet<(String, String)>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self {
            missing_do_catg: KNOWN_MISSING_DO_CATG.iter().map(|s| s.to_string()).collect(),
            extra_templates: KNOWN_EXTRA_TEMPLATES
                .iter()
                .map(|(c, t)| (c.to_string(), t.to_string()))
                .collect(),
        }
    }
}

impl AllowList {
    pub fn with_missing<I, S>(mut self, do_catg: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.missing_do_catg.extend(do_catg.into_iter().map(Into::into));
        self
    }
}

/// Technique as the design model names it.
///
/// Coronagraphic and LMS techniques are simulator-side names that header
/// reconciliation rewrites before the data reach the pipeline.
pub fn design_technique(tech: Technique) -> &'static str {
    match tech {
        Technique::RavcLm | Technique::AppLm => "IMAGE,LM",
        Technique::RavcIfu | Technique::Lms => "IFU",
        other => other.as_str(),
    }
}

/// Compares recipes with the design model.
pub struct DesignChecker {
    model: DesignModel,
    allow: AllowList,
}

impl DesignChecker {
    pub fn new(model: DesignModel, allow: AllowList) -> Self {
        Self { model, allow }
    }

    /// Returns one line per inconsistency; empty when consistent.
    pub fn check(&self, recipes: &RecipeSet) -> Vec<String> {
        let mut problems = Vec::new();

        for (_, template) in recipes {
            let do_catg = template.do_category.as_str();
            let Some(item) = self.model.dataitems.get(do_catg) else {
                if !self.allow.missing_do_catg.contains(do_catg) {
                    problems.push(format!("Cannot find {do_catg} in the design model"));
                }
                continue;
            };
            let props = &template.properties;

            if item.dpr_catg.as_deref() != Some(props.catg.as_str()) {
                problems.push(format!(
                    "{do_catg} has DPR.CATG {} in recipes but {} in the design model",
                    props.catg,
                    display(&item.dpr_catg)
                ));
            }
            if item.dpr_tech.as_deref() != Some(design_technique(props.tech)) {
                problems.push(format!(
                    "{do_catg} has DPR.TECH {} in recipes but {} in the design model",
                    props.tech,
                    display(&item.dpr_tech)
                ));
            }
            if item.dpr_type.as_deref() != Some(props.obs_type.as_str()) {
                problems.push(format!(
                    "{do_catg} has DPR.TYPE {} in recipes but {} in the design model",
                    props.obs_type,
                    display(&item.dpr_type)
                ));
            }

            match props.tplname.as_deref().map(str::to_lowercase) {
                Some(tplname) => {
                    let declared = item.templates.iter().any(|t| t.to_lowercase() == tplname);
                    let allowed = self
                        .allow
                        .extra_templates
                        .contains(&(do_catg.to_string(), tplname.clone()));
                    if !declared && !allowed {
                        problems.push(format!(
                            "{do_catg} has tplname {tplname} but only {:?} create it",
                            item.templates
                        ));
                    }
                }
                None => problems.push(format!("{do_catg} has no tplname")),
            }
        }

        let in_recipes: BTreeSet<&str> = recipes
            .iter()
            .map(|(_, t)| t.do_category.as_str())
            .collect();
        let in_design = self.model.raw_categories();

        let only_in_recipes: Vec<&str> = in_recipes
            .difference(&in_design)
            .copied()
            .filter(|c| !self.allow.missing_do_catg.contains(*c))
            .collect();
        let only_in_design: Vec<&str> = in_design.difference(&in_recipes).copied().collect();

        if !only_in_recipes.is_empty() {
            problems.push(format!(
                "DO.CATG values only used in recipes but not in the design model: {}",
                only_in_recipes.join(", ")
            ));
        }
        if !only_in_design.is_empty() {
            problems.push(format!(
                "DO.CATG values only used in the design model but not in recipes: {}",
                only_in_design.join(", ")
            ));
        }

        debug!(problems = problems.len(), "Design check finished");
        problems
    }
}

fn display(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("nothing")
}
