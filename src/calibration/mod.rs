//! Derivation of calibration jobs from a batch of science jobs.
//!
//! Every science job is classified by its observation type and detector
//! family. The resulting [`CalibrationRequirement`]s are deduplicated by
//! value, then materialized into recipe templates labelled `d{n}`, `s{n}`
//! and `l{n}` with one counter across the whole set. Group order is
//! standard darks, WCU-off darks, sky flats, lamp flats; within a group,
//! first-seen order.

pub mod prototypes;

pub use prototypes::{prototype, CalibrationKind, Prototype};

use std::collections::{BTreeMap, HashSet};

use ordered_float::OrderedFloat;
use tracing::debug;

use crate::recipe::{
    Category, DarkKind, DetectorFamily, ExpandedJob, JobConfig, OneOrMany, RecipeProperties,
    RecipeSet, RecipeTemplate,
};
use prototypes::{DARK_FILTER, FLAT_DIT, FLAT_ND_FILTER, FLAT_NDIT};

/// Labelled calibration templates, in recipe-file format.
pub type CalibSet = RecipeSet;

/// One distinct calibration a batch needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CalibrationRequirement {
    Dark {
        kind: DarkKind,
        family: DetectorFamily,
        dit: OrderedFloat<f64>,
        ndit: u32,
    },
    Flat {
        kind: CalibrationKind,
        family: DetectorFamily,
        filter_name: String,
        nd_filter_name: String,
    },
}

impl CalibrationRequirement {
    pub fn kind(&self) -> CalibrationKind {
        match self {
            CalibrationRequirement::Dark {
                kind: DarkKind::Standard,
                ..
            } => CalibrationKind::Dark,
            CalibrationRequirement::Dark {
                kind: DarkKind::WcuOff,
                ..
            } => CalibrationKind::WcuOffDark,
            CalibrationRequirement::Flat { kind, .. } => *kind,
        }
    }

    pub fn family(&self) -> DetectorFamily {
        match self {
            CalibrationRequirement::Dark { family, .. }
            | CalibrationRequirement::Flat { family, .. } => *family,
        }
    }

    /// Builds the runnable template for this requirement.
    ///
    /// Returns `None` for combinations without a prototype, which
    /// [`CalibrationInferenceEngine::requirements`] never produces.
    pub fn materialize(&self, n_obs: u32) -> Option<RecipeTemplate> {
        let proto = prototype(self.kind(), self.family())?;

        let (dit, ndit, filter_name, ndfilter_name) = match self {
            CalibrationRequirement::Dark { dit, ndit, .. } => {
                (dit.into_inner(), *ndit, DARK_FILTER.to_string(), None)
            }
            CalibrationRequirement::Flat {
                filter_name,
                nd_filter_name,
                ..
            } => (
                FLAT_DIT,
                FLAT_NDIT,
                filter_name.clone(),
                Some(nd_filter_name.clone()),
            ),
        };

        Some(RecipeTemplate {
            do_category: proto.do_category.to_string(),
            mode: proto.mode,
            source: Some(proto.source()),
            properties: RecipeProperties {
                dit: OneOrMany::One(dit),
                ndit,
                filter_name,
                ndfilter_name,
                catg: Category::Calib,
                tech: proto.tech,
                obs_type: proto.obs_type,
                n_obs,
                dateobs: None,
                tplname: Some(proto.tplname.to_string()),
                tplexpno: None,
                extra: BTreeMap::new(),
            },
        })
    }
}

/// Insertion-ordered set of requirements.
#[derive(Debug, Default)]
struct OrderedGroup {
    seen: HashSet<CalibrationRequirement>,
    items: Vec<CalibrationRequirement>,
}

impl OrderedGroup {
    fn push(&mut self, requirement: CalibrationRequirement) {
        if self.seen.insert(requirement.clone()) {
            self.items.push(requirement);
        }
    }
}

/// Derives calibration templates for a batch of science jobs.
#[derive(Debug, Clone)]
pub struct CalibrationInferenceEngine {
    exposures_per_calibration: u32,
}

impl CalibrationInferenceEngine {
    /// `exposures_per_calibration` becomes `nObs` of every generated template.
    pub fn new(exposures_per_calibration: u32) -> Self {
        Self {
            exposures_per_calibration,
        }
    }

    /// Distinct requirements of the batch, grouped and in first-seen order.
    pub fn requirements<'a, I>(&self, jobs: I) -> Vec<CalibrationRequirement>
    where
        I: IntoIterator<Item = &'a JobConfig>,
    {
        let mut darks = OrderedGroup::default();
        let mut wcu_darks = OrderedGroup::default();
        let mut sky_flats = OrderedGroup::default();
        let mut lamp_flats = OrderedGroup::default();

        for config in jobs {
            let Some(family) = config.tech.family() else {
                debug!(tech = %config.tech, "No detector family, skipping calibrations");
                continue;
            };

            if let Some(kind) = config.obs_type.dark_requirement() {
                let requirement = CalibrationRequirement::Dark {
                    kind,
                    family,
                    dit: OrderedFloat(config.dit),
                    ndit: config.ndit,
                };
                match kind {
                    DarkKind::Standard => darks.push(requirement),
                    DarkKind::WcuOff => wcu_darks.push(requirement),
                }
            }

            if config.obs_type.needs_flats() {
                for (kind, group) in [
                    (CalibrationKind::SkyFlat, &mut sky_flats),
                    (CalibrationKind::LampFlat, &mut lamp_flats),
                ] {
                    if prototype(kind, family).is_some() {
                        group.push(CalibrationRequirement::Flat {
                            kind,
                            family,
                            filter_name: config.filter_name.clone(),
                            nd_filter_name: FLAT_ND_FILTER.to_string(),
                        });
                    }
                }
            }
        }

        [darks, wcu_darks, sky_flats, lamp_flats]
            .into_iter()
            .flat_map(|group| group.items)
            .collect()
    }

    /// Builds the labelled calibration set for a batch of expanded jobs.
    pub fn infer<'a, I>(&self, jobs: I) -> CalibSet
    where
        I: IntoIterator<Item = &'a ExpandedJob>,
    {
        let requirements = self.requirements(jobs.into_iter().map(|job| &job.config));

        let mut set = CalibSet::new();
        for requirement in &requirements {
            if let Some(template) = requirement.materialize(self.exposures_per_calibration) {
                let label = format!("{}{}", requirement.kind().label_prefix(), set.len());
                set.insert(label, template);
            }
        }

        debug!(calibrations = set.len(), "Derived calibration set");
        set
    }
}
