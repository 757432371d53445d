//! Exhaustive validation of raw recipe files.
//!
//! Works on the untyped YAML so that every defect of every recipe is
//! reported in one pass. Never fails: the outcome is a [`ValidationReport`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{info, warn};

use crate::recipe::vocabulary::ND_FILTERS;
use crate::recipe::{Category, InstrumentMode, ObsType, RawRecipes, Technique};

/// Top-level keys every recipe must carry, with accepted aliases.
const TOP_LEVEL_KEYS: &[(&str, &[&str])] = &[
    ("do.catg", &["category_tag"]),
    ("mode", &[]),
    ("properties", &[]),
];

/// Property keys every recipe must carry, with accepted aliases.
const PROPERTY_KEYS: &[(&str, &[&str])] = &[
    ("dit", &["detector_integration_time"]),
    ("ndit", &["num_integrations"]),
    ("filter_name", &[]),
    ("catg", &["category"]),
    ("tech", &["technique"]),
    ("type", &[]),
    ("nObs", &["observation_count"]),
];

/// Optional property keys that also accept aliases.
const OPTIONAL_PROPERTY_KEYS: &[(&str, &[&str])] = &[
    ("ndfilter_name", &["nd_filter_name"]),
    ("dateobs", &["observation_datetime"]),
    ("tplname", &["template_name"]),
    ("tplexpno", &["exposure_number"]),
];

/// What is wrong with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    MissingKey,
    DuplicateKey,
    InvalidFilter,
    InvalidNdFilter,
    UnknownValue,
    NotPositiveInteger,
    NotPositiveNumber,
    Malformed,
}

impl ProblemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemKind::MissingKey => "missing_key",
            ProblemKind::DuplicateKey => "duplicate_key",
            ProblemKind::InvalidFilter => "invalid_filter",
            ProblemKind::InvalidNdFilter => "invalid_nd_filter",
            ProblemKind::UnknownValue => "unknown_value",
            ProblemKind::NotPositiveInteger => "not_positive_integer",
            ProblemKind::NotPositiveNumber => "not_positive_number",
            ProblemKind::Malformed => "malformed",
        }
    }
}

/// One defect in one recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationProblem {
    pub recipe: String,
    pub field: String,
    pub kind: ProblemKind,
    pub message: String,
}

impl fmt::Display for ValidationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "recipe={} field={} problem={}: {}",
            self.recipe,
            self.field,
            self.kind.as_str(),
            self.message
        )
    }
}

/// Every problem found in a recipe file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checked: usize,
    pub problems: Vec<ValidationProblem>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn add_problem(
        &mut self,
        recipe: &str,
        field: &str,
        kind: ProblemKind,
        message: impl Into<String>,
    ) {
        self.problems.push(ValidationProblem {
            recipe: recipe.to_string(),
            field: field.to_string(),
            kind,
            message: message.into(),
        });
    }

    /// Human-readable problem lines.
    pub fn messages(&self) -> Vec<String> {
        self.problems.iter().map(ToString::to_string).collect()
    }

    /// Emits one `warn!` per problem and a summary line.
    pub fn log(&self) {
        for problem in &self.problems {
            warn!(
                recipe = %problem.recipe,
                field = %problem.field,
                problem = problem.kind.as_str(),
                "{}",
                problem.message
            );
        }
        if self.is_valid() {
            info!(recipes = self.checked, "Recipe validation passed");
        } else {
            warn!(
                recipes = self.checked,
                problems = self.problems.len(),
                "Recipe validation failed"
            );
        }
    }
}

/// Validator for recipe files.
pub struct RecipeValidator;

impl RecipeValidator {
    /// Validates every recipe.
    ///
    /// Key presence is checked for all recipes first, then values. A value
    /// check is skipped when its key is missing, since that was already
    /// reported.
    pub fn validate(recipes: &RawRecipes) -> ValidationReport {
        let mut report = ValidationReport {
            checked: recipes.len(),
            problems: Vec::new(),
        };

        for (name, value) in recipes.entries() {
            Self::check_keys(name, value, &mut report);
        }
        for (name, value) in recipes.entries() {
            if let Some(template) = value.as_mapping() {
                Self::check_values(name, template, &mut report);
            }
        }

        report
    }

    fn check_keys(name: &str, value: &Value, report: &mut ValidationReport) {
        let Some(template) = value.as_mapping() else {
            report.add_problem(name, "<recipe>", ProblemKind::Malformed, "recipe is not a mapping");
            return;
        };

        check_duplicates(name, template, TOP_LEVEL_KEYS, report);
        for (key, aliases) in TOP_LEVEL_KEYS {
            if lookup(template, key, aliases).is_none() {
                report.add_problem(
                    name,
                    key,
                    ProblemKind::MissingKey,
                    format!("does not contain required field {key}"),
                );
            }
        }

        match template.get("properties") {
            Some(Value::Mapping(properties)) => {
                check_duplicates(name, properties, PROPERTY_KEYS, report);
                check_duplicates(name, properties, OPTIONAL_PROPERTY_KEYS, report);
                for (key, aliases) in PROPERTY_KEYS {
                    if lookup(properties, key, aliases).is_none() {
                        report.add_problem(
                            name,
                            key,
                            ProblemKind::MissingKey,
                            format!("does not contain required field {key}"),
                        );
                    }
                }
            }
            Some(_) => report.add_problem(
                name,
                "properties",
                ProblemKind::Malformed,
                "properties is not a mapping",
            ),
            None => {}
        }
    }

    fn check_values(name: &str, template: &Mapping, report: &mut ValidationReport) {
        let empty = Mapping::new();
        let properties = template
            .get("properties")
            .and_then(Value::as_mapping)
            .unwrap_or(&empty);

        let mode = template.get("mode").map(render);
        let parsed_mode = mode.as_deref().and_then(|m| InstrumentMode::from_str(m).ok());

        if let (Some(mode), Some(filter)) = (parsed_mode, properties.get("filter_name")) {
            let filter = render(filter);
            if !mode.accepts_filter(&filter) {
                report.add_problem(
                    name,
                    "filter_name",
                    ProblemKind::InvalidFilter,
                    format!("filter value of {filter} not valid for mode {mode}"),
                );
            }
        }

        if let Some(nd) = lookup(properties, "ndfilter_name", &["nd_filter_name"]) {
            let nd = render(nd);
            if !ND_FILTERS.contains(&nd.as_str()) {
                report.add_problem(
                    name,
                    "ndfilter_name",
                    ProblemKind::InvalidNdFilter,
                    format!("ND filter value of {nd} not valid"),
                );
            }
        }

        check_term::<Category>(name, "catg", lookup(properties, "catg", &["category"]), report);
        check_term::<Technique>(name, "tech", lookup(properties, "tech", &["technique"]), report);
        check_term::<ObsType>(name, "type", properties.get("type"), report);
        if let Some(mode) = mode {
            if parsed_mode.is_none() {
                report.add_problem(
                    name,
                    "mode",
                    ProblemKind::UnknownValue,
                    format!("invalid MODE of {mode}"),
                );
            }
        }

        for (key, aliases) in [
            ("nObs", &["observation_count"][..]),
            ("ndit", &["num_integrations"][..]),
        ] {
            if let Some(value) = lookup(properties, key, aliases) {
                if !matches!(value.as_i64(), Some(n) if n > 0) {
                    report.add_problem(
                        name,
                        key,
                        ProblemKind::NotPositiveInteger,
                        format!("invalid {} of {}", key.to_uppercase(), render(value)),
                    );
                }
            }
        }

        if let Some(dit) = lookup(properties, "dit", &["detector_integration_time"]) {
            let valid = match dit {
                Value::Sequence(values) => {
                    !values.is_empty() && values.iter().all(is_positive_number)
                }
                single => is_positive_number(single),
            };
            if !valid {
                report.add_problem(
                    name,
                    "dit",
                    ProblemKind::NotPositiveNumber,
                    format!("invalid DIT of {}", render(dit)),
                );
            }
        }
    }
}

fn lookup<'a>(mapping: &'a Mapping, key: &str, aliases: &[&str]) -> Option<&'a Value> {
    mapping
        .get(key)
        .or_else(|| aliases.iter().find_map(|alias| mapping.get(*alias)))
}

/// Reports a key given under more than one of its accepted names.
fn check_duplicates(
    recipe: &str,
    mapping: &Mapping,
    keys: &[(&str, &[&str])],
    report: &mut ValidationReport,
) {
    for (key, aliases) in keys {
        let given: Vec<&str> = std::iter::once(*key)
            .chain(aliases.iter().copied())
            .filter(|name| mapping.contains_key(*name))
            .collect();
        if given.len() > 1 {
            report.add_problem(
                recipe,
                key,
                ProblemKind::DuplicateKey,
                format!("field given more than once as {}", given.join(", ")),
            );
        }
    }
}

fn check_term<T: FromStr>(
    recipe: &str,
    field: &str,
    value: Option<&Value>,
    report: &mut ValidationReport,
) {
    let Some(value) = value else {
        return;
    };
    let text = render(value);
    if T::from_str(&text).is_err() {
        report.add_problem(
            recipe,
            field,
            ProblemKind::UnknownValue,
            format!("invalid {} of {}", field.to_uppercase(), text),
        );
    }
}

fn is_positive_number(value: &Value) -> bool {
    matches!(value.as_f64(), Some(v) if v > 0.0)
}

/// Scalar as text; other values in flow style.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{other:?}")),
    }
}
