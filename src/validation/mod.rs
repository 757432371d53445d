//! Recipe validation.
//!
//! [`RecipeValidator`] checks recipe files exhaustively before anything runs.
//! [`DesignChecker`] compares recipes with the data-reduction design model.

pub mod design_check;
pub mod recipe_validator;

pub use design_check::{design_technique, AllowList, DataItem, DesignChecker, DesignModel};
pub use recipe_validator::{ProblemKind, RecipeValidator, ValidationProblem, ValidationReport};
