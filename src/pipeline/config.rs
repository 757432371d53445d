//! Run configuration.
//!
//! A [`RunConfig`] holds everything one `rawforge run` needs: where recipes
//! come from, where artifacts go, how jobs are timed, expanded, calibrated
//! and dispatched, and which engine to drive.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::recipe::ExpandableKey;
use crate::scheduler::{FailurePolicy, TimingMode};
use crate::simulation::DEFAULT_ENGINE_PROGRAM;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for one recipe run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    // Input settings
    /// Recipe file.
    pub input: PathBuf,
    /// Recipe names to run, in order. `None` runs every recipe.
    pub categories: Option<Vec<String>>,
    /// Property keys whose lists are expanded into separate jobs.
    pub expandable_keys: Vec<ExpandableKey>,

    // Output settings
    /// Directory receiving the artifacts.
    pub output_dir: PathBuf,
    /// Where to write the inferred calibration recipes, if anywhere.
    pub calib_dump: Option<PathBuf>,

    // Scheduling settings
    pub timing: TimingMode,
    /// Exposures per inferred calibration; 0 disables calibration inference.
    pub calibration_count: u32,

    // Dispatch settings
    /// Prepare everything but run no simulation.
    pub dry_run: bool,
    /// Maximum simulations in flight.
    pub worker_count: usize,
    /// Reduced-size detectors for quick checks.
    pub small: bool,
    pub failure_policy: FailurePolicy,

    // Engine settings
    /// Simulation engine executable.
    pub engine_program: String,
    /// Extra engine arguments.
    pub engine_args: Vec<String>,
    /// Local instrument package directory.
    pub packages: Option<PathBuf>,
    /// Per-simulation time limit.
    pub engine_timeout: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("recipes.yaml"),
            categories: None,
            expandable_keys: vec![ExpandableKey::Dit],

            output_dir: PathBuf::from("output"),
            calib_dump: None,

            timing: TimingMode::Explicit,
            calibration_count: 0,

            dry_run: false,
            worker_count: 1,
            small: false,
            failure_policy: FailurePolicy::FailFast,

            engine_program: DEFAULT_ENGINE_PROGRAM.to_string(),
            engine_args: Vec::new(),
            packages: None,
            engine_timeout: None,
        }
    }
}

impl RunConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RAWFORGE_INPUT`: Recipe file (default: recipes.yaml)
    /// - `RAWFORGE_CATG`: Comma-separated recipe names
    /// - `RAWFORGE_EXPAND`: Comma-separated expandable keys (default: dit)
    /// - `RAWFORGE_OUTPUT_DIR`: Artifact directory (default: output)
    /// - `RAWFORGE_CALIB_FILE`: Calibration recipe dump path
    /// - `RAWFORGE_SEQUENCE`: `1` or a start time to enable sequence mode
    /// - `RAWFORGE_CALIB`: Exposures per calibration (default: 0)
    /// - `RAWFORGE_DRY_RUN`: Skip simulations (default: false)
    /// - `RAWFORGE_WORKERS`: Simulations in flight (default: 1)
    /// - `RAWFORGE_SMALL`: Reduced detectors (default: false)
    /// - `RAWFORGE_FAILURE_POLICY`: `fail-fast` or `continue`
    /// - `RAWFORGE_ENGINE`: Engine executable (default: metis-simulate)
    /// - `RAWFORGE_ENGINE_ARGS`: Whitespace-separated engine arguments
    /// - `RAWFORGE_PACKAGES`: Instrument package directory
    /// - `RAWFORGE_ENGINE_TIMEOUT_SECS`: Per-simulation time limit
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Input settings
        if let Ok(val) = std::env::var("RAWFORGE_INPUT") {
            config.input = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("RAWFORGE_CATG") {
            config.categories = Some(split_list(&val));
        }

        if let Ok(val) = std::env::var("RAWFORGE_EXPAND") {
            config.expandable_keys = split_list(&val)
                .iter()
                .map(|key| parse_env_value(key, "RAWFORGE_EXPAND"))
                .collect::<Result<_, _>>()?;
        }

        // Output settings
        if let Ok(val) = std::env::var("RAWFORGE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("RAWFORGE_CALIB_FILE") {
            config.calib_dump = Some(PathBuf::from(val));
        }

        // Scheduling settings
        if let Ok(val) = std::env::var("RAWFORGE_SEQUENCE") {
            config.timing = parse_timing(&val, "RAWFORGE_SEQUENCE")?;
        }

        if let Ok(val) = std::env::var("RAWFORGE_CALIB") {
            config.calibration_count = parse_env_value(&val, "RAWFORGE_CALIB")?;
        }

        // Dispatch settings
        if let Ok(val) = std::env::var("RAWFORGE_DRY_RUN") {
            config.dry_run = parse_env_bool(&val, "RAWFORGE_DRY_RUN")?;
        }

        if let Ok(val) = std::env::var("RAWFORGE_WORKERS") {
            config.worker_count = parse_env_value(&val, "RAWFORGE_WORKERS")?;
        }

        if let Ok(val) = std::env::var("RAWFORGE_SMALL") {
            config.small = parse_env_bool(&val, "RAWFORGE_SMALL")?;
        }

        if let Ok(val) = std::env::var("RAWFORGE_FAILURE_POLICY") {
            config.failure_policy = parse_env_value(&val, "RAWFORGE_FAILURE_POLICY")?;
        }

        // Engine settings
        if let Ok(val) = std::env::var("RAWFORGE_ENGINE") {
            config.engine_program = val;
        }

        if let Ok(val) = std::env::var("RAWFORGE_ENGINE_ARGS") {
            config.engine_args = val.split_whitespace().map(str::to_string).collect();
        }

        if let Ok(val) = std::env::var("RAWFORGE_PACKAGES") {
            config.packages = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("RAWFORGE_ENGINE_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "RAWFORGE_ENGINE_TIMEOUT_SECS")?;
            config.engine_timeout = Some(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "input cannot be empty".to_string(),
            ));
        }

        if self.worker_count == 0 {
            return Err(ConfigError::ValidationFailed(
                "worker_count must be greater than 0".to_string(),
            ));
        }

        if self.expandable_keys.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "expandable_keys cannot be empty".to_string(),
            ));
        }

        if self.engine_program.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "engine_program cannot be empty".to_string(),
            ));
        }

        if matches!(self.engine_timeout, Some(t) if t.is_zero()) {
            return Err(ConfigError::ValidationFailed(
                "engine_timeout must be greater than 0".to_string(),
            ));
        }

        if let Some(categories) = &self.categories {
            if categories.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "categories cannot be an empty list".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Whether calibration inference runs after the science jobs.
    pub fn calibrations_enabled(&self) -> bool {
        self.calibration_count > 0
    }

    /// Builder method to set the recipe file.
    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = input.into();
        self
    }

    /// Builder method to restrict the run to named recipes.
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    /// Builder method to set expandable keys.
    pub fn with_expandable_keys(mut self, keys: Vec<ExpandableKey>) -> Self {
        self.expandable_keys = keys;
        self
    }

    /// Builder method to set the artifact directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Builder method to set the calibration dump path.
    pub fn with_calib_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.calib_dump = Some(path.into());
        self
    }

    /// Builder method to set the timing mode.
    pub fn with_timing(mut self, timing: TimingMode) -> Self {
        self.timing = timing;
        self
    }

    /// Builder method to set exposures per calibration.
    pub fn with_calibration_count(mut self, count: u32) -> Self {
        self.calibration_count = count;
        self
    }

    /// Builder method to enable or disable dry runs.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Builder method to set the worker count.
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    /// Builder method to enable or disable small detectors.
    pub fn with_small(mut self, small: bool) -> Self {
        self.small = small;
        self
    }

    /// Builder method to set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Builder method to set the engine command.
    pub fn with_engine(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.engine_program = program.into();
        self.engine_args = args;
        self
    }

    /// Builder method to set the instrument package directory.
    pub fn with_packages(mut self, packages: impl Into<PathBuf>) -> Self {
        self.packages = Some(packages.into());
        self
    }

    /// Builder method to set the per-simulation time limit.
    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout = Some(timeout);
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

/// Parse the sequence flag: `1`/`true` or a start time.
pub fn parse_timing(value: &str, key: &str) -> Result<TimingMode, ConfigError> {
    TimingMode::parse_sequence_flag(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Split a comma-separated list, dropping empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.input, PathBuf::from("recipes.yaml"));
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.expandable_keys, vec![ExpandableKey::Dit]);
        assert_eq!(config.timing, TimingMode::Explicit);
        assert_eq!(config.worker_count, 1);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert!(!config.calibrations_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = RunConfig::new()
            .with_input("YAML/recipes.yaml")
            .with_categories(vec!["LM_IMAGE_SCI_RAW".to_string()])
            .with_output_dir("out")
            .with_calibration_count(2)
            .with_worker_count(4)
            .with_dry_run(true)
            .with_failure_policy(FailurePolicy::Continue)
            .with_engine("python", vec!["sim.py".to_string()]);

        assert_eq!(config.input, PathBuf::from("YAML/recipes.yaml"));
        assert_eq!(config.categories, Some(vec!["LM_IMAGE_SCI_RAW".to_string()]));
        assert!(config.calibrations_enabled());
        assert_eq!(config.worker_count, 4);
        assert!(config.dry_run);
        assert_eq!(config.engine_program, "python");
        assert_eq!(config.engine_args, vec!["sim.py"]);
    }

    #[test]
    fn test_validation_invalid_worker_count() {
        let config = RunConfig::default().with_worker_count(0);
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("worker_count"));
    }

    #[test]
    fn test_validation_empty_input() {
        let config = RunConfig::default().with_input("");
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("input"));
    }

    #[test]
    fn test_validation_zero_timeout() {
        let config = RunConfig::default().with_engine_timeout(Duration::from_secs(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_timing() {
        assert_eq!(
            parse_timing("1", "RAWFORGE_SEQUENCE").expect("flag should parse"),
            TimingMode::Sequence { start: None }
        );
        assert!(matches!(
            parse_timing("2027-01-01 00:00:00", "RAWFORGE_SEQUENCE"),
            Ok(TimingMode::Sequence { start: Some(_) })
        ));
        assert!(parse_timing("soon", "RAWFORGE_SEQUENCE").is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" A, B,,C "), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_parse_env_bool() {
        assert!(parse_env_bool("on", "X").expect("on is a boolean"));
        assert!(!parse_env_bool("0", "X").expect("0 is a boolean"));
        assert!(parse_env_bool("maybe", "X").is_err());
    }
}
