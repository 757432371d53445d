//! End-to-end recipe runs against an in-process engine.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rawforge::error::{RecipeError, SimulationError};
use rawforge::export::{collect_artifacts, write_summary};
use rawforge::headers::keywords::{KEY_DPR_TECH, KEY_DPR_TYPE, KEY_DRS_FILTER, KEY_INS_MODE, KEY_MJD_OBS};
use rawforge::pipeline::{RecipeRunner, RunConfig, RunError};
use rawforge::recipe::{ObsTime, RecipeLoader};
use rawforge::scheduler::{FailurePolicy, TimingMode};
use rawforge::simulation::{
    Artifact, ArtifactStore, Hdu, Header, JsonArtifactStore, SimulationContext,
    SimulationRequest, Simulator,
};

const RECIPES: &str = r#"
IMAGE_LM_RAW:
  do.catg: IMAGE_LM_RAW
  mode: img_lm
  source:
    name: simple_star
    kwargs: {}
  properties:
    dit: [1.0, 2.0]
    ndit: 1
    filter_name: open
    catg: SCIENCE
    tech: IMAGE,LM
    type: OBJECT
    nObs: 1
"#;

/// Writes a JSON artifact carrying a few engine-style keywords.
#[derive(Default)]
struct FakeEngine {
    requests: Mutex<Vec<SimulationRequest>>,
    fail: bool,
}

fn param(request: &SimulationRequest, key: &str) -> String {
    request
        .parameters
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl Simulator for FakeEngine {
    async fn simulate(&self, request: &SimulationRequest) -> Result<Artifact, SimulationError> {
        self.requests.lock().expect("lock poisoned").push(request.clone());
        if self.fail {
            return Err(SimulationError::Protocol("engine crashed".to_string()));
        }

        let mut header = Header::new();
        header.set(KEY_DPR_TECH, param(request, "OBS.tech"));
        header.set(KEY_DPR_TYPE, param(request, "OBS.type"));
        header.set(KEY_DRS_FILTER, param(request, "OBS.filter_name"));
        header.set(KEY_MJD_OBS, 0.0);
        header.set("engine scratch", "drop me");
        let artifact = Artifact::new(vec![Hdu::with_header(header)]);

        if let Some(path) = &request.output_path {
            JsonArtifactStore
                .write(path, &artifact)
                .await
                .map_err(|e| SimulationError::Protocol(e.to_string()))?;
        }
        Ok(artifact)
    }
}

fn write_recipes(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("recipes.yaml");
    std::fs::write(&path, content).expect("failed to write recipes");
    path
}

fn start() -> ObsTime {
    "2027-01-01 00:00:00".parse().expect("failed to parse start")
}

fn runner(config: RunConfig, engine: Arc<FakeEngine>) -> RecipeRunner {
    RecipeRunner::new(
        config,
        Arc::new(SimulationContext::new()),
        engine,
        Arc::new(JsonArtifactStore),
    )
}

fn base_config(dir: &Path) -> RunConfig {
    RunConfig::new()
        .with_input(write_recipes(dir, RECIPES))
        .with_output_dir(dir.join("output"))
        .with_timing(TimingMode::Sequence {
            start: Some(start()),
        })
}

#[tokio::test]
async fn test_science_and_calibrations_end_to_end() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let dump = dir.path().join("calib.yaml");
    let config = base_config(dir.path())
        .with_calibration_count(1)
        .with_calib_dump(&dump)
        .with_worker_count(2);
    let engine = Arc::new(FakeEngine::default());

    let summary = runner(config, engine.clone())
        .run()
        .await
        .expect("run failed");

    // Two science exposures, then two darks, one sky flat and one lamp flat.
    assert_eq!(summary.science.produced.len(), 2);
    assert_eq!(
        summary.calibrations.names().collect::<Vec<_>>(),
        vec!["d0", "d1", "s2", "l3"]
    );
    assert_eq!(summary.job_count(), 6);
    assert_eq!(summary.reconciled, 6);
    assert_eq!(summary.failed_count(), 0);
    assert_eq!(engine.requests.lock().expect("lock poisoned").len(), 6);

    let science = &summary.science.produced;
    assert_eq!(science[0].timestamp, start());
    assert_eq!(
        science[1].timestamp,
        "2027-01-01 00:00:02.2".parse::<ObsTime>().expect("failed to parse")
    );
    assert_eq!(
        science[0].file_name(),
        "METIS.IMAGE_LM_RAW.2027-01-01T00_00_00.img_lm.1.0.fits"
    );
    assert_eq!(
        science[1].file_name(),
        "METIS.IMAGE_LM_RAW.2027-01-01T00_00_02.img_lm.2.0.fits"
    );

    // Calibrations continue the science timeline.
    let calibration = summary.calibration.as_ref().expect("calibrations dispatched");
    assert!(calibration
        .produced
        .iter()
        .all(|file| file.timestamp > science[1].timestamp));

    let artifact = JsonArtifactStore
        .read(&science[0].path)
        .await
        .expect("failed to read artifact");
    let header = artifact.primary().expect("primary header");
    assert!(!header.contains("engine scratch"));
    assert_eq!(header.get_str(KEY_INS_MODE), Some("IMG_LM"));
    assert_eq!(header.get_str("HIERARCH ESO INS OPTI10 NAME"), Some("open"));
    assert_eq!(
        header.get(KEY_MJD_OBS).map(|v| v.render()),
        Some(rawforge::simulation::HeaderValue::from(start().mjd()).render())
    );

    let dumped = RecipeLoader::load_file(&dump)
        .expect("failed to load calibration dump")
        .into_recipe_set()
        .expect("calibration dump should be valid recipes");
    assert_eq!(dumped.len(), 4);

    let table = dir.path().join("summary.tsv");
    let artifacts = collect_artifacts(&[dir.path().join("output")]);
    assert_eq!(artifacts.len(), 6);
    let rows = write_summary(&JsonArtifactStore, &artifacts, &table)
        .await
        .expect("failed to write summary");
    assert_eq!(rows, 6);
}

#[tokio::test]
async fn test_dry_run_plans_without_simulating() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = base_config(dir.path())
        .with_calibration_count(1)
        .with_dry_run(true);
    let engine = Arc::new(FakeEngine::default());

    let summary = runner(config, engine.clone())
        .run()
        .await
        .expect("dry run failed");

    assert!(summary.science.dry_run);
    assert_eq!(summary.files.len(), 6);
    assert_eq!(summary.reconciled, 0);
    assert!(engine.requests.lock().expect("lock poisoned").is_empty());
    assert!(!dir.path().join("output").exists());
}

#[tokio::test]
async fn test_invalid_recipes_abort_before_simulation() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let recipes = RECIPES.replace("filter_name: open", "filter_name: N2");
    let config = RunConfig::new()
        .with_input(write_recipes(dir.path(), &recipes))
        .with_output_dir(dir.path().join("output"));
    let engine = Arc::new(FakeEngine::default());

    let err = runner(config, engine.clone())
        .run()
        .await
        .expect_err("invalid filter should abort");

    assert!(matches!(err, RunError::Validation { problems } if problems >= 1));
    assert!(engine.requests.lock().expect("lock poisoned").is_empty());
}

#[tokio::test]
async fn test_unknown_category_is_rejected() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = base_config(dir.path()).with_categories(vec!["NOT_A_RECIPE".to_string()]);

    let err = runner(config, Arc::new(FakeEngine::default()))
        .run()
        .await
        .expect_err("unknown category should fail");

    assert!(matches!(
        err,
        RunError::Recipe(RecipeError::UnknownCategoryFilter(ref name)) if name == "NOT_A_RECIPE"
    ));
}

#[tokio::test]
async fn test_keep_going_reports_failures_at_end() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = base_config(dir.path()).with_failure_policy(FailurePolicy::Continue);
    let engine = Arc::new(FakeEngine {
        fail: true,
        ..FakeEngine::default()
    });

    let err = runner(config, engine.clone())
        .run()
        .await
        .expect_err("failures should surface");

    assert!(matches!(
        err,
        RunError::Dispatch(rawforge::error::DispatchError::BatchFailed { failed: 2, total: 2 })
    ));
    assert_eq!(engine.requests.lock().expect("lock poisoned").len(), 2);
}
