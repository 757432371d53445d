//! Engine executable adapter.
//!
//! The request is written as JSON to the child's stdin; the child writes the
//! artifact file itself and prints the artifact (headers as JSON) on stdout.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{Artifact, SimulationContext, SimulationRequest, Simulator};
use crate::error::SimulationError;

/// Runs each simulation in a fresh engine process.
#[derive(Debug, Clone)]
pub struct ProcessSimulator {
    context: Arc<SimulationContext>,
    timeout: Option<Duration>,
}

impl ProcessSimulator {
    pub fn new(context: Arc<SimulationContext>) -> Self {
        Self {
            context,
            timeout: None,
        }
    }

    /// Kills engine runs that exceed `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn command(&self) -> Command {
        let engine = &self.context.engine;
        let mut cmd = Command::new(&engine.program);
        cmd.args(&engine.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref packages) = self.context.packages {
            cmd.env("RAWFORGE_PACKAGES", packages);
        }
        cmd
    }
}

#[async_trait]
impl Simulator for ProcessSimulator {
    async fn simulate(&self, request: &SimulationRequest) -> Result<Artifact, SimulationError> {
        let payload = serde_json::to_vec(request)?;

        let mut child = self
            .command()
            .spawn()
            .map_err(|source| SimulationError::SpawnFailed {
                program: self.context.engine.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }

        debug!(file = %request.label(), "Engine started");

        // Dropping the child on timeout kills it.
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| SimulationError::Timeout(limit))??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            return Err(SimulationError::EngineFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| SimulationError::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{InstrumentMode, SourceSpec};
    use std::collections::BTreeMap;

    fn request() -> SimulationRequest {
        SimulationRequest {
            output_path: None,
            mode: InstrumentMode::ImgLm,
            parameters: BTreeMap::new(),
            source: SourceSpec::new("empty_sky"),
            small: true,
            packages: None,
        }
    }

    fn shell(script: &str) -> ProcessSimulator {
        let context = SimulationContext::new()
            .with_engine("sh", vec!["-c".to_string(), script.to_string()]);
        ProcessSimulator::new(Arc::new(context))
    }

    #[tokio::test]
    async fn test_engine_artifact_parsed_from_stdout() {
        let sim = shell(r#"cat >/dev/null; echo '{"hdus":[{"header":[{"key":"NAXIS","value":0}]}]}'"#);
        let artifact = sim.simulate(&request()).await.expect("engine run failed");
        let primary = artifact.primary().expect("primary header");
        assert!(primary.contains("NAXIS"));
    }

    #[tokio::test]
    async fn test_engine_failure_carries_stderr() {
        let sim = shell("cat >/dev/null; echo boom >&2; exit 3");
        let err = sim.simulate(&request()).await.expect_err("engine must fail");
        match err {
            SimulationError::EngineFailed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_engine_is_spawn_failure() {
        let context = SimulationContext::new().with_engine("/nonexistent/rawforge-engine", vec![]);
        let sim = ProcessSimulator::new(Arc::new(context));
        let err = sim.simulate(&request()).await.expect_err("spawn must fail");
        assert!(matches!(err, SimulationError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_engine() {
        let sim = shell("sleep 5").with_timeout(Duration::from_millis(100));
        let err = sim.simulate(&request()).await.expect_err("must time out");
        assert!(matches!(err, SimulationError::Timeout(_)));
    }
}
