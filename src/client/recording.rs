//! In-memory recording client for tests
//!
//! Records every call in order and simulates just enough backend state
//! (experiments, the active run) to exercise the reporter's control flow.
//! Clones share state, so a test can keep a handle while the reporter owns
//! another.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ClientError, Experiment, ModelBundle, Result, RunHandle, TrackingClient};

/// A recorded client call
#[derive(Clone, Debug, PartialEq)]
pub enum ClientCall {
    GetExperimentByName { name: String },
    CreateExperiment { name: String },
    SetExperiment { name: String },
    ActiveRun,
    StartRun { experiment_id: String },
    LogParams { run_id: String, params: BTreeMap<String, String> },
    LogMetrics { run_id: String, metrics: BTreeMap<String, f64>, step: i64 },
    LogArtifact { run_id: String, path: PathBuf },
    RegisterModel { model_uri: String, name: String },
    LogModel { run_id: String, artifact_path: String },
    EndRun { run_id: String },
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<ClientCall>,
    experiments: BTreeMap<String, Experiment>,
    active: Option<RunHandle>,
    next_experiment: u64,
    next_run: u64,
    fail_on: Option<&'static str>,
}

/// Recording tracking client.
///
/// # Example
///
/// ```
/// use rastrear::client::{ClientCall, RecordingClient, TrackingClient};
///
/// let client = RecordingClient::new();
/// let mut handle = client.clone();
/// let id = handle.create_experiment("demo")?;
/// assert_eq!(id, "exp-1");
/// assert_eq!(client.calls(), vec![ClientCall::CreateExperiment { name: "demo".into() }]);
/// # Ok::<(), rastrear::client::ClientError>(())
/// ```
#[derive(Clone, Debug)]
pub struct RecordingClient {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_experiment: 1,
                next_run: 1,
                ..Inner::default()
            })),
        }
    }

    /// Seed an experiment as already existing on the backend.
    #[must_use]
    pub fn with_experiment(self, name: &str) -> Self {
        {
            let mut inner = self.lock();
            let experiment_id = format!("exp-{}", inner.next_experiment);
            inner.next_experiment += 1;
            inner
                .experiments
                .insert(name.to_string(), Experiment { experiment_id, name: name.to_string() });
        }
        self
    }

    /// Seed an already-active run in the session.
    #[must_use]
    pub fn with_active_run(self, run_id: &str, experiment_id: &str) -> Self {
        self.lock().active = Some(RunHandle {
            run_id: run_id.to_string(),
            experiment_id: experiment_id.to_string(),
        });
        self
    }

    /// Inject a failure into the named operation (trait method name).
    #[must_use]
    pub fn fail_on(self, op: &'static str) -> Self {
        self.lock().fail_on = Some(op);
        self
    }

    /// All calls recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ClientCall> {
        self.lock().calls.clone()
    }

    /// Number of calls recorded so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, then fail it if a failure is injected for `op`.
    fn begin(&self, op: &'static str, call: ClientCall) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(call);
        if inner.fail_on == Some(op) {
            return Err(ClientError::Api {
                code: "INTERNAL_ERROR".into(),
                message: format!("injected failure in {op}"),
            });
        }
        Ok(())
    }
}

impl Default for RecordingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingClient for RecordingClient {
    fn get_experiment_by_name(&mut self, name: &str) -> Result<Option<Experiment>> {
        self.begin(
            "get_experiment_by_name",
            ClientCall::GetExperimentByName { name: name.to_string() },
        )?;
        Ok(self.lock().experiments.get(name).cloned())
    }

    fn create_experiment(&mut self, name: &str) -> Result<String> {
        self.begin("create_experiment", ClientCall::CreateExperiment { name: name.to_string() })?;
        let mut inner = self.lock();
        let experiment_id = format!("exp-{}", inner.next_experiment);
        inner.next_experiment += 1;
        inner.experiments.insert(
            name.to_string(),
            Experiment { experiment_id: experiment_id.clone(), name: name.to_string() },
        );
        Ok(experiment_id)
    }

    fn set_experiment(&mut self, experiment: &Experiment) -> Result<()> {
        self.begin("set_experiment", ClientCall::SetExperiment { name: experiment.name.clone() })
    }

    fn active_run(&mut self) -> Result<Option<RunHandle>> {
        self.begin("active_run", ClientCall::ActiveRun)?;
        Ok(self.lock().active.clone())
    }

    fn start_run(&mut self, experiment_id: &str, _run_name: Option<&str>) -> Result<RunHandle> {
        self.begin("start_run", ClientCall::StartRun { experiment_id: experiment_id.to_string() })?;
        let mut inner = self.lock();
        let run = RunHandle {
            run_id: format!("run-{}", inner.next_run),
            experiment_id: experiment_id.to_string(),
        };
        inner.next_run += 1;
        inner.active = Some(run.clone());
        Ok(run)
    }

    fn log_params(&mut self, run: &RunHandle, params: &BTreeMap<String, String>) -> Result<()> {
        self.begin(
            "log_params",
            ClientCall::LogParams { run_id: run.run_id.clone(), params: params.clone() },
        )
    }

    fn log_metrics(
        &mut self,
        run: &RunHandle,
        metrics: &BTreeMap<String, f64>,
        step: i64,
    ) -> Result<()> {
        self.begin(
            "log_metrics",
            ClientCall::LogMetrics {
                run_id: run.run_id.clone(),
                metrics: metrics.clone(),
                step,
            },
        )
    }

    fn log_artifact(&mut self, run: &RunHandle, path: &Path) -> Result<()> {
        self.begin(
            "log_artifact",
            ClientCall::LogArtifact { run_id: run.run_id.clone(), path: path.to_path_buf() },
        )
    }

    fn register_model(&mut self, model_uri: &str, name: &str) -> Result<()> {
        self.begin(
            "register_model",
            ClientCall::RegisterModel { model_uri: model_uri.to_string(), name: name.to_string() },
        )
    }

    fn log_model(&mut self, run: &RunHandle, bundle: &ModelBundle) -> Result<()> {
        self.begin(
            "log_model",
            ClientCall::LogModel {
                run_id: run.run_id.clone(),
                artifact_path: bundle.artifact_path.clone(),
            },
        )
    }

    fn end_run(&mut self, run: &RunHandle) -> Result<()> {
        self.begin("end_run", ClientCall::EndRun { run_id: run.run_id.clone() })?;
        let mut inner = self.lock();
        if inner.active.as_ref().is_some_and(|a| a.run_id == run.run_id) {
            inner.active = None;
        }
        Ok(())
    }
}
