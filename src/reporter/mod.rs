//! Best-effort tracking reporter
//!
//! Forwards training-run metadata (hyperparameters, per-epoch metrics,
//! checkpoint artifacts, the final model bundle) to an MLflow-compatible
//! tracking backend. Every hook is wrapped the same way: a backend failure
//! logs a warning and permanently disables the reporter, and never aborts
//! training.
//!
//! # Example
//!
//! ```
//! use rastrear::callback::TrainContext;
//! use rastrear::client::RecordingClient;
//! use rastrear::config::ReporterSettings;
//! use rastrear::reporter::{MlflowReporter, ReporterStatus};
//!
//! let client = RecordingClient::new();
//! let settings = ReporterSettings::default().tracking_uri("http://localhost:5000");
//! let mut reporter = MlflowReporter::new(client.clone(), settings);
//!
//! let ctx = TrainContext::default();
//! reporter.on_run_start(&ctx);
//! assert_eq!(reporter.status(), ReporterStatus::Active);
//! reporter.on_epoch_end(&ctx);
//! ```

pub mod metrics;

use tracing::{error, info, warn};

use crate::callback::{TrainContext, TrainerCallback};
use crate::client::{
    self, Experiment, MlflowRestClient, ModelBundle, RunHandle, TrackingClient,
};
use crate::config::{ReporterSettings, DEFAULT_EXPERIMENT, TRACKING_URI_ENV};

/// Reporter lifecycle status.
///
/// There is no transition back to `Active` within a process: once disabled,
/// every subsequent hook is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReporterStatus {
    /// Endpoint gate not yet (or never) satisfied; hooks no-op
    NotConfigured,
    /// Run started, hooks forward to the backend
    Active,
    /// Permanently off: initialization or a backend call failed, or the run ended
    Disabled,
}

/// Tracking reporter for training lifecycle events.
///
/// Owns the tracking client and the run handle; no process-global state.
/// Construct once and register with a
/// [`CallbackManager`](crate::callback::CallbackManager), or invoke the hooks
/// directly from the training loop.
pub struct MlflowReporter {
    client: Option<Box<dyn TrackingClient>>,
    settings: ReporterSettings,
    status: ReporterStatus,
    run: Option<RunHandle>,
    experiment_name: String,
}

impl MlflowReporter {
    /// Create a reporter over an explicit client.
    ///
    /// The endpoint gate still applies at run start: without a resolvable
    /// tracking URI (settings or `MLFLOW_TRACKING_URI`) the reporter stays
    /// off. Nonzero ranks never report.
    pub fn new(client: impl TrackingClient + 'static, settings: ReporterSettings) -> Self {
        let mut reporter = Self::unconfigured(settings);
        if reporter.settings.rank == 0 {
            reporter.client = Some(Box::new(client));
        } else {
            info!(rank = reporter.settings.rank, "nonzero rank does not report, tracking off");
        }
        reporter
    }

    /// Create a reporter with a REST client built from the environment.
    ///
    /// `MLFLOW_TRACKING_URI` unset leaves the reporter not configured; a
    /// client build failure disables it. Neither aborts the caller.
    pub fn from_env(settings: ReporterSettings) -> Self {
        if settings.rank != 0 {
            info!(rank = settings.rank, "nonzero rank does not report, tracking off");
            return Self::unconfigured(settings);
        }

        let Some(uri) = settings.resolve_uri() else {
            info!("{TRACKING_URI_ENV} is not set, tracking off");
            return Self::unconfigured(settings);
        };

        match MlflowRestClient::new(&uri) {
            Ok(rest) => {
                let mut reporter = Self::unconfigured(settings);
                reporter.client = Some(Box::new(rest));
                reporter
            }
            Err(err) => {
                error!("failed to build tracking client for {uri}: {err}");
                warn!("continuing without tracking");
                let mut reporter = Self::unconfigured(settings);
                reporter.status = ReporterStatus::Disabled;
                reporter
            }
        }
    }

    fn unconfigured(settings: ReporterSettings) -> Self {
        Self {
            client: None,
            settings,
            status: ReporterStatus::NotConfigured,
            run: None,
            experiment_name: DEFAULT_EXPERIMENT.to_string(),
        }
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> ReporterStatus {
        self.status
    }

    /// Identifier of the tracked run, once one is active.
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.run.as_ref().map(|r| r.run_id.as_str())
    }

    /// The resolved experiment name.
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Start tracking for the run.
    ///
    /// Resolves the experiment name from the trainer config, creates the
    /// experiment if absent, selects it, reuses an already-active run or
    /// starts a new one, and logs the model hyperparameters. Any failure
    /// disables tracking for the rest of the run.
    pub fn on_run_start(&mut self, ctx: &TrainContext) {
        if self.status != ReporterStatus::NotConfigured {
            return;
        }

        self.experiment_name = ctx.config.experiment_name().to_string();

        if self.settings.resolve_uri().is_none() {
            info!("{TRACKING_URI_ENV} is not set, tracking stays off for this run");
            return;
        }
        let Some(client) = self.client.as_mut() else {
            return;
        };

        match Self::start_tracking(client.as_mut(), &self.experiment_name, ctx) {
            Ok(run) => {
                info!(run_id = %run.run_id, experiment = %self.experiment_name, "tracking run active");
                self.run = Some(run);
                self.status = ReporterStatus::Active;
            }
            Err(err) => {
                error!("tracking initialization failed: {err}");
                warn!("continuing without tracking");
                self.status = ReporterStatus::Disabled;
            }
        }
    }

    fn start_tracking(
        client: &mut dyn TrackingClient,
        experiment_name: &str,
        ctx: &TrainContext,
    ) -> client::Result<RunHandle> {
        let experiment = match client.get_experiment_by_name(experiment_name)? {
            Some(existing) => existing,
            None => {
                let experiment_id = client.create_experiment(experiment_name)?;
                Experiment { experiment_id, name: experiment_name.to_string() }
            }
        };
        client.set_experiment(&experiment)?;

        let run = match client.active_run()? {
            Some(active) => {
                info!(run_id = %active.run_id, "reusing already-active run");
                active
            }
            None => client.start_run(&experiment.experiment_id, ctx.config.run_name.as_deref())?,
        };

        if ctx.model.is_distributed() {
            info!("logging parameters from data-parallel wrapped model");
        }
        client.log_params(&run, ctx.model.unwrapped())?;
        Ok(run)
    }

    /// Submit the epoch's metrics, keys sanitized and values coerced,
    /// tagged with the epoch number as step.
    pub fn on_epoch_end(&mut self, ctx: &TrainContext) {
        if self.status != ReporterStatus::Active {
            return;
        }
        let coerced = metrics::coerce_metrics(&ctx.metrics);
        let step = ctx.epoch as i64;
        self.submit("metric submission", |client, run| client.log_metrics(run, &coerced, step));
    }

    /// Upload the latest checkpoint as a run artifact.
    pub fn on_checkpoint_save(&mut self, ctx: &TrainContext) {
        let Some(path) = ctx.last_checkpoint.clone() else {
            return;
        };
        self.submit("checkpoint upload", |client, run| client.log_artifact(run, &path));
    }

    /// Finalize the run: upload the best checkpoint, register the model
    /// under the sanitized experiment name, log the generic model bundle
    /// wrapping the save directory, and mark the backend run finished.
    ///
    /// The reporter is terminal afterwards.
    pub fn on_run_end(&mut self, ctx: &TrainContext) {
        if self.status != ReporterStatus::Active {
            return;
        }

        let registry_name = metrics::registry_model_name(&self.experiment_name);
        let bundle = ModelBundle {
            artifact_path: registry_name.clone(),
            model_dir: ctx.save_dir.clone(),
            code_dir: self.settings.code_dir.clone(),
            flavor: "pyfunc".to_string(),
        };
        let best = ctx.best_checkpoint.clone();

        self.submit("run finalization", move |client, run| {
            if let Some(best) = &best {
                client.log_artifact(run, best)?;
            }
            let model_uri = format!("runs:/{}/", run.run_id);
            client.register_model(&model_uri, &registry_name)?;
            client.log_model(run, &bundle)?;
            client.end_run(run)
        });

        if self.status == ReporterStatus::Active {
            info!("tracking run complete");
            self.status = ReporterStatus::Disabled;
        }
    }

    /// Uniform failure containment for run-scoped calls: a backend error
    /// logs a warning and disables the reporter, nothing propagates.
    fn submit<F>(&mut self, what: &str, op: F)
    where
        F: FnOnce(&mut dyn TrackingClient, &RunHandle) -> client::Result<()>,
    {
        if self.status != ReporterStatus::Active {
            return;
        }
        let (Some(client), Some(run)) = (self.client.as_mut(), self.run.as_ref()) else {
            return;
        };
        if let Err(err) = op(client.as_mut(), run) {
            warn!("tracking {what} failed, tracking disabled for the rest of the run: {err}");
            self.status = ReporterStatus::Disabled;
        }
    }
}

impl TrainerCallback for MlflowReporter {
    fn on_run_start(&mut self, ctx: &TrainContext) {
        Self::on_run_start(self, ctx);
    }

    fn on_epoch_end(&mut self, ctx: &TrainContext) {
        Self::on_epoch_end(self, ctx);
    }

    fn on_checkpoint_save(&mut self, ctx: &TrainContext) {
        Self::on_checkpoint_save(self, ctx);
    }

    fn on_run_end(&mut self, ctx: &TrainContext) {
        Self::on_run_end(self, ctx);
    }

    fn name(&self) -> &'static str {
        "MlflowReporter"
    }
}

impl std::fmt::Debug for MlflowReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlflowReporter")
            .field("status", &self.status)
            .field("experiment_name", &self.experiment_name)
            .field("run", &self.run)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::*;
    use crate::callback::{MetricValue, ModelParams};
    use crate::client::{ClientCall, RecordingClient};
    use crate::config::TrainerConfig;

    fn ctx_with_project(project: Option<&str>) -> TrainContext {
        let mut params = BTreeMap::new();
        params.insert("lr".to_string(), "0.01".to_string());
        params.insert("epochs".to_string(), "100".to_string());
        TrainContext {
            config: TrainerConfig { project: project.map(String::from), run_name: None },
            model: ModelParams::Plain(params),
            ..Default::default()
        }
    }

    fn reporter_over(client: &RecordingClient) -> MlflowReporter {
        MlflowReporter::new(
            client.clone(),
            ReporterSettings::default().tracking_uri("http://127.0.0.1:5000"),
        )
    }

    fn index_of(calls: &[ClientCall], pred: impl Fn(&ClientCall) -> bool) -> usize {
        calls.iter().position(pred).expect("expected call not recorded")
    }

    #[test]
    fn test_missing_endpoint_leaves_reporter_unconfigured() {
        let saved = std::env::var(TRACKING_URI_ENV).ok();
        std::env::remove_var(TRACKING_URI_ENV);

        let recording = RecordingClient::new();
        let mut reporter = MlflowReporter::new(recording.clone(), ReporterSettings::default());
        let ctx = ctx_with_project(None);
        reporter.on_run_start(&ctx);
        reporter.on_epoch_end(&ctx);
        reporter.on_checkpoint_save(&ctx);
        reporter.on_run_end(&ctx);

        assert_eq!(reporter.status(), ReporterStatus::NotConfigured);
        assert_eq!(recording.call_count(), 0);

        let mut env_reporter = MlflowReporter::from_env(ReporterSettings::default());
        env_reporter.on_run_start(&ctx);
        assert_eq!(env_reporter.status(), ReporterStatus::NotConfigured);

        if let Some(value) = saved {
            std::env::set_var(TRACKING_URI_ENV, value);
        }
    }

    #[test]
    fn test_default_experiment_name_resolved() {
        let recording = RecordingClient::new();
        let mut reporter = reporter_over(&recording);
        reporter.on_run_start(&ctx_with_project(None));

        assert_eq!(reporter.experiment_name(), "/Shared/YOLOv8");
        assert_eq!(
            recording.calls()[0],
            ClientCall::GetExperimentByName { name: "/Shared/YOLOv8".into() }
        );
    }

    #[test]
    fn test_missing_experiment_created_before_selected() {
        let recording = RecordingClient::new();
        let mut reporter = reporter_over(&recording);
        reporter.on_run_start(&ctx_with_project(Some("team/proj")));

        let calls = recording.calls();
        let create = index_of(&calls, |c| matches!(c, ClientCall::CreateExperiment { .. }));
        let select = index_of(&calls, |c| matches!(c, ClientCall::SetExperiment { .. }));
        assert!(create < select);
        assert_eq!(reporter.status(), ReporterStatus::Active);
    }

    #[test]
    fn test_existing_experiment_not_recreated() {
        let recording = RecordingClient::new().with_experiment("team/proj");
        let mut reporter = reporter_over(&recording);
        reporter.on_run_start(&ctx_with_project(Some("team/proj")));

        assert!(!recording
            .calls()
            .iter()
            .any(|c| matches!(c, ClientCall::CreateExperiment { .. })));
        assert_eq!(reporter.status(), ReporterStatus::Active);
    }

    #[test]
    fn test_active_run_reused() {
        let recording = RecordingClient::new()
            .with_experiment("team/proj")
            .with_active_run("run-77", "exp-1");
        let mut reporter = reporter_over(&recording);
        reporter.on_run_start(&ctx_with_project(Some("team/proj")));

        assert!(!recording.calls().iter().any(|c| matches!(c, ClientCall::StartRun { .. })));
        assert_eq!(reporter.run_id(), Some("run-77"));
    }

    #[test]
    fn test_params_logged_from_unwrapped_model() {
        let recording = RecordingClient::new();
        let mut reporter = reporter_over(&recording);

        let mut inner = BTreeMap::new();
        inner.insert("lr".to_string(), "0.001".to_string());
        let mut ctx = ctx_with_project(None);
        ctx.model = ModelParams::Distributed { inner: inner.clone(), world_size: 4 };
        reporter.on_run_start(&ctx);

        let logged = recording.calls().into_iter().find_map(|c| match c {
            ClientCall::LogParams { params, .. } => Some(params),
            _ => None,
        });
        assert_eq!(logged, Some(inner));
    }

    #[test]
    fn test_epoch_metrics_sanitized_and_coerced() {
        let recording = RecordingClient::new();
        let mut reporter = reporter_over(&recording);
        let mut ctx = ctx_with_project(None);
        reporter.on_run_start(&ctx);

        ctx.epoch = 3;
        ctx.metrics.insert("loss(total)".to_string(), MetricValue::from("1.5"));
        ctx.metrics.insert("acc".to_string(), MetricValue::Float(0.9));
        reporter.on_epoch_end(&ctx);

        let mut expected = BTreeMap::new();
        expected.insert("losstotal".to_string(), 1.5);
        expected.insert("acc".to_string(), 0.9);
        let last = recording.calls().pop().unwrap();
        assert_eq!(
            last,
            ClientCall::LogMetrics { run_id: "run-1".into(), metrics: expected, step: 3 }
        );
    }

    #[test]
    fn test_checkpoint_save_uploads_latest() {
        let recording = RecordingClient::new();
        let mut reporter = reporter_over(&recording);
        let mut ctx = ctx_with_project(None);
        reporter.on_run_start(&ctx);

        ctx.last_checkpoint = Some(PathBuf::from("/runs/last.pt"));
        reporter.on_checkpoint_save(&ctx);

        let last = recording.calls().pop().unwrap();
        assert_eq!(
            last,
            ClientCall::LogArtifact { run_id: "run-1".into(), path: "/runs/last.pt".into() }
        );
    }

    #[test]
    fn test_start_failure_disables_permanently() {
        let recording = RecordingClient::new().fail_on("create_experiment");
        let mut reporter = reporter_over(&recording);
        let ctx = ctx_with_project(None);

        reporter.on_run_start(&ctx);
        assert_eq!(reporter.status(), ReporterStatus::Disabled);

        let calls_after_start = recording.call_count();
        reporter.on_epoch_end(&ctx);
        reporter.on_checkpoint_save(&ctx);
        reporter.on_run_end(&ctx);
        reporter.on_run_start(&ctx);
        assert_eq!(recording.call_count(), calls_after_start);
        assert_eq!(reporter.status(), ReporterStatus::Disabled);
    }

    #[test]
    fn test_mid_run_failure_disables() {
        let recording = RecordingClient::new().fail_on("log_metrics");
        let mut reporter = reporter_over(&recording);
        let mut ctx = ctx_with_project(None);
        reporter.on_run_start(&ctx);
        assert_eq!(reporter.status(), ReporterStatus::Active);

        ctx.metrics.insert("loss".to_string(), MetricValue::Float(1.0));
        reporter.on_epoch_end(&ctx);
        assert_eq!(reporter.status(), ReporterStatus::Disabled);

        let calls_after_failure = recording.call_count();
        ctx.last_checkpoint = Some(PathBuf::from("/runs/last.pt"));
        reporter.on_checkpoint_save(&ctx);
        assert_eq!(recording.call_count(), calls_after_failure);
    }

    #[test]
    fn test_run_end_registers_sanitized_name_in_order() {
        let recording = RecordingClient::new();
        let mut reporter = reporter_over(&recording);
        let mut ctx = ctx_with_project(Some("team/proj"));
        reporter.on_run_start(&ctx);

        ctx.best_checkpoint = Some(PathBuf::from("/runs/best.pt"));
        ctx.save_dir = PathBuf::from("/runs/exp1");
        reporter.on_run_end(&ctx);

        let calls = recording.calls();
        let best = index_of(&calls, |c| {
            matches!(c, ClientCall::LogArtifact { path, .. } if path.ends_with("best.pt"))
        });
        let register = index_of(&calls, |c| matches!(c, ClientCall::RegisterModel { .. }));
        let model = index_of(&calls, |c| matches!(c, ClientCall::LogModel { .. }));
        let end = index_of(&calls, |c| matches!(c, ClientCall::EndRun { .. }));
        assert!(best < register && register < model && model < end);

        assert_eq!(
            calls[register],
            ClientCall::RegisterModel { model_uri: "runs:/run-1/".into(), name: "team_proj".into() }
        );
        // The experiment-name binding itself is never mutated
        assert_eq!(reporter.experiment_name(), "team/proj");
    }

    #[test]
    fn test_run_end_is_terminal() {
        let recording = RecordingClient::new();
        let mut reporter = reporter_over(&recording);
        let mut ctx = ctx_with_project(None);
        reporter.on_run_start(&ctx);
        reporter.on_run_end(&ctx);
        assert_eq!(reporter.status(), ReporterStatus::Disabled);

        let calls_after_end = recording.call_count();
        ctx.metrics.insert("loss".to_string(), MetricValue::Float(0.5));
        reporter.on_epoch_end(&ctx);
        assert_eq!(recording.call_count(), calls_after_end);
    }

    #[test]
    fn test_nonzero_rank_never_reports() {
        let recording = RecordingClient::new();
        let mut reporter = MlflowReporter::new(
            recording.clone(),
            ReporterSettings::default().tracking_uri("http://127.0.0.1:5000").rank(1),
        );
        let ctx = ctx_with_project(None);
        reporter.on_run_start(&ctx);
        reporter.on_epoch_end(&ctx);

        assert_eq!(recording.call_count(), 0);
        assert_eq!(reporter.status(), ReporterStatus::NotConfigured);
    }

    #[test]
    fn test_callback_name() {
        let reporter = reporter_over(&RecordingClient::new());
        assert_eq!(TrainerCallback::name(&reporter), "MlflowReporter");
    }
}
