//! Tracking backend client contract
//!
//! Provides the [`TrackingClient`] trait and two implementations:
//! - [`MlflowRestClient`] - blocking client for the MLflow REST API 2.0
//! - [`RecordingClient`] - in-memory double that records every call, for tests
//!
//! The trait covers exactly the operations the reporter needs: experiment
//! lookup/creation/selection, run creation and reuse, parameter/metric
//! logging, artifact upload, model registration, and model bundle logging.

mod recording;
mod rest;

pub use recording::{ClientCall, RecordingClient};
pub use rest::MlflowRestClient;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors from tracking backend operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (connection, TLS, request build)
    #[error("HTTP error: {message}")]
    Http { message: String },

    /// Backend rejected the request
    #[error("Tracking API error {code}: {message}")]
    Api { code: String, message: String },

    /// Backend response is missing an expected field
    #[error("Malformed response: missing field '{0}'")]
    MissingField(&'static str),

    /// Artifact path cannot be uploaded (no file name component)
    #[error("Invalid artifact path: {path}")]
    InvalidArtifact { path: PathBuf },

    /// IO error reading an artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error (MLmodel descriptor)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result alias for tracking client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// A named experiment on the tracking backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    /// Backend-assigned identifier
    pub experiment_id: String,
    /// Experiment name
    pub name: String,
}

/// Handle to a run on the tracking backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    /// Opaque identifier correlating all calls for one training run
    pub run_id: String,
    /// Experiment the run belongs to
    pub experiment_id: String,
}

/// Generic model bundle logged at run end.
///
/// Wraps the trainer's save directory as a loadable model artifact, with the
/// caller's code directory recorded for reproducibility.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelBundle {
    /// Artifact path under the run where the bundle is placed
    pub artifact_path: String,
    /// Directory bundled as the model payload
    pub model_dir: PathBuf,
    /// Caller code directory included for reproducibility
    pub code_dir: Option<PathBuf>,
    /// Loader flavor recorded in the MLmodel descriptor
    pub flavor: String,
}

/// Operations against an experiment-tracking backend.
///
/// Implementations hold the session state (selected experiment, active run);
/// all calls are synchronous and block until the backend responds or fails.
pub trait TrackingClient: Send {
    /// Look up an experiment by name. `Ok(None)` when it does not exist.
    fn get_experiment_by_name(&mut self, name: &str) -> Result<Option<Experiment>>;

    /// Create an experiment, returning its backend-assigned id.
    fn create_experiment(&mut self, name: &str) -> Result<String>;

    /// Select an experiment as current for the session.
    fn set_experiment(&mut self, experiment: &Experiment) -> Result<()>;

    /// The run already active in this session, if any.
    fn active_run(&mut self) -> Result<Option<RunHandle>>;

    /// Start a new run scoped to the given experiment and make it active.
    fn start_run(&mut self, experiment_id: &str, run_name: Option<&str>) -> Result<RunHandle>;

    /// Log run parameters (hyperparameters).
    fn log_params(&mut self, run: &RunHandle, params: &BTreeMap<String, String>) -> Result<()>;

    /// Log metrics tagged with a step.
    fn log_metrics(&mut self, run: &RunHandle, metrics: &BTreeMap<String, f64>, step: i64)
        -> Result<()>;

    /// Upload a file as a run artifact.
    fn log_artifact(&mut self, run: &RunHandle, path: &Path) -> Result<()>;

    /// Register a model name pointing at a storage URI.
    fn register_model(&mut self, model_uri: &str, name: &str) -> Result<()>;

    /// Log a generic model bundle under the run.
    fn log_model(&mut self, run: &RunHandle, bundle: &ModelBundle) -> Result<()>;

    /// Mark the run finished on the backend.
    fn end_run(&mut self, run: &RunHandle) -> Result<()>;
}
