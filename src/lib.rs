//! # rastrear
//!
//! Best-effort experiment tracking hooks for model-training loops.
//!
//! A training loop invokes four lifecycle hooks — run start, epoch end,
//! checkpoint save, run end — and the reporter forwards hyperparameters,
//! metrics, and checkpoint artifacts to an MLflow-compatible tracking
//! backend. Tracking is strictly best-effort: when the backend is not
//! configured, unreachable, or fails mid-run, the hooks become no-ops and
//! training proceeds untouched.
//!
//! # Architecture
//!
//! - **`callback`**: the hook contract ([`TrainerCallback`], [`TrainContext`])
//!   and a dispatcher ([`CallbackManager`])
//! - **`client`**: the backend seam ([`TrackingClient`]) with a blocking
//!   MLflow REST implementation and an in-memory recording double
//! - **`reporter`**: [`MlflowReporter`], the stateful hook implementation
//! - **`config`**: trainer/reporter settings and `MLFLOW_TRACKING_URI`
//!   resolution
//!
//! # Example
//!
//! ```
//! use rastrear::callback::{CallbackManager, TrainContext};
//! use rastrear::client::RecordingClient;
//! use rastrear::config::ReporterSettings;
//! use rastrear::reporter::MlflowReporter;
//!
//! let client = RecordingClient::new();
//! let settings = ReporterSettings::default().tracking_uri("http://localhost:5000");
//!
//! let mut callbacks = CallbackManager::new();
//! callbacks.add(MlflowReporter::new(client.clone(), settings));
//!
//! let mut ctx = TrainContext::default();
//! callbacks.on_run_start(&ctx);
//! for epoch in 0..3 {
//!     ctx.epoch = epoch;
//!     callbacks.on_epoch_end(&ctx);
//! }
//! callbacks.on_run_end(&ctx);
//! assert!(!client.calls().is_empty());
//! ```

pub mod callback;
pub mod client;
pub mod config;
pub mod reporter;

pub use callback::{CallbackManager, MetricValue, ModelParams, TrainContext, TrainerCallback};
pub use client::{
    ClientCall, ClientError, Experiment, MlflowRestClient, ModelBundle, RecordingClient,
    RunHandle, TrackingClient,
};
pub use config::{ReporterSettings, TrainerConfig, DEFAULT_EXPERIMENT, TRACKING_URI_ENV};
pub use reporter::{MlflowReporter, ReporterStatus};
