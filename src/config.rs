//! Reporter configuration and environment resolution
//!
//! Two small config surfaces:
//! - [`TrainerConfig`] - the slice of trainer configuration the reporter reads
//! - [`ReporterSettings`] - the reporter's own knobs (endpoint, rank, code dir)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable naming the tracking endpoint URL.
///
/// Tracking stays off for the run when this is unset and no explicit
/// URI override is configured.
pub const TRACKING_URI_ENV: &str = "MLFLOW_TRACKING_URI";

/// Experiment name used when the trainer config names no project.
pub const DEFAULT_EXPERIMENT: &str = "/Shared/YOLOv8";

/// The slice of trainer configuration the reporter consumes.
///
/// The trainer owns a much larger configuration; the reporter only needs
/// the project name (reused as the experiment name) and an optional
/// human-readable run name.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Project name, reused as the experiment name on the backend
    pub project: Option<String>,
    /// Optional human-readable run name
    pub run_name: Option<String>,
}

impl TrainerConfig {
    /// Resolve the experiment name: configured project, else the default.
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        self.project.as_deref().unwrap_or(DEFAULT_EXPERIMENT)
    }
}

/// Reporter-level settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterSettings {
    /// Tracking endpoint; resolved from `MLFLOW_TRACKING_URI` when `None`
    pub tracking_uri: Option<String>,
    /// Process rank under distributed training; only rank zero reports
    pub rank: usize,
    /// Code directory bundled with the final model for reproducibility
    pub code_dir: Option<PathBuf>,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self { tracking_uri: None, rank: 0, code_dir: None }
    }
}

impl ReporterSettings {
    /// Settings with the tracking URI taken from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self { tracking_uri: env_tracking_uri(), ..Self::default() }
    }

    /// Set an explicit tracking URI, bypassing the environment.
    #[must_use]
    pub fn tracking_uri(mut self, uri: impl Into<String>) -> Self {
        self.tracking_uri = Some(uri.into());
        self
    }

    /// Set the process rank.
    #[must_use]
    pub fn rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Set the code directory included in the final model bundle.
    #[must_use]
    pub fn code_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.code_dir = Some(dir.into());
        self
    }

    /// Resolve the effective tracking URI.
    ///
    /// Priority:
    /// 1. Explicit `tracking_uri` setting
    /// 2. `MLFLOW_TRACKING_URI` environment variable
    #[must_use]
    pub fn resolve_uri(&self) -> Option<String> {
        self.tracking_uri.clone().or_else(env_tracking_uri)
    }
}

fn env_tracking_uri() -> Option<String> {
    std::env::var(TRACKING_URI_ENV).ok().filter(|uri| !uri.is_empty())
}
