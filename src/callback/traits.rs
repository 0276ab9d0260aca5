//! Core types for the training callback contract
//!
//! This module provides the foundational types for lifecycle hooks:
//! - `TrainContext` - Trainer state passed to callbacks
//! - `ModelParams` - Hyperparameter set, possibly wrapped for data-parallel execution
//! - `MetricValue` - Numeric-convertible metric value
//! - `TrainerCallback` - The trait all callbacks implement

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::TrainerConfig;

/// A metric value as produced by the trainer.
///
/// Trainers emit metrics either as numbers or as string-encoded numbers;
/// both coerce to `f64` before submission to the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Already numeric
    Float(f64),
    /// String-encoded number (e.g. `"1.5"`)
    Text(String),
}

impl MetricValue {
    /// Coerce to `f64`. Returns `None` for non-numeric text.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetricValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Model hyperparameter set.
///
/// Under data-parallel training the model is wrapped; one level of unwrap
/// reaches the real parameter set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelParams {
    /// Unwrapped model parameters
    Plain(BTreeMap<String, String>),
    /// Parameters behind a data-parallel wrapper
    Distributed {
        /// The underlying parameter set
        inner: BTreeMap<String, String>,
        /// Number of participating processes
        world_size: usize,
    },
}

impl ModelParams {
    /// Reach the underlying parameter set, unwrapping one level if needed.
    #[must_use]
    pub fn unwrapped(&self) -> &BTreeMap<String, String> {
        match self {
            Self::Plain(params) => params,
            Self::Distributed { inner, .. } => inner,
        }
    }

    /// Whether the model is wrapped for data-parallel execution.
    #[must_use]
    pub fn is_distributed(&self) -> bool {
        matches!(self, Self::Distributed { .. })
    }
}

impl Default for ModelParams {
    fn default() -> Self {
        Self::Plain(BTreeMap::new())
    }
}

/// Snapshot of trainer state passed to every callback.
#[derive(Clone, Debug, Default)]
pub struct TrainContext {
    /// Trainer configuration
    pub config: TrainerConfig,
    /// Model hyperparameters
    pub model: ModelParams,
    /// Metrics for the current epoch
    pub metrics: BTreeMap<String, MetricValue>,
    /// Current epoch (0-indexed, monotonically increasing)
    pub epoch: usize,
    /// Path of the most recently saved checkpoint
    pub last_checkpoint: Option<PathBuf>,
    /// Path of the best checkpoint so far
    pub best_checkpoint: Option<PathBuf>,
    /// Directory where the trainer saves its outputs
    pub save_dir: PathBuf,
}

/// Trait for training lifecycle callbacks.
///
/// Implement this trait to observe training events. All methods have
/// default no-op implementations, so you only need to implement the
/// events you care about. Hooks are observers: they return nothing and
/// must never panic, so a misbehaving callback cannot abort training.
pub trait TrainerCallback: Send {
    /// Called once when the training run starts
    fn on_run_start(&mut self, _ctx: &TrainContext) {}

    /// Called after each epoch, with `ctx.metrics` and `ctx.epoch` current
    fn on_epoch_end(&mut self, _ctx: &TrainContext) {}

    /// Called after each checkpoint save, with `ctx.last_checkpoint` set
    fn on_checkpoint_save(&mut self, _ctx: &TrainContext) {}

    /// Called once when the training run ends
    fn on_run_end(&mut self, _ctx: &TrainContext) {}

    /// Get callback name for logging
    fn name(&self) -> &'static str {
        "TrainerCallback"
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Text-encoded floats coerce back to the same value
        #[test]
        fn text_metric_roundtrips(v in -1e9f64..1e9) {
            let text = MetricValue::Text(format!("{v}"));
            let coerced = text.as_f64();
            prop_assert!(coerced.is_some());
            prop_assert!((coerced.unwrap() - v).abs() < 1e-6 * v.abs().max(1.0));
        }

        /// Unwrapping is insensitive to the distributed wrapper
        #[test]
        fn unwrap_ignores_wrapper(world_size in 1usize..64) {
            let mut params = BTreeMap::new();
            params.insert("epochs".to_string(), "100".to_string());

            let plain = ModelParams::Plain(params.clone());
            let wrapped = ModelParams::Distributed { inner: params, world_size };
            prop_assert_eq!(plain.unwrapped(), wrapped.unwrapped());
        }
    }
}
