//! Callback system for training lifecycle events
//!
//! Provides the hooks a training loop invokes at fixed points:
//! - `on_run_start` - once, before the first epoch
//! - `on_epoch_end` - after every epoch
//! - `on_checkpoint_save` - after every checkpoint write
//! - `on_run_end` - once, after training finishes
//!
//! # Example
//!
//! ```rust
//! use rastrear::callback::{TrainerCallback, TrainContext};
//!
//! struct PrintCallback;
//!
//! impl TrainerCallback for PrintCallback {
//!     fn on_epoch_end(&mut self, ctx: &TrainContext) {
//!         println!("Epoch {} finished with {} metrics", ctx.epoch, ctx.metrics.len());
//!     }
//! }
//! ```

mod manager;
mod traits;

pub use manager::CallbackManager;
pub use traits::{MetricValue, ModelParams, TrainContext, TrainerCallback};
