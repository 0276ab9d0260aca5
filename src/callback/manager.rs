//! Callback manager for dispatching events to multiple callbacks

use super::traits::{TrainContext, TrainerCallback};

/// Manages multiple callbacks and dispatches events.
///
/// Callbacks fire in registration order. Every registered callback sees
/// every event; callbacks cannot veto or short-circuit each other.
pub struct CallbackManager {
    callbacks: Vec<Box<dyn TrainerCallback>>,
}

impl CallbackManager {
    /// Create new callback manager
    #[must_use]
    pub fn new() -> Self {
        Self { callbacks: Vec::new() }
    }

    /// Add a callback
    pub fn add<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    /// Check if no callbacks are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Get number of callbacks
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Fire run start event
    pub fn on_run_start(&mut self, ctx: &TrainContext) {
        for cb in &mut self.callbacks {
            cb.on_run_start(ctx);
        }
    }

    /// Fire epoch end event
    pub fn on_epoch_end(&mut self, ctx: &TrainContext) {
        for cb in &mut self.callbacks {
            cb.on_epoch_end(ctx);
        }
    }

    /// Fire checkpoint save event
    pub fn on_checkpoint_save(&mut self, ctx: &TrainContext) {
        for cb in &mut self.callbacks {
            cb.on_checkpoint_save(ctx);
        }
    }

    /// Fire run end event
    pub fn on_run_end(&mut self, ctx: &TrainContext) {
        for cb in &mut self.callbacks {
            cb.on_run_end(ctx);
        }
    }
}

impl Default for CallbackManager {
    fn default() -> Self {
        Self::new()
    }
}
