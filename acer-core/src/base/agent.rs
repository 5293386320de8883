//! Agent.
use super::{Policy, RolloutBatch};
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// Represents a trainable policy.
pub trait Agent: Policy {
    /// Set the policy to training mode.
    fn train(&mut self);

    /// Set the policy to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Performs an optimization step on the given batch.
    ///
    /// `progress` is the fraction of the training budget consumed so far, in `[0, 1]`.
    fn opt(&mut self, batch: &RolloutBatch, progress: f32) -> Result<()> {
        self.opt_with_record(batch, progress).map(|_| ())
    }

    /// Performs an optimization step and returns some information.
    fn opt_with_record(&mut self, batch: &RolloutBatch, progress: f32) -> Result<Record>;

    /// Save the parameters of the agent in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
