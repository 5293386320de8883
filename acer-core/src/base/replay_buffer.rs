//! Replay buffer.
use super::{Rollout, RolloutBatch};
use anyhow::Result;

/// Interface of replay buffers storing whole rollouts.
pub trait ReplayBufferBase {
    /// Configuration.
    type Config: Clone;

    /// Builds a replay buffer.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Stores a rollout.
    fn put(&mut self, rollout: &Rollout) -> Result<()>;

    /// Returns `true` if the buffer holds at least `frames` steps per environment.
    fn has_at_least(&self, frames: usize) -> bool;

    /// Returns `true` if a rollout has ever been stored.
    fn can_sample(&self) -> bool;

    /// Samples a batch shaped as the rollouts produced by the runner.
    fn get(&mut self) -> Result<RolloutBatch>;
}
