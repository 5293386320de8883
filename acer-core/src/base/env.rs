//! Environment.
use super::{Step, VecStep};
use crate::record::Record;
use anyhow::Result;

/// Represents an environment with a discrete action space.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Shape of a single frame, channel-first.
    fn frame_shape(&self) -> Vec<usize>;

    /// The number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Performes an environment step.
    fn step(&mut self, act: i64) -> Result<(Step, Record)>;

    /// Performes an environment step and resets the environment if an episode ends.
    ///
    /// The initial observation of the next episode is put in [`Step::init_obs`].
    fn step_with_reset(&mut self, act: i64) -> Result<(Step, Record)> {
        let (mut step, record) = self.step(act)?;
        if step.is_done() {
            step.init_obs = Some(self.reset()?);
        }
        Ok((step, record))
    }
}

/// A pool of environments stepped synchronously.
pub trait VecEnv {
    /// The number of environments.
    fn n_envs(&self) -> usize;

    /// Shape of a single frame, channel-first.
    fn frame_shape(&self) -> Vec<usize>;

    /// The number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Resets all environments and returns the initial frames, env-major.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Applies one action per environment.
    ///
    /// Environments that finished an episode are reset automatically.
    fn step(&mut self, acts: &[i64]) -> Result<(VecStep, Record)>;
}
