//! Configuration of [`ReplayBuffer`](super::ReplayBuffer).
use crate::error::AcerError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// The number of parallel environments.
    pub n_envs: usize,

    /// The number of steps per rollout.
    pub n_steps: usize,

    /// The number of stacked frames.
    pub n_stack: usize,

    /// Capacity in environment steps per environment. The buffer holds
    /// `size / n_steps` rollouts.
    pub size: usize,

    /// Random seed for sampling.
    pub seed: u64,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            n_envs: 1,
            n_steps: 20,
            n_stack: 4,
            size: 50000,
            seed: 42,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the number of parallel environments.
    pub fn n_envs(mut self, v: usize) -> Self {
        self.n_envs = v;
        self
    }

    /// Sets the number of steps per rollout.
    pub fn n_steps(mut self, v: usize) -> Self {
        self.n_steps = v;
        self
    }

    /// Sets the number of stacked frames.
    pub fn n_stack(mut self, v: usize) -> Self {
        self.n_stack = v;
        self
    }

    /// Sets the capacity in environment steps.
    pub fn size(mut self, v: usize) -> Self {
        self.size = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// The number of rollout slots.
    pub fn n_slots(&self) -> usize {
        if self.n_steps == 0 {
            0
        } else {
            self.size / self.n_steps
        }
    }

    /// Checks the consistency of the values.
    pub fn validate(&self) -> Result<(), AcerError> {
        if self.n_envs == 0 || self.n_steps == 0 || self.n_stack == 0 {
            return Err(AcerError::InvalidConfig(format!(
                "n_envs, n_steps and n_stack must be positive: {:?}",
                self
            )));
        }
        if self.n_slots() == 0 {
            return Err(AcerError::InvalidConfig(format!(
                "buffer size {} is smaller than n_steps {}",
                self.size, self.n_steps
            )));
        }
        Ok(())
    }

    /// Checks that the buffer can ever hold `replay_start` steps per environment.
    ///
    /// Replay starts once the buffer holds `replay_start / n_steps` rollouts, which must
    /// not exceed the number of slots.
    pub fn validate_replay_start(&self, replay_start: usize) -> Result<(), AcerError> {
        self.validate()?;
        if replay_start / self.n_steps > self.n_slots() {
            return Err(AcerError::InvalidConfig(format!(
                "replay_start {} exceeds the {} steps the buffer can hold",
                replay_start,
                self.n_slots() * self.n_steps
            )));
        }
        Ok(())
    }

    /// Constructs [`ReplayBufferConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ReplayBufferConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
