//! Configuration of [`Trainer`](super::Trainer).
use crate::error::AcerError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// The number of environment steps to train for.
    pub total_timesteps: usize,

    /// The number of steps per environment in a rollout.
    pub n_steps: usize,

    /// The number of stacked frames.
    pub n_stack: usize,

    /// Expected number of off-policy updates per on-policy update.
    /// Replay is disabled if zero.
    pub replay_ratio: f32,

    /// Steps per environment the replay buffer must hold before off-policy updates start.
    pub replay_start: usize,

    /// Interval of writing records in cycles.
    pub log_interval: usize,

    /// Interval of saving model parameters in cycles.
    pub save_interval: usize,

    /// Where to save the trained model.
    pub model_dir: Option<String>,

    /// Random seed of the number of off-policy updates.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            total_timesteps: 80_000_000,
            n_steps: 20,
            n_stack: 4,
            replay_ratio: 4.0,
            replay_start: 10000,
            log_interval: 100,
            save_interval: usize::MAX,
            model_dir: None,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of environment steps to train for.
    pub fn total_timesteps(mut self, v: usize) -> Self {
        self.total_timesteps = v;
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

    /// Sets the replay ratio.
    pub fn replay_ratio(mut self, v: f32) -> Self {
        self.replay_ratio = v;
        self
    }

    /// Sets the number of steps stored before replay starts.
    pub fn replay_start(mut self, v: usize) -> Self {
        self.replay_start = v;
        self
    }

    /// Sets the interval of writing records in cycles.
    pub fn log_interval(mut self, v: usize) -> Self {
        self.log_interval = v;
        self
    }

    /// Sets the interval of saving in cycles.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets the directory where the trained model is saved.
    pub fn model_dir<T: Into<String>>(mut self, model_dir: T) -> Self {
        self.model_dir = Some(model_dir.into());
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Returns `true` if off-policy updates are enabled.
    pub fn replay_enabled(&self) -> bool {
        self.replay_ratio > 0.0
    }

    /// Checks the consistency of the values.
    pub fn validate(&self) -> Result<(), AcerError> {
        if self.n_steps == 0 || self.n_stack == 0 || self.log_interval == 0 {
            return Err(AcerError::InvalidConfig(
                "n_steps, n_stack and log_interval must be positive".to_string(),
            ));
        }
        if !(self.replay_ratio >= 0.0) || !self.replay_ratio.is_finite() {
            return Err(AcerError::InvalidConfig(format!(
                "replay_ratio must be a non-negative number, got {}",
                self.replay_ratio
            )));
        }
        Ok(())
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
