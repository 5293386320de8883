//! Configuration of ACER agent.
use crate::{opt::OptimizerConfig, ActorCriticNetConfig, Device};
use acer_core::{error::AcerError, LrSchedule};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Acer`](super::Acer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct AcerConfig {
    /// Architecture of the policy and Q networks.
    pub net_config: ActorCriticNetConfig,

    /// Optimizer. Its learning rate is the initial value of the schedule.
    pub opt_config: OptimizerConfig,

    /// Shape of a stacked observation, `[n_stack * channels, ...]`.
    pub obs_shape: Vec<usize>,

    /// The number of discrete actions.
    pub n_actions: usize,

    /// Discount factor.
    pub gamma: f32,

    /// Weight of the Q-function loss.
    pub q_coef: f32,

    /// Weight of the entropy bonus.
    pub ent_coef: f32,

    /// Gradients are clipped to this global norm.
    pub max_grad_norm: f32,

    /// Decay of the learning rate over training.
    pub lr_schedule: LrSchedule,

    /// Truncation of the importance weights in the policy gradient.
    pub correction_term: f32,

    /// If `true`, the policy gradient is projected into the trust region around the
    /// averaged policy.
    pub trust_region: bool,

    /// Decay of the averaged policy, `polyak = alpha * polyak + (1 - alpha) * live`.
    pub alpha: f32,

    /// Bound of the KL-gradient inner product in the trust region.
    pub delta: f32,

    /// Random seed of action sampling.
    pub seed: u64,

    /// Device of the networks. `None` means CPU.
    pub device: Option<Device>,
}

impl Default for AcerConfig {
    fn default() -> Self {
        Self {
            net_config: ActorCriticNetConfig::default(),
            opt_config: OptimizerConfig::default(),
            obs_shape: vec![],
            n_actions: 0,
            gamma: 0.99,
            q_coef: 0.5,
            ent_coef: 0.01,
            max_grad_norm: 10.0,
            lr_schedule: LrSchedule::Linear,
            correction_term: 10.0,
            trust_region: true,
            alpha: 0.99,
            delta: 1.0,
            seed: 42,
            device: None,
        }
    }
}

impl AcerConfig {
    /// Sets the network architecture.
    pub fn net_config(mut self, v: ActorCriticNetConfig) -> Self {
        self.net_config = v;
        self
    }

    /// Sets the optimizer.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the initial learning rate.
    pub fn learning_rate(mut self, v: f64) -> Self {
        self.opt_config = self.opt_config.learning_rate(v);
        self
    }

    /// Sets the shape of a stacked observation.
    pub fn obs_shape(mut self, v: Vec<usize>) -> Self {
        self.obs_shape = v;
        self
    }

    /// Sets the number of actions.
    pub fn n_actions(mut self, v: usize) -> Self {
        self.n_actions = v;
        self
    }

    /// Discount factor.
    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    /// Weight of the Q-function loss.
    pub fn q_coef(mut self, v: f32) -> Self {
        self.q_coef = v;
        self
    }

    /// Weight of the entropy bonus.
    pub fn ent_coef(mut self, v: f32) -> Self {
        self.ent_coef = v;
        self
    }

    /// Global norm of clipped gradients.
    pub fn max_grad_norm(mut self, v: f32) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Learning rate schedule.
    pub fn lr_schedule(mut self, v: LrSchedule) -> Self {
        self.lr_schedule = v;
        self
    }

    /// Truncation of the importance weights.
    pub fn correction_term(mut self, v: f32) -> Self {
        self.correction_term = v;
        self
    }

    /// Enables or disables the trust region.
    pub fn trust_region(mut self, v: bool) -> Self {
        self.trust_region = v;
        self
    }

    /// Decay of the averaged policy.
    pub fn alpha(mut self, v: f32) -> Self {
        self.alpha = v;
        self
    }

    /// Bound of the trust region.
    pub fn delta(mut self, v: f32) -> Self {
        self.delta = v;
        self
    }

    /// Random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = Some(v);
        self
    }

    /// Checks the values.
    pub fn validate(&self) -> Result<(), AcerError> {
        let err = |msg: &str| Err(AcerError::InvalidConfig(msg.to_string()));

        if self.obs_shape.is_empty() || self.obs_shape.contains(&0) {
            return err("obs_shape must be set and non-degenerate");
        }
        if self.n_actions == 0 {
            return err("n_actions must be positive");
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return err("gamma must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return err("alpha must be in [0, 1]");
        }
        if self.max_grad_norm <= 0.0 {
            return err("max_grad_norm must be positive");
        }
        Ok(())
    }

    /// Constructs [`AcerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of ACER agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`AcerConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of ACER agent into {:?}", path_);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_acer_config() -> Result<()> {
        let config = AcerConfig::default()
            .net_config(ActorCriticNetConfig::from_name("cnn")?)
            .obs_shape(vec![4, 84, 84])
            .n_actions(6)
            .lr_schedule(LrSchedule::DoubleMiddleDrop)
            .learning_rate(1e-3)
            .trust_region(false)
            .device(Device::Cpu);

        let dir = TempDir::new("acer_config")?;
        let path = dir.path().join("acer_config.yaml");
        config.save(&path)?;
        let config_ = AcerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(AcerConfig::default().validate().is_err());
        let config = AcerConfig::default().obs_shape(vec![2]).n_actions(2);
        assert!(config.validate().is_ok());
        assert!(config.clone().alpha(1.5).validate().is_err());
        assert!(config.max_grad_norm(0.0).validate().is_err());
    }
}
