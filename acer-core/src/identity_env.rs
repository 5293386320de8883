//! A synthetic environment rewarding the agent for repeating the observation.
use crate::{base::Step, error::AcerError, record::Record, Env};
use anyhow::Result;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration of [`IdentityEnv`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IdentityEnvConfig {
    /// The number of states and actions.
    pub dim: usize,

    /// Episode length in steps.
    pub ep_length: usize,
}

impl Default for IdentityEnvConfig {
    fn default() -> Self {
        Self {
            dim: 2,
            ep_length: 100,
        }
    }
}

impl IdentityEnvConfig {
    /// Sets the number of states and actions.
    pub fn dim(mut self, v: usize) -> Self {
        self.dim = v;
        self
    }

    /// Sets the episode length.
    pub fn ep_length(mut self, v: usize) -> Self {
        self.ep_length = v;
        self
    }
}

/// The state is drawn uniformly from `0..dim` and observed as a one-hot vector.
/// Taking the action equal to the state gives reward 1, otherwise 0. A new state is
/// drawn after every step and the episode ends after `ep_length` steps.
pub struct IdentityEnv {
    dim: usize,
    ep_length: usize,
    state: usize,
    t: usize,
    rng: SmallRng,
}

impl IdentityEnv {
    fn choose_next_state(&mut self) {
        self.state = self.rng.gen_range(0..self.dim);
    }

    fn obs(&self) -> Vec<f32> {
        let mut obs = vec![0f32; self.dim];
        obs[self.state] = 1.0;
        obs
    }

    /// Current state.
    pub fn state(&self) -> usize {
        self.state
    }
}

impl Env for IdentityEnv {
    type Config = IdentityEnvConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        if config.dim == 0 || config.ep_length == 0 {
            return Err(AcerError::InvalidConfig(format!("{:?}", config)).into());
        }
        let mut env = Self {
            dim: config.dim,
            ep_length: config.ep_length,
            state: 0,
            t: 0,
            rng: SmallRng::seed_from_u64(seed as u64),
        };
        env.choose_next_state();
        Ok(env)
    }

    fn frame_shape(&self) -> Vec<usize> {
        vec![self.dim]
    }

    fn n_actions(&self) -> usize {
        self.dim
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        self.t = 0;
        self.choose_next_state();
        Ok(self.obs())
    }

    fn step(&mut self, act: i64) -> Result<(Step, Record)> {
        let reward = if act as usize == self.state { 1.0 } else { 0.0 };
        self.t += 1;
        self.choose_next_state();
        let is_truncated = (self.t >= self.ep_length) as i8;
        Ok((Step::new(self.obs(), reward, 0, is_truncated), Record::empty()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_identity_reward() -> Result<()> {
        let mut env = IdentityEnv::build(&IdentityEnvConfig::default().dim(3).ep_length(2), 0)?;
        let obs = env.reset()?;
        assert_eq!(obs.iter().sum::<f32>(), 1.0);
        assert_eq!(obs[env.state()], 1.0);

        let (step, _) = env.step(env.state() as i64)?;
        assert_eq!(step.reward, 1.0);
        assert!(!step.is_done());

        let wrong = (env.state() + 1) % 3;
        let (step, _) = env.step(wrong as i64)?;
        assert_eq!(step.reward, 0.0);
        assert!(step.is_done());
        Ok(())
    }

    #[test]
    fn test_step_with_reset() -> Result<()> {
        let mut env = IdentityEnv::build(&IdentityEnvConfig::default().ep_length(1), 0)?;
        env.reset()?;
        let (step, _) = env.step_with_reset(0)?;
        assert!(step.is_done());
        assert!(step.init_obs.is_some());
        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        assert!(IdentityEnv::build(&IdentityEnvConfig::default().dim(0), 0).is_err());
    }
}
