//! Synchronous pool of environments.
use crate::{base::VecStep, record::Record, Env, VecEnv};
use anyhow::{bail, Result};
use log::trace;

/// Steps `n_envs` instances of an [`Env`] one after another.
///
/// Environment `i` is built with seed `seed + i`. An environment that ends an episode
/// is reset, and its initial observation is returned in place of the last one.
pub struct SyncVecEnv<E: Env> {
    envs: Vec<E>,
    frame_shape: Vec<usize>,
    n_actions: usize,
}

impl<E: Env> SyncVecEnv<E> {
    /// Builds the pool.
    pub fn build(config: &E::Config, n_envs: usize, seed: i64) -> Result<Self> {
        if n_envs == 0 {
            bail!("n_envs must be positive");
        }
        let envs = (0..n_envs)
            .map(|i| E::build(config, seed + i as i64))
            .collect::<Result<Vec<_>>>()?;
        let frame_shape = envs[0].frame_shape();
        let n_actions = envs[0].n_actions();
        Ok(Self {
            envs,
            frame_shape,
            n_actions,
        })
    }
}

impl<E: Env> VecEnv for SyncVecEnv<E> {
    fn n_envs(&self) -> usize {
        self.envs.len()
    }

    fn frame_shape(&self) -> Vec<usize> {
        self.frame_shape.clone()
    }

    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        let mut obs = vec![];
        for env in self.envs.iter_mut() {
            obs.extend(env.reset()?);
        }
        Ok(obs)
    }

    fn step(&mut self, acts: &[i64]) -> Result<(VecStep, Record)> {
        if acts.len() != self.envs.len() {
            bail!("{} actions for {} environments", acts.len(), self.envs.len());
        }
        let n = self.envs.len();
        let mut step = VecStep {
            obs: Vec::with_capacity(n * self.frame_shape.iter().product::<usize>()),
            reward: Vec::with_capacity(n),
            is_done: Vec::with_capacity(n),
        };
        let mut record = Record::empty();

        for (i, (env, &act)) in self.envs.iter_mut().zip(acts.iter()).enumerate() {
            let (s, r) = env.step_with_reset(act)?;
            let is_done = s.is_done();
            if is_done {
                trace!("Environment {} finished an episode", i);
            }
            step.reward.push(s.reward);
            step.is_done.push(is_done as i8);
            match s.init_obs {
                Some(init_obs) if is_done => step.obs.extend(init_obs),
                _ => step.obs.extend(s.obs),
            }
            record.merge_inplace(r);
        }

        Ok((step, record))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{IdentityEnv, IdentityEnvConfig};

    #[test]
    fn test_sync_vec_env() -> Result<()> {
        let config = IdentityEnvConfig::default().dim(2).ep_length(3);
        let mut env = SyncVecEnv::<IdentityEnv>::build(&config, 4, 0)?;
        assert_eq!(env.n_envs(), 4);
        assert_eq!(env.frame_shape(), vec![2]);
        assert_eq!(env.reset()?.len(), 8);

        for t in 1..=3 {
            let (step, _) = env.step(&[0, 1, 0, 1])?;
            assert_eq!(step.obs.len(), 8);
            let expected = if t == 3 { 1 } else { 0 };
            assert!(step.is_done.iter().all(|d| *d == expected));
        }
        assert!(env.step(&[0]).is_err());
        Ok(())
    }
}
