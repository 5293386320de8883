//! Collects on-policy rollouts from a pool of environments.
use crate::{
    base::{stacked_shape, EncodedObs, ObsBatch, PolicyOutput, Rollout, RolloutBatch},
    Policy, VecEnv,
};
use anyhow::{bail, Result};

/// Steps a [`VecEnv`] with a [`Policy`] and keeps a rolling frame stack per environment.
///
/// The frame stack of an environment is zeroed when its episode ends, before the
/// initial frame of the next episode is written in. The recurrent state of the policy,
/// if any, is carried from one step and one rollout to the next.
pub struct Runner<V: VecEnv> {
    env: V,
    n_envs: usize,
    n_steps: usize,
    n_stack: usize,
    n_actions: usize,
    frame_shape: Vec<usize>,
    frame_len: usize,

    /// Stacked observations, `n_stack * frame_len` values per environment.
    obs: Vec<f32>,

    /// Episode-end flags of the last step.
    dones: Vec<i8>,

    /// Recurrent state of the policy, taken from [`Policy::initial_state`] on the first run.
    state: Option<Vec<f32>>,
    started: bool,
}

impl<V: VecEnv> Runner<V> {
    /// Resets the environments and creates a runner.
    pub fn new(mut env: V, n_steps: usize, n_stack: usize) -> Result<Self> {
        if n_steps == 0 || n_stack == 0 {
            bail!("n_steps and n_stack must be positive");
        }
        let n_envs = env.n_envs();
        let frame_shape = env.frame_shape();
        let frame_len = frame_shape.iter().product();
        let n_actions = env.n_actions();
        let frames = env.reset()?;

        let mut runner = Self {
            env,
            n_envs,
            n_steps,
            n_stack,
            n_actions,
            frame_shape,
            frame_len,
            obs: vec![0f32; n_envs * n_stack * frame_len],
            dones: vec![0; n_envs],
            state: None,
            started: false,
        };
        runner.update_obs(&frames, None);
        Ok(runner)
    }

    /// The number of environments.
    pub fn n_envs(&self) -> usize {
        self.n_envs
    }

    /// The number of discrete actions.
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Shape of a single frame.
    pub fn frame_shape(&self) -> &[usize] {
        &self.frame_shape
    }

    /// Rolls new frames into the stacks, zeroing the stacks of finished episodes first.
    fn update_obs(&mut self, frames: &[f32], dones: Option<&[i8]>) {
        let stack_len = self.n_stack * self.frame_len;
        for e in 0..self.n_envs {
            let stack = &mut self.obs[e * stack_len..(e + 1) * stack_len];
            if let Some(dones) = dones {
                if dones[e] == 1 {
                    stack.iter_mut().for_each(|v| *v = 0.0);
                }
            }
            stack.rotate_left(self.frame_len);
            stack[stack_len - self.frame_len..]
                .copy_from_slice(&frames[e * self.frame_len..(e + 1) * self.frame_len]);
        }
    }

    fn stacked_batch(&self) -> ObsBatch {
        let mut shape = vec![self.n_envs];
        shape.extend(stacked_shape(&self.frame_shape, self.n_stack));
        ObsBatch::new(self.obs.clone(), shape)
    }

    /// Steps every environment `n_steps` times.
    pub fn run<P: Policy + ?Sized>(&mut self, policy: &mut P) -> Result<Rollout> {
        let (n_envs, n_steps, n_actions) = (self.n_envs, self.n_steps, self.n_actions);
        let stack_len = self.n_stack * self.frame_len;
        if !self.started {
            self.state = policy.initial_state(n_envs);
            self.started = true;
        }
        let initial_state = self.state.clone();

        // Per-environment sequences, flattened env-major at the end
        let mut enc_obs: Vec<Vec<f32>> = self.obs.chunks(stack_len).map(|s| s.to_vec()).collect();
        let mut mb_obs = vec![Vec::with_capacity((n_steps + 1) * stack_len); n_envs];
        let mut mb_actions = vec![Vec::with_capacity(n_steps); n_envs];
        let mut mb_mus = vec![Vec::with_capacity(n_steps * n_actions); n_envs];
        let mut mb_rewards = vec![Vec::with_capacity(n_steps); n_envs];
        let mut mb_dones = vec![Vec::with_capacity(n_steps + 1); n_envs];

        for _ in 0..n_steps {
            let obs = self.stacked_batch();
            let PolicyOutput { actions, mus, state } =
                policy.sample(&obs, self.state.as_deref(), &self.dones)?;
            if actions.len() != n_envs || mus.len() != n_envs * n_actions {
                bail!(
                    "policy returned {} actions and {} probabilities for {} environments",
                    actions.len(),
                    mus.len(),
                    n_envs
                );
            }
            self.state = state;
            for e in 0..n_envs {
                mb_obs[e].extend_from_slice(&self.obs[e * stack_len..(e + 1) * stack_len]);
                mb_actions[e].push(actions[e]);
                mb_mus[e].extend_from_slice(&mus[e * n_actions..(e + 1) * n_actions]);
                mb_dones[e].push(self.dones[e]);
            }

            let (step, _) = self.env.step(&actions)?;
            self.update_obs(&step.obs, Some(step.is_done.as_slice()));
            self.dones = step.is_done;

            for e in 0..n_envs {
                mb_rewards[e].push(step.reward[e]);
                enc_obs[e].extend_from_slice(&step.obs[e * self.frame_len..(e + 1) * self.frame_len]);
            }
        }
        for e in 0..n_envs {
            mb_obs[e].extend_from_slice(&self.obs[e * stack_len..(e + 1) * stack_len]);
            mb_dones[e].push(self.dones[e]);
        }

        let masks: Vec<i8> = mb_dones.concat();
        let dones: Vec<i8> = mb_dones.iter().flat_map(|d| d[1..].iter().copied()).collect();

        let mut obs_shape = vec![n_envs * (n_steps + 1)];
        obs_shape.extend(stacked_shape(&self.frame_shape, self.n_stack));

        Ok(Rollout {
            enc_obs: EncodedObs {
                data: enc_obs.concat(),
                frame_shape: self.frame_shape.clone(),
                n_frames: n_steps + self.n_stack,
            },
            batch: RolloutBatch {
                n_envs,
                n_steps,
                n_actions,
                obs: ObsBatch::new(mb_obs.concat(), obs_shape),
                actions: mb_actions.concat(),
                rewards: mb_rewards.concat(),
                mus: mb_mus.concat(),
                dones,
                masks,
                state: initial_state,
            },
        })
    }
}
