//! Circular buffer of rollouts.
use super::{decode, ReplayBufferConfig};
use crate::{
    base::{stacked_shape, ObsBatch, ReplayBufferBase, Rollout, RolloutBatch},
    error::AcerError,
};
use anyhow::{bail, Result};
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Backing arrays, allocated on the first [`ReplayBuffer::put`].
///
/// Slot `s` of each array is a contiguous block holding one rollout, env-major.
struct Storage {
    frame_shape: Vec<usize>,
    n_actions: usize,
    enc_obs: Vec<f32>,
    actions: Vec<i64>,
    rewards: Vec<f32>,
    mus: Vec<f32>,
    dones: Vec<i8>,
    masks: Vec<i8>,
}

/// A fixed-capacity circular buffer of rollouts.
///
/// Each slot holds the un-stacked frames of one rollout together with its actions,
/// rewards, behavior probabilities and episode flags. The oldest slot is overwritten
/// once the buffer is full. [`ReplayBuffer::get`] samples one slot per environment
/// and rebuilds stacked observations with [`decode`].
pub struct ReplayBuffer {
    n_envs: usize,
    n_steps: usize,
    n_stack: usize,

    /// Capacity in rollouts.
    size: usize,

    /// Slot overwritten by the next put.
    next_idx: usize,

    /// The number of filled slots.
    num_in_buffer: usize,

    storage: Option<Storage>,
    rng: StdRng,
}

impl ReplayBuffer {
    /// Capacity in rollouts.
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// The number of stored rollouts.
    pub fn num_in_buffer(&self) -> usize {
        self.num_in_buffer
    }

    /// Slot overwritten by the next put.
    pub fn next_idx(&self) -> usize {
        self.next_idx
    }

    fn n_frames(&self) -> usize {
        self.n_steps + self.n_stack
    }

    fn allocate(&self, rollout: &Rollout) -> Storage {
        let frame_shape = rollout.enc_obs.frame_shape.clone();
        let frame_len = rollout.enc_obs.frame_len();
        let n_actions = rollout.batch.n_actions;
        let n = self.size * self.n_envs;
        trace!(
            "Allocate replay buffer: {} slots, frame shape {:?}",
            self.size,
            frame_shape
        );

        Storage {
            frame_shape,
            n_actions,
            enc_obs: vec![0f32; n * self.n_frames() * frame_len],
            actions: vec![0; n * self.n_steps],
            rewards: vec![0f32; n * self.n_steps],
            mus: vec![0f32; n * self.n_steps * n_actions],
            dones: vec![0; n * self.n_steps],
            masks: vec![0; n * (self.n_steps + 1)],
        }
    }

    fn check_shapes(&self, rollout: &Rollout) -> Result<()> {
        let b = &rollout.batch;
        if b.n_envs != self.n_envs
            || b.n_steps != self.n_steps
            || rollout.enc_obs.n_frames != self.n_frames()
        {
            bail!(
                "rollout of {} envs, {} steps and {} frames does not fit the buffer of {} envs, {} steps and {} frames",
                b.n_envs,
                b.n_steps,
                rollout.enc_obs.n_frames,
                self.n_envs,
                self.n_steps,
                self.n_frames()
            );
        }
        if let Some(storage) = &self.storage {
            if storage.frame_shape != rollout.enc_obs.frame_shape
                || storage.n_actions != b.n_actions
            {
                bail!(
                    "frame shape {:?} or n_actions {} differs from the stored {:?}, {}",
                    rollout.enc_obs.frame_shape,
                    b.n_actions,
                    storage.frame_shape,
                    storage.n_actions
                );
            }
        }
        Ok(())
    }
}

/// Appends slot `slot` of environment `env` from `src` into `dst`.
///
/// `len` is the number of values per environment in a slot.
#[inline]
fn take<T: Copy>(dst: &mut Vec<T>, src: &[T], slot: usize, env: usize, n_envs: usize, len: usize) {
    let ix = (slot * n_envs + env) * len;
    dst.extend_from_slice(&src[ix..ix + len]);
}

#[inline]
fn write<T: Copy>(dst: &mut [T], src: &[T], slot: usize) {
    let len = src.len();
    dst[slot * len..(slot + 1) * len].copy_from_slice(src);
}

impl ReplayBufferBase for ReplayBuffer {
    type Config = ReplayBufferConfig;

    fn build(config: &Self::Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            n_envs: config.n_envs,
            n_steps: config.n_steps,
            n_stack: config.n_stack,
            size: config.n_slots(),
            next_idx: 0,
            num_in_buffer: 0,
            storage: None,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    fn put(&mut self, rollout: &Rollout) -> Result<()> {
        self.check_shapes(rollout)?;
        if self.storage.is_none() {
            self.storage = Some(self.allocate(rollout));
        }
        let slot = self.next_idx;
        let b = &rollout.batch;

        if let Some(s) = self.storage.as_mut() {
            write(&mut s.enc_obs, &rollout.enc_obs.data, slot);
            write(&mut s.actions, &b.actions, slot);
            write(&mut s.rewards, &b.rewards, slot);
            write(&mut s.mus, &b.mus, slot);
            write(&mut s.dones, &b.dones, slot);
            write(&mut s.masks, &b.masks, slot);
        }

        self.next_idx = (self.next_idx + 1) % self.size;
        self.num_in_buffer = self.size.min(self.num_in_buffer + 1);
        Ok(())
    }

    fn has_at_least(&self, frames: usize) -> bool {
        self.num_in_buffer >= frames / self.n_steps
    }

    fn can_sample(&self) -> bool {
        self.num_in_buffer > 0
    }

    fn get(&mut self) -> Result<RolloutBatch> {
        let s = match (&self.storage, self.can_sample()) {
            (Some(s), true) => s,
            _ => return Err(AcerError::EmptyBuffer.into()),
        };
        let (n_envs, n_steps, n_stack) = (self.n_envs, self.n_steps, self.n_stack);
        let frame_len: usize = s.frame_shape.iter().product();
        let n_frames = n_steps + n_stack;

        // One slot per environment
        let num_in_buffer = self.num_in_buffer;
        let rng = &mut self.rng;
        let idx: Vec<usize> = (0..n_envs)
            .map(|_| rng.gen_range(0..num_in_buffer))
            .collect();

        let mut obs = Vec::with_capacity(n_envs * (n_steps + 1) * n_stack * frame_len);
        let mut actions = Vec::with_capacity(n_envs * n_steps);
        let mut rewards = Vec::with_capacity(n_envs * n_steps);
        let mut mus = Vec::with_capacity(n_envs * n_steps * s.n_actions);
        let mut dones = Vec::with_capacity(n_envs * n_steps);
        let mut masks = Vec::with_capacity(n_envs * (n_steps + 1));

        for (env, &slot) in idx.iter().enumerate() {
            let ix = (slot * n_envs + env) * n_frames * frame_len;
            let frames = &s.enc_obs[ix..ix + n_frames * frame_len];
            let ix = (slot * n_envs + env) * n_steps;
            let env_dones = &s.dones[ix..ix + n_steps];
            obs.extend(decode(frames, env_dones, frame_len, n_steps, n_stack));

            take(&mut actions, &s.actions, slot, env, n_envs, n_steps);
            take(&mut rewards, &s.rewards, slot, env, n_envs, n_steps);
            take(&mut mus, &s.mus, slot, env, n_envs, n_steps * s.n_actions);
            take(&mut dones, &s.dones, slot, env, n_envs, n_steps);
            take(&mut masks, &s.masks, slot, env, n_envs, n_steps + 1);
        }

        let mut shape = vec![n_envs * (n_steps + 1)];
        shape.extend(stacked_shape(&s.frame_shape, n_stack));

        Ok(RolloutBatch {
            n_envs,
            n_steps,
            n_actions: s.n_actions,
            obs: ObsBatch::new(obs, shape),
            actions,
            rewards,
            mus,
            dones,
            masks,
            state: None,
        })
    }
}
