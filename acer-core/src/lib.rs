#![warn(missing_docs)]
//! Core of ACER, actor-critic with experience replay.
//!
//! This crate is independent of the deep learning backend. It provides
//!
//! * the [`ReplayBuffer`] storing un-stacked frames of whole rollouts and rebuilding
//!   stacked observations on demand without leaking frames across episode ends,
//! * the Retrace recursion in [`retrace`],
//! * the trust-region projection of the policy gradient in [`trust_region`],
//! * the [`Runner`] collecting on-policy rollouts and the [`Trainer`] interleaving one
//!   on-policy update with a Poisson-distributed number of off-policy updates,
//! * the traits [`Env`], [`VecEnv`], [`Policy`] and [`Agent`] connecting these parts
//!   with environments and agents.
pub mod error;
pub mod record;
pub mod replay_buffer;
pub mod retrace;
pub mod trust_region;

mod base;
pub use base::{
    stacked_shape, Agent, Configurable, EncodedObs, Env, ObsBatch, Policy, PolicyOutput,
    ReplayBufferBase, Rollout, RolloutBatch, Step, VecEnv, VecStep,
};

mod episode_stats;
pub use episode_stats::{EpisodeStats, EPISODE_WINDOW};

mod identity_env;
pub use identity_env::{IdentityEnv, IdentityEnvConfig};

pub use replay_buffer::{ReplayBuffer, ReplayBufferConfig};

mod runner;
pub use runner::Runner;

mod schedule;
pub use schedule::LrSchedule;

mod trainer;
pub use trainer::{CycleInfo, ReplaySchedule, Trainer, TrainerConfig};

mod vec_env;
pub use vec_env::SyncVecEnv;
