//! ACER agent implemented with [candle](https://crates.io/crates/candle-core).
//!
//! The agent is an actor-critic with experience replay. Each optimization step builds
//! Retrace targets for a discrete-action Q-function, corrects the policy gradient with
//! truncated importance weights and, optionally, projects it into a trust region around
//! a polyak-averaged copy of the policy.
//!
//! ```no_run
//! # use anyhow::Result;
//! use acer_candle_agent::{learn, AcerConfig, ActorCriticNetConfig};
//! use acer_core::{record::NullRecorder, IdentityEnv, IdentityEnvConfig, SyncVecEnv, TrainerConfig};
//!
//! # fn main() -> Result<()> {
//! let env = SyncVecEnv::<IdentityEnv>::build(&IdentityEnvConfig::default(), 4, 0)?;
//! let config = AcerConfig::default().net_config(ActorCriticNetConfig::from_name("mlp")?);
//! let trainer_config = TrainerConfig::default().total_timesteps(10_000).n_stack(1);
//! let agent = learn(env, config, trainer_config, 50_000, &mut NullRecorder::new())?;
//! # Ok(())
//! # }
//! ```
pub mod acer;
pub mod actor_critic;
pub mod cnn;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod util;
pub use acer::{learn, Acer, AcerConfig};
pub use actor_critic::{ActorCriticNet, ActorCriticNetConfig};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl TryFrom<Device> for candle_core::Device {
    type Error = candle_core::Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => candle_core::Device::new_cuda(n),
        }
    }
}
