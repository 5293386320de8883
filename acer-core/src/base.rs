//! Core traits and batch types.
mod agent;
mod batch;
mod env;
mod policy;
mod replay_buffer;
mod step;
pub use agent::Agent;
pub use batch::{stacked_shape, EncodedObs, ObsBatch, Rollout, RolloutBatch};
pub use env::{Env, VecEnv};
pub use policy::{Configurable, Policy, PolicyOutput};
pub use replay_buffer::ReplayBufferBase;
pub use step::{Step, VecStep};
