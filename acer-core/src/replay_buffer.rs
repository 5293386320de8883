//! Replay buffer of whole rollouts with frame-stack reconstruction.
mod base;
mod config;
mod decode;
pub use base::ReplayBuffer;
pub use config::ReplayBufferConfig;
pub use decode::decode;
