//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum AcerError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// Sampling from a replay buffer that has never been written.
    #[error("Replay buffer is empty")]
    EmptyBuffer,

    /// Unknown learning rate schedule.
    #[error("Unknown learning rate schedule: {0}")]
    UnknownSchedule(String),

    /// Unknown policy network.
    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    /// Inconsistent configuration values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
