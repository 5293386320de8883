//! Types and traits for recording training metrics.
//!
//! [`Record`] is a key-value container filled by the agent and the trainer at every
//! update. Records are passed to a [`Recorder`], which writes them immediately, or to an
//! [`AggregateRecorder`], which stores them and writes values aggregated over the stored
//! records when flushed.
//!
//! ```rust
//! use acer_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("loss_q", RecordValue::Scalar(0.25));
//! record.insert("mus", RecordValue::Array1(vec![0.5, 0.5]));
//! assert_eq!(record.get_scalar("loss_q").unwrap(), 0.25);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;
mod tabular_recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
pub use storage::RecordStorage;
pub use tabular_recorder::TabularRecorder;
