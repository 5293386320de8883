//! ACER agent.
mod base;
mod config;
mod learn;
mod model;
pub use base::Acer;
pub use config::AcerConfig;
pub use learn::learn;
pub use model::AcerModel;
