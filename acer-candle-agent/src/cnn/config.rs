use serde::{Deserialize, Serialize};

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Cnn`](super::Cnn).
pub struct CnnConfig {
    /// Shape of the input, `[channels, height, width]`.
    pub in_shape: Vec<usize>,

    /// Dimension of the output features.
    pub out_dim: usize,
}

impl CnnConfig {
    /// Constructs [`CnnConfig`].
    pub fn new(in_shape: Vec<usize>, out_dim: usize) -> Self {
        Self { in_shape, out_dim }
    }
}
