use anyhow::Result;
use candle_core::Tensor;
use serde::{Deserialize, Serialize};

/// Activation function of hidden layers.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Hyperbolic tangent.
    Tanh,

    /// Rectified linear unit.
    Relu,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Tanh
    }
}

impl Activation {
    /// Applies the activation function.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Tanh => Ok(xs.tanh()?),
            Self::Relu => Ok(xs.relu()?),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp).
pub struct MlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
    #[serde(default)]
    pub(super) activation: Activation,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    ///
    /// `activation` is applied after each hidden layer, not after the output layer.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize, activation: Activation) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation,
        }
    }

    /// Output dimension.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }
}
