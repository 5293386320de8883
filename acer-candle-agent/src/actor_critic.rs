//! Policy and Q-value networks.
use crate::{
    cnn::{Cnn, CnnConfig},
    mlp::{Activation, Mlp, MlpConfig},
    model::SubModel1,
};
use acer_core::error::AcerError;
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::{linear, ops::softmax, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};

/// Architecture of [`ActorCriticNet`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum ActorCriticNetConfig {
    /// Separate multilayer perceptrons for the policy and the Q-function over the
    /// flattened stacked observation.
    Mlp {
        /// Hidden units of each tower.
        units: Vec<usize>,

        /// Activation of hidden layers.
        #[serde(default)]
        activation: Activation,
    },

    /// Shared convolutional trunk with a linear policy head and a linear Q head.
    Cnn {
        /// Dimension of the features output by the trunk.
        n_features: usize,
    },
}

impl Default for ActorCriticNetConfig {
    fn default() -> Self {
        Self::Mlp {
            units: vec![64, 64],
            activation: Activation::Tanh,
        }
    }
}

impl ActorCriticNetConfig {
    /// Default configuration of the named architecture, `"mlp"` or `"cnn"`.
    pub fn from_name(name: &str) -> Result<Self, AcerError> {
        match name {
            "mlp" => Ok(Self::default()),
            "cnn" => Ok(Self::Cnn { n_features: 512 }),
            _ => Err(AcerError::UnknownPolicy(name.to_string())),
        }
    }
}

/// Network outputting action logits and per-action Q-values.
pub enum ActorCriticNet {
    /// Separate policy and Q towers.
    Mlp { pi: Mlp, q: Mlp },

    /// Policy and Q heads on a shared trunk.
    Cnn { trunk: Cnn, pi: Linear, q: Linear },
}

impl ActorCriticNet {
    /// Builds the network for stacked observations of shape `obs_shape`.
    pub fn build(
        vb: VarBuilder,
        config: &ActorCriticNetConfig,
        obs_shape: &[usize],
        n_actions: usize,
    ) -> Result<Self> {
        match config {
            ActorCriticNetConfig::Mlp { units, activation } => {
                let in_dim = obs_shape.iter().product();
                let config = MlpConfig::new(in_dim, units.clone(), n_actions, *activation);
                Ok(Self::Mlp {
                    pi: Mlp::build(vb.pp("pi"), config.clone())?,
                    q: Mlp::build(vb.pp("q"), config)?,
                })
            }
            ActorCriticNetConfig::Cnn { n_features } => {
                let config = CnnConfig::new(obs_shape.to_vec(), *n_features);
                Ok(Self::Cnn {
                    trunk: Cnn::build(vb.pp("cnn"), config)?,
                    pi: linear(*n_features, n_actions, vb.pp("pi"))?,
                    q: linear(*n_features, n_actions, vb.pp("q"))?,
                })
            }
        }
    }

    /// Returns action logits and Q-values, both of shape `[batch_size, n_actions]`.
    pub fn forward(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        match self {
            Self::Mlp { pi, q } => Ok((pi.forward(obs)?, q.forward(obs)?)),
            Self::Cnn { trunk, pi, q } => {
                let xs = trunk.forward(obs)?;
                Ok((pi.forward(&xs)?, q.forward(&xs)?))
            }
        }
    }

    /// Returns action probabilities and Q-values.
    pub fn forward_probs(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let (logits, q) = self.forward(obs)?;
        Ok((softmax(&logits, D::Minus1)?, q))
    }
}
