//! Optimizers.
use anyhow::Result;
use candle_core::{backprop::GradStore, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::rmsprop::{ParamsRMSprop, RMSprop};
use serde::{Deserialize, Serialize};

/// Configuration of optimizer for training neural networks in the agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// RMSprop optimizer.
    RmsProp {
        /// Learning rate before scheduling.
        lr: f64,

        /// Decay of the moving average of squared gradients.
        #[serde(default = "default_alpha")]
        alpha: f64,

        #[serde(default = "default_rms_eps")]
        eps: f64,
    },

    /// AdamW optimizer.
    AdamW {
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
        #[serde(default = "default_weight_decay")]
        weight_decay: f64,
    },
}

fn default_alpha() -> f64 {
    0.99
}

fn default_rms_eps() -> f64 {
    1e-5
}

fn default_beta1() -> f64 {
    ParamsAdamW::default().beta1
}

fn default_beta2() -> f64 {
    ParamsAdamW::default().beta2
}

fn default_eps() -> f64 {
    ParamsAdamW::default().eps
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

impl OptimizerConfig {
    /// Constructs an optimizer of the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match &self {
            OptimizerConfig::RmsProp { lr, alpha, eps } => {
                let params = ParamsRMSprop {
                    lr: *lr,
                    alpha: *alpha,
                    eps: *eps,
                    ..ParamsRMSprop::default()
                };
                let opt = RMSprop::new(vars, params)?;
                Ok(Optimizer::RmsProp(opt))
            }
            OptimizerConfig::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => {
                let params = ParamsAdamW {
                    lr: *lr,
                    beta1: *beta1,
                    beta2: *beta2,
                    eps: *eps,
                    weight_decay: *weight_decay,
                };
                let opt = AdamW::new(vars, params)?;
                Ok(Optimizer::AdamW(opt))
            }
        }
    }

    /// Override learning rate.
    pub fn learning_rate(self, lr: f64) -> Self {
        match self {
            Self::RmsProp { lr: _, alpha, eps } => Self::RmsProp { lr, alpha, eps },
            Self::AdamW {
                lr: _,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => Self::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            },
        }
    }

    /// Learning rate before scheduling.
    pub fn lr(&self) -> f64 {
        match self {
            Self::RmsProp { lr, .. } => *lr,
            Self::AdamW { lr, .. } => *lr,
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::RmsProp {
            lr: 7e-4,
            alpha: default_alpha(),
            eps: default_rms_eps(),
        }
    }
}

/// Optimizers.
pub enum Optimizer {
    /// RMSprop optimizer.
    RmsProp(RMSprop),

    /// AdamW optimizer.
    AdamW(AdamW),
}

impl Optimizer {
    /// Updates the variables with the given gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Self::RmsProp(opt) => Ok(opt.step(grads)?),
            Self::AdamW(opt) => Ok(opt.step(grads)?),
        }
    }

    /// Sets the learning rate used by the next [`step`](Self::step).
    pub fn set_learning_rate(&mut self, lr: f64) {
        match self {
            Self::RmsProp(opt) => opt.set_learning_rate(lr),
            Self::AdamW(opt) => opt.set_learning_rate(lr),
        }
    }

    /// The current learning rate.
    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::RmsProp(opt) => opt.learning_rate(),
            Self::AdamW(opt) => opt.learning_rate(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{Device, Tensor};

    #[test]
    fn test_default_is_rmsprop() {
        let config = OptimizerConfig::default();
        assert_eq!(config.lr(), 7e-4);
        assert_eq!(config.clone().learning_rate(1e-3).lr(), 1e-3);
        let yaml = serde_yaml::to_string(&config).unwrap();
        let config_: OptimizerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, config_);
    }

    #[test]
    fn test_rmsprop_step_descends() -> Result<()> {
        let x = Var::from_tensor(&Tensor::new(&[2f32, -3.0], &Device::Cpu)?)?;
        let mut opt = OptimizerConfig::default().learning_rate(0.1).build(vec![x.clone()])?;
        opt.set_learning_rate(0.05);
        assert_eq!(opt.learning_rate(), 0.05);

        let loss_before = x.as_tensor().sqr()?.sum_all()?.to_scalar::<f32>()?;
        for _ in 0..10 {
            let grads = x.as_tensor().sqr()?.sum_all()?.backward()?;
            opt.step(&grads)?;
        }
        let loss_after = x.as_tensor().sqr()?.sum_all()?.to_scalar::<f32>()?;
        assert!(loss_after < loss_before);
        Ok(())
    }
}
