use super::MlpConfig;
use crate::model::SubModel1;
use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};

/// Returns vector of linear modules from [`MlpConfig`].
fn create_linear_layers(prefix: &str, vb: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut dims = vec![config.in_dim];
    dims.extend(config.units.iter().copied());
    dims.push(config.out_dim);
    let vb = vb.pp(prefix);

    let layers = dims
        .windows(2)
        .enumerate()
        .map(|(i, w)| linear(w[0], w[1], vb.pp(format!("ln{}", i))))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(layers)
}

/// Multilayer perceptron over flattened inputs.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        let mut xs = xs.to_device(&self.device)?.flatten_from(1)?;
        let n_layers = self.layers.len();

        for layer in self.layers[..n_layers - 1].iter() {
            xs = self.config.activation.forward(&layer.forward(&xs)?)?;
        }

        Ok(self.layers[n_layers - 1].forward(&xs)?)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vb.device().clone();
        let layers = create_linear_layers("mlp", vb, &config)?;

        Ok(Self {
            config,
            device,
            layers,
        })
    }
}
