use super::CnnConfig;
use crate::model::SubModel1;
use acer_core::error::AcerError;
use anyhow::Result;
use candle_core::{DType::F32, Device, Tensor};
use candle_nn::{
    conv::Conv2dConfig,
    conv2d, linear,
    sequential::{seq, Sequential},
    Module, VarBuilder,
};

/// Kernel sizes and strides of the convolution layers.
const CONVS: [(usize, usize); 3] = [(8, 4), (4, 2), (3, 1)];

#[allow(clippy::upper_case_acronyms)]
/// Convolutional neural network, which has the same architecture of the DQN paper.
///
/// Pixel values are scaled by `1/255`. The output is the ReLU of the fully connected
/// layer after the convolutions.
pub struct Cnn {
    device: Device,
    seq: Sequential,
}

impl Cnn {
    fn stride(s: usize) -> Conv2dConfig {
        Conv2dConfig {
            stride: s,
            ..Default::default()
        }
    }

    /// The number of values output by the last convolution layer.
    fn conv_out_dim(in_shape: &[usize]) -> Result<usize> {
        if in_shape.len() != 3 {
            return Err(AcerError::InvalidConfig(format!(
                "CNN input must be [channels, height, width], got {:?}",
                in_shape
            ))
            .into());
        }
        let (mut h, mut w) = (in_shape[1], in_shape[2]);
        for (kernel, stride) in CONVS.iter() {
            if h < *kernel || w < *kernel {
                return Err(AcerError::InvalidConfig(format!(
                    "CNN input {:?} is too small",
                    in_shape
                ))
                .into());
            }
            h = (h - kernel) / stride + 1;
            w = (w - kernel) / stride + 1;
        }
        Ok(64 * h * w)
    }

    fn create_net(vb: &VarBuilder, config: &CnnConfig) -> Result<Sequential> {
        let n_channels = config.in_shape[0];
        let flat_dim = Self::conv_out_dim(&config.in_shape)?;
        let [(k1, s1), (k2, s2), (k3, s3)] = CONVS;
        let seq = seq()
            .add_fn(|xs| xs.to_dtype(F32)? / 255.0)
            .add(conv2d(n_channels, 32, k1, Self::stride(s1), vb.pp("c1"))?)
            .add_fn(|xs| xs.relu())
            .add(conv2d(32, 64, k2, Self::stride(s2), vb.pp("c2"))?)
            .add_fn(|xs| xs.relu())
            .add(conv2d(64, 64, k3, Self::stride(s3), vb.pp("c3"))?)
            .add_fn(|xs| xs.relu()?.flatten_from(1))
            .add(linear(flat_dim, config.out_dim, vb.pp("l1"))?)
            .add_fn(|xs| xs.relu());

        Ok(seq)
    }
}

impl SubModel1 for Cnn {
    type Config = CnnConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, x: &Self::Input) -> Result<Tensor> {
        Ok(self.seq.forward(&x.to_device(&self.device)?)?)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vb.device().clone();
        let seq = Self::create_net(&vb, &config)?;

        Ok(Self { device, seq })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_conv_out_dim() {
        assert_eq!(Cnn::conv_out_dim(&[4, 84, 84]).unwrap(), 3136);
        assert_eq!(Cnn::conv_out_dim(&[4, 36, 36]).unwrap(), 64);
        assert!(Cnn::conv_out_dim(&[4, 16, 16]).is_err());
        assert!(Cnn::conv_out_dim(&[84, 84]).is_err());
    }

    #[test]
    fn test_cnn_forward() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let cnn = Cnn::build(vb, CnnConfig::new(vec![2, 40, 40], 16))?;
        let xs = Tensor::ones((3, 2, 40, 40), DType::F32, &Device::Cpu)?;
        assert_eq!(cnn.forward(&xs)?.dims(), &[3, 16]);
        Ok(())
    }
}
