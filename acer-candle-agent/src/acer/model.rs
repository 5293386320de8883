use super::AcerConfig;
use crate::ActorCriticNet;
use anyhow::{bail, Result};
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use std::path::Path;

/// Policy and Q networks with their own parameters.
pub struct AcerModel {
    varmap: VarMap,
    net: ActorCriticNet,
}

impl AcerModel {
    /// Constructs [`AcerModel`] with freshly initialized parameters.
    pub fn build(config: &AcerConfig, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let net = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            ActorCriticNet::build(vb, &config.net_config, &config.obs_shape, config.n_actions)?
        };

        Ok(Self { varmap, net })
    }

    /// Returns action probabilities and Q-values given stacked observations.
    ///
    /// `masks` holds one episode-end flag per row of `obs`. The networks are
    /// feed-forward, so they keep no recurrent state and reject a given `state`.
    pub fn forward(
        &self,
        obs: &Tensor,
        state: Option<&[f32]>,
        masks: &[i8],
    ) -> Result<(Tensor, Tensor)> {
        let n = obs.dim(0)?;
        if masks.len() != n {
            bail!("{} masks for {} observations", masks.len(), n);
        }
        if state.is_some() {
            bail!("feed-forward networks take no recurrent state");
        }
        self.net.forward_probs(obs)
    }

    /// Trainable variables.
    pub fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save ACER model to {:?}", path.as_ref());
        Ok(())
    }

    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load ACER model from {:?}", path.as_ref());
        Ok(())
    }
}
