//! Policy.
use super::ObsBatch;
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Actions sampled by a [`Policy`].
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyOutput {
    /// One action per observation.
    pub actions: Vec<i64>,

    /// Action probabilities under which the actions were sampled, `n_actions` values
    /// per observation.
    pub mus: Vec<f32>,

    /// Recurrent state after the step, `None` for feed-forward policies.
    pub state: Option<Vec<f32>>,
}

/// A stochastic policy over discrete actions.
pub trait Policy {
    /// Recurrent state of the first step for `n_envs` environments.
    ///
    /// Feed-forward policies have none.
    fn initial_state(&self, _n_envs: usize) -> Option<Vec<f32>> {
        None
    }

    /// Samples actions for a batch of stacked observations.
    ///
    /// `state` is the recurrent state returned by the previous call, and `masks` flags
    /// the environments whose episode ended at the previous step, one value per
    /// observation. A recurrent policy resets the state of flagged environments.
    fn sample(
        &mut self,
        obs: &ObsBatch,
        state: Option<&[f32]>,
        masks: &[i8],
    ) -> Result<PolicyOutput>;
}

/// A configurable object.
pub trait Configurable {
    /// Configuration.
    type Config: Clone + DeserializeOwned;

    /// Builds the object.
    fn build(config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Build the object with the configuration in the yaml file of the given path.
    fn build_from_path(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Sized,
    {
        let file = std::fs::File::open(path)?;
        let rdr = std::io::BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        Self::build(config)
    }
}
