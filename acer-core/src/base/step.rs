//! Environment step.

/// Observation, reward and episode flags emitted by a single environment
/// after applying an action.
#[derive(Clone, Debug)]
pub struct Step {
    /// Observation, a flattened channel-first frame.
    pub obs: Vec<f32>,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if episode is terminated.
    pub is_terminated: i8,

    /// Flag denoting if episode is truncated.
    pub is_truncated: i8,

    /// Initial observation of the next episode, set by environments resetting
    /// themselves at the end of an episode.
    pub init_obs: Option<Vec<f32>>,
}

impl Step {
    /// Constructs a [`Step`] object.
    pub fn new(obs: Vec<f32>, reward: f32, is_terminated: i8, is_truncated: i8) -> Self {
        Step {
            obs,
            reward,
            is_terminated,
            is_truncated,
            init_obs: None,
        }
    }

    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated == 1 || self.is_truncated == 1
    }
}

/// Step of a vectorized environment.
///
/// Environments that finished an episode are reset, and `obs` holds the initial
/// observation of the next episode for them.
#[derive(Clone, Debug)]
pub struct VecStep {
    /// Observations of all environments, env-major.
    pub obs: Vec<f32>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Flags denoting if an episode ended on this step.
    pub is_done: Vec<i8>,
}
