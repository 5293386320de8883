//! Batches of rollout data.
//!
//! All arrays are flat and env-major: the value of environment `e` at step `t` is at
//! `e * n + t`, where `n` is the number of steps held per environment.

/// Returns the shape of a stacked observation.
///
/// Frames are channel-first and stacked along the first axis, oldest frame first.
pub fn stacked_shape(frame_shape: &[usize], n_stack: usize) -> Vec<usize> {
    let mut shape = frame_shape.to_vec();
    if let Some(c) = shape.first_mut() {
        *c *= n_stack;
    }
    shape
}

/// A batch of (stacked) observations.
#[derive(Clone, Debug, PartialEq)]
pub struct ObsBatch {
    /// Flattened observations.
    pub data: Vec<f32>,

    /// Shape of the batch, `[batch_size, ...]`.
    pub shape: Vec<usize>,
}

impl ObsBatch {
    /// Constructs a batch.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        Self { data, shape }
    }

    /// The number of observations.
    pub fn len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Returns `true` if the batch has no observation.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of values of a single observation.
    pub fn item_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }
}

/// Un-stacked frames of a rollout, `n_steps + n_stack` frames per environment.
///
/// The first `n_stack` frames of each environment are the frames in its frame stack
/// before the first step; the following `n_steps` frames are the observations after
/// each step. Replay buffers store these and rebuild stacked observations on demand.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedObs {
    /// Flattened frames, env-major.
    pub data: Vec<f32>,

    /// Shape of a single frame.
    pub frame_shape: Vec<usize>,

    /// The number of frames per environment.
    pub n_frames: usize,
}

impl EncodedObs {
    /// The number of values of a single frame.
    pub fn frame_len(&self) -> usize {
        self.frame_shape.iter().product()
    }
}

/// Data of one rollout of `n_steps` steps in `n_envs` environments.
#[derive(Clone, Debug, PartialEq)]
pub struct RolloutBatch {
    /// The number of environments.
    pub n_envs: usize,

    /// The number of steps per environment.
    pub n_steps: usize,

    /// The number of discrete actions.
    pub n_actions: usize,

    /// Stacked observations, `n_steps + 1` per environment including the bootstrap step.
    pub obs: ObsBatch,

    /// Actions taken, `n_steps` per environment.
    pub actions: Vec<i64>,

    /// Rewards, `n_steps` per environment.
    pub rewards: Vec<f32>,

    /// Behavior action probabilities, `n_steps * n_actions` per environment.
    pub mus: Vec<f32>,

    /// Episode-end flags aligned with rewards, `n_steps` per environment.
    pub dones: Vec<i8>,

    /// Episode-end flags before each observation, `n_steps + 1` per environment.
    pub masks: Vec<i8>,

    /// Recurrent state of the policy at the first step, `None` for feed-forward
    /// policies and for replayed batches.
    pub state: Option<Vec<f32>>,
}

impl RolloutBatch {
    /// The number of steps in the batch, `n_envs * n_steps`.
    pub fn n_batch(&self) -> usize {
        self.n_envs * self.n_steps
    }
}

/// Output of [`Runner::run`](crate::Runner::run).
#[derive(Clone, Debug)]
pub struct Rollout {
    /// Un-stacked frames for the replay buffer.
    pub enc_obs: EncodedObs,

    /// Batch for the optimization step.
    pub batch: RolloutBatch,
}
