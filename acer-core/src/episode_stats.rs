//! Statistics of completed episodes for reporting.
use std::collections::VecDeque;

/// The number of recent episodes averaged in [`EpisodeStats`].
pub const EPISODE_WINDOW: usize = 40;

/// Running rewards of the episodes in progress and a window of completed episodes.
#[derive(Debug, Clone)]
pub struct EpisodeStats {
    n_envs: usize,
    n_steps: usize,
    episode_rewards: Vec<Vec<f32>>,
    len_buffer: VecDeque<usize>,
    reward_buffer: VecDeque<f32>,
}

impl EpisodeStats {
    /// Creates an accumulator for rollouts of `n_steps` steps in `n_envs` environments.
    pub fn new(n_steps: usize, n_envs: usize) -> Self {
        Self {
            n_envs,
            n_steps,
            episode_rewards: vec![vec![]; n_envs],
            len_buffer: VecDeque::with_capacity(EPISODE_WINDOW),
            reward_buffer: VecDeque::with_capacity(EPISODE_WINDOW),
        }
    }

    fn push(&mut self, len: usize, reward: f32) {
        if self.len_buffer.len() == EPISODE_WINDOW {
            self.len_buffer.pop_front();
            self.reward_buffer.pop_front();
        }
        self.len_buffer.push_back(len);
        self.reward_buffer.push_back(reward);
    }

    /// Accumulates rewards and episode ends of a rollout, env-major.
    pub fn feed(&mut self, rewards: &[f32], dones: &[i8]) {
        debug_assert_eq!(rewards.len(), self.n_envs * self.n_steps);
        debug_assert_eq!(dones.len(), self.n_envs * self.n_steps);

        for e in 0..self.n_envs {
            for t in 0..self.n_steps {
                let i = e * self.n_steps + t;
                self.episode_rewards[e].push(rewards[i]);
                if dones[i] == 1 {
                    let rs = std::mem::take(&mut self.episode_rewards[e]);
                    self.push(rs.len(), rs.iter().sum());
                }
            }
        }
    }

    /// The number of completed episodes in the window.
    pub fn n_episodes(&self) -> usize {
        self.len_buffer.len()
    }

    /// Mean length of the recent episodes, `0` if none completed yet.
    pub fn mean_length(&self) -> f32 {
        if self.len_buffer.is_empty() {
            0.0
        } else {
            self.len_buffer.iter().sum::<usize>() as f32 / self.len_buffer.len() as f32
        }
    }

    /// Mean reward of the recent episodes, `0` if none completed yet.
    pub fn mean_reward(&self) -> f32 {
        if self.reward_buffer.is_empty() {
            0.0
        } else {
            self.reward_buffer.iter().sum::<f32>() / self.reward_buffer.len() as f32
        }
    }
}
