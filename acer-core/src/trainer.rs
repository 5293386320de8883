//! Train [`Agent`] with interleaved on-policy and off-policy updates.
mod config;
mod replay_schedule;
use crate::{
    record::{AggregateRecorder, Record, RecordValue::Scalar},
    Agent, EpisodeStats, ReplayBufferBase, Runner, VecEnv,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::info;
pub use replay_schedule::ReplaySchedule;
use std::{path::Path, time::SystemTime};

/// Progress of the training loop passed to the per-cycle callback.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleInfo {
    /// Index of the cycle, starting from zero.
    pub cycle: usize,

    /// Environment steps consumed so far.
    pub env_steps: usize,

    /// Optimization steps done so far.
    pub n_updates: usize,

    /// Off-policy updates done in this cycle.
    pub n_replay: usize,

    /// Mean length of recent episodes.
    pub mean_episode_length: f32,

    /// Mean reward of recent episodes.
    pub mean_episode_reward: f32,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop.
///
/// # Training loop
///
/// Each cycle consumes `n_envs * n_steps` environment steps:
///
/// 1. **On-policy phase**: the [`Runner`] collects a rollout with the agent, episode
///    statistics are updated, the rollout is stored in the replay buffer (if replay is
///    enabled) and the agent performs an optimization step on it.
/// 2. **Off-policy phase**: if replay is enabled and the buffer holds at least
///    `replay_start` steps per environment, `k ~ Poisson(replay_ratio)` optimization
///    steps are performed, each on an independent sample of the buffer.
/// 3. Every `log_interval` cycles, starting from the first one, diagnostics are written
///    to the recorder. Every `save_interval` cycles, the agent is saved in
///    `(model_dir)/(cycle)`.
/// 4. The callback is given a [`CycleInfo`]; returning `false` ends the loop.
///
/// The loop ends when `total_timesteps` environment steps have been consumed.
///
/// ```mermaid
/// graph LR
///     A[Runner]-->|Rollout|B[Agent]
///     A -->|Rollout|C[ReplayBuffer]
///     C -->|RolloutBatch|B
///     B -->|Policy|A
/// ```
pub struct Trainer<R: ReplayBufferBase> {
    config: TrainerConfig,
    replay_buffer_config: R::Config,
}

impl<R: ReplayBufferBase> Trainer<R> {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig, replay_buffer_config: R::Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            replay_buffer_config,
        })
    }

    fn save_model<A: Agent + ?Sized>(agent: &A, model_dir: &Path) {
        match agent.save_params(model_dir) {
            Ok(()) => info!("Saved the model in {:?}.", model_dir),
            Err(e) => info!("Failed to save model in {:?}: {}", model_dir, e),
        }
    }

    /// Train the agent.
    pub fn train<A, V>(
        &mut self,
        agent: &mut A,
        env: V,
        recorder: &mut dyn AggregateRecorder,
    ) -> Result<()>
    where
        A: Agent + ?Sized,
        V: VecEnv,
    {
        self.train_with_callback(agent, env, recorder, |_| true)
    }

    /// Train the agent, calling `callback` at the end of every cycle.
    pub fn train_with_callback<A, V, F>(
        &mut self,
        agent: &mut A,
        env: V,
        recorder: &mut dyn AggregateRecorder,
        mut callback: F,
    ) -> Result<()>
    where
        A: Agent + ?Sized,
        V: VecEnv,
        F: FnMut(&CycleInfo) -> bool,
    {
        let config = &self.config;
        let mut buffer = match config.replay_enabled() {
            true => Some(R::build(&self.replay_buffer_config)?),
            false => None,
        };
        let mut runner = Runner::new(env, config.n_steps, config.n_stack)?;
        let n_envs = runner.n_envs();
        let n_batch = n_envs * config.n_steps;
        let mut replay_schedule = ReplaySchedule::new(config.replay_ratio, config.seed)?;
        let mut episode_stats = EpisodeStats::new(config.n_steps, n_envs);
        let timer = SystemTime::now();
        let mut env_steps: usize = 0;
        let mut n_updates: usize = 0;
        let mut cycle: usize = 0;
        agent.train();

        info!(
            "Start training: {} envs, {} steps per rollout, {} timesteps",
            n_envs, config.n_steps, config.total_timesteps
        );

        while env_steps < config.total_timesteps {
            let progress = env_steps as f32 / config.total_timesteps as f32;

            // On-policy phase
            let rollout = runner.run(agent)?;
            env_steps += n_batch;
            episode_stats.feed(&rollout.batch.rewards, &rollout.batch.dones);
            if let Some(buffer) = buffer.as_mut() {
                buffer.put(&rollout)?;
            }
            let mut record = agent.opt_with_record(&rollout.batch, progress)?;
            n_updates += 1;

            // Off-policy phase
            let mut n_replay = 0;
            if let Some(buffer) = buffer.as_mut() {
                if buffer.has_at_least(config.replay_start) {
                    n_replay = replay_schedule.draw();
                    for _ in 0..n_replay {
                        let batch = buffer.get()?;
                        agent.opt(&batch, progress)?;
                        n_updates += 1;
                    }
                }
            }

            if cycle % config.log_interval == 0 {
                let secs = timer.elapsed()?.as_secs_f32().max(1e-6);
                record.merge_inplace(Record::from_slice(&[
                    ("total_timesteps", Scalar(env_steps as f32)),
                    ("fps", Scalar((env_steps as f32 / secs).floor())),
                    ("nupdates", Scalar(n_updates as f32)),
                    ("n_replay", Scalar(n_replay as f32)),
                    ("mean_episode_length", Scalar(episode_stats.mean_length())),
                    ("mean_episode_reward", Scalar(episode_stats.mean_reward())),
                ]));
                recorder.store(record);
                recorder.flush(env_steps as i64);
            }

            if config.save_interval > 0 && (cycle + 1) % config.save_interval == 0 {
                if let Some(model_dir) = config.model_dir.as_ref() {
                    let path = Path::new(model_dir).join(format!("{}", cycle + 1));
                    Self::save_model(agent, &path);
                }
            }

            let info = CycleInfo {
                cycle,
                env_steps,
                n_updates,
                n_replay,
                mean_episode_length: episode_stats.mean_length(),
                mean_episode_reward: episode_stats.mean_reward(),
            };
            cycle += 1;
            if !callback(&info) {
                info!("Training stopped by callback at cycle {}", info.cycle);
                break;
            }
        }

        if let Some(model_dir) = config.model_dir.as_ref() {
            Self::save_model(agent, &Path::new(model_dir).join("final"));
        }

        Ok(())
    }
}
