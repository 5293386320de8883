use super::{Acer, AcerConfig};
use acer_core::{
    record::AggregateRecorder, stacked_shape, Configurable, ReplayBuffer, ReplayBufferConfig,
    Trainer, TrainerConfig, VecEnv,
};
use anyhow::Result;
use log::info;

/// Trains an ACER agent on the given environments and returns it.
///
/// The observation shape and the number of actions of `config` are taken from `env`.
/// The replay buffer holds `buffer_size` environment steps per environment, which must
/// be at least `trainer_config.n_steps` and must leave room for
/// `trainer_config.replay_start` steps. Both are checked before any environment
/// interaction.
pub fn learn<V: VecEnv>(
    env: V,
    config: AcerConfig,
    trainer_config: TrainerConfig,
    buffer_size: usize,
    recorder: &mut dyn AggregateRecorder,
) -> Result<Acer> {
    let replay_buffer_config = ReplayBufferConfig::default()
        .n_envs(env.n_envs())
        .n_steps(trainer_config.n_steps)
        .n_stack(trainer_config.n_stack)
        .size(buffer_size)
        .seed(trainer_config.seed);
    if trainer_config.replay_enabled() {
        replay_buffer_config.validate_replay_start(trainer_config.replay_start)?;
    }

    let config = config
        .obs_shape(stacked_shape(&env.frame_shape(), trainer_config.n_stack))
        .n_actions(env.n_actions());
    info!("Observation shape {:?}, {} actions", config.obs_shape, config.n_actions);

    let mut agent = Acer::build(config)?;
    let mut trainer = Trainer::<ReplayBuffer>::build(trainer_config, replay_buffer_config)?;
    trainer.train(&mut agent, env, recorder)?;

    Ok(agent)
}
