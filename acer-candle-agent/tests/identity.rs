use acer_candle_agent::{learn, Acer, AcerConfig};
use acer_core::{
    record::{BufferedRecorder, NullRecorder},
    Agent, Configurable, CycleInfo, IdentityEnv, IdentityEnvConfig, LrSchedule, ReplayBuffer,
    ReplayBufferConfig, Runner, SyncVecEnv, Trainer, TrainerConfig, EPISODE_WINDOW,
};
use anyhow::Result;
use log::info;
use tempdir::TempDir;
use test_log::test;

const N_ENVS: usize = 4;
const N_STEPS: usize = 5;

fn env(seed: i64) -> Result<SyncVecEnv<IdentityEnv>> {
    let config = IdentityEnvConfig::default().dim(2).ep_length(1);
    SyncVecEnv::build(&config, N_ENVS, seed)
}

fn trainer_config(total_timesteps: usize) -> TrainerConfig {
    TrainerConfig::default()
        .total_timesteps(total_timesteps)
        .n_steps(N_STEPS)
        .n_stack(1)
        .replay_ratio(2.0)
        .replay_start(50)
        .log_interval(100)
}

fn agent_config() -> AcerConfig {
    AcerConfig::default()
        .obs_shape(vec![2])
        .n_actions(2)
        .learning_rate(1e-3)
        .lr_schedule(LrSchedule::Constant)
}

/// Fraction of rewarded steps of the greedy policy.
fn greedy_accuracy(agent: &mut Acer) -> Result<f32> {
    agent.eval();
    let mut runner = Runner::new(env(1234)?, 50, 1)?;
    let rollout = runner.run(agent)?;
    let rewards = &rollout.batch.rewards;
    Ok(rewards.iter().sum::<f32>() / rewards.len() as f32)
}

#[test]
fn test_acer_learns_identity() -> Result<()> {
    let config = trainer_config(20_000);
    let buffer_config = ReplayBufferConfig::default()
        .n_envs(N_ENVS)
        .n_steps(N_STEPS)
        .n_stack(1)
        .size(500);
    let mut trainer = Trainer::<ReplayBuffer>::build(config, buffer_config)?;
    let mut agent = Acer::build(agent_config())?;
    let mut recorder = BufferedRecorder::new();
    let mut infos: Vec<CycleInfo> = vec![];

    trainer.train_with_callback(&mut agent, env(0)?, &mut recorder, |info| {
        infos.push(info.clone());
        true
    })?;

    // Rewards of the first full window of episodes against the last one
    let first = infos
        .iter()
        .find(|info| info.env_steps >= EPISODE_WINDOW)
        .map(|info| info.mean_episode_reward)
        .unwrap();
    let last = infos.last().unwrap().mean_episode_reward;
    info!("mean episode reward: first window {}, last window {}", first, last);
    assert!(last > first);
    assert!(last > 0.8);

    let n_replay: usize = infos.iter().map(|info| info.n_replay).sum();
    assert!(n_replay > 0);
    assert_eq!(agent.n_opts(), infos.len() + n_replay);

    let record = recorder.iter().last().unwrap();
    assert!(record.get_scalar("loss")?.is_finite());
    assert!(record.get("avg_norm_k").is_some());
    assert!(record.get("mean_episode_reward").is_some());

    assert!(greedy_accuracy(&mut agent)? > 0.9);
    Ok(())
}

#[test]
fn test_learn_without_trust_region() -> Result<()> {
    let dir = TempDir::new("acer_identity")?;
    let config = trainer_config(10_000).model_dir(dir.path().to_string_lossy().to_string());
    let agent_config = agent_config().trust_region(false).learning_rate(2e-3);
    let mut agent = learn(env(7)?, agent_config.clone(), config, 500, &mut NullRecorder::new())?;
    assert!(dir.path().join("final").join("live.safetensors").exists());
    assert!(greedy_accuracy(&mut agent)? > 0.9);

    // Parameters restored into a fresh agent act the same way
    let mut restored = Acer::build(agent_config)?;
    restored.load_params(&dir.path().join("final"))?;
    assert!(greedy_accuracy(&mut restored)? > 0.9);
    Ok(())
}

#[test]
fn test_learn_rejects_small_buffer() {
    let config = trainer_config(1000);
    let result = learn(env(0).unwrap(), agent_config(), config, N_STEPS - 1, &mut NullRecorder::new());
    assert!(result.is_err());
}

#[test]
fn test_learn_rejects_unreachable_replay_start() {
    // The buffer holds 10 rollouts of 5 steps, replay would never start
    let config = trainer_config(1000).replay_start(100);
    let result = learn(env(0).unwrap(), agent_config(), config, 50, &mut NullRecorder::new());
    assert!(result.is_err());
}
