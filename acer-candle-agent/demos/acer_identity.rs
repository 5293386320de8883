use acer_candle_agent::{learn, Acer, AcerConfig, ActorCriticNetConfig};
use acer_core::{
    record::{AggregateRecorder, TabularRecorder},
    Agent, Configurable, IdentityEnv, IdentityEnvConfig, LrSchedule, Runner, SyncVecEnv,
    TrainerConfig,
};
use acer_tensorboard::TensorboardRecorder;
use anyhow::Result;
use clap::Parser;
use log::info;

const MODEL_DIR: &str = "./acer-candle-agent/demos/model/acer_identity";

/// Trains ACER on the identity environment, where the reward is given for taking
/// the action equal to the observed state.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Network architecture (mlp)
    #[arg(long, default_value = "mlp")]
    policy: String,

    /// Learning rate schedule (constant, linear, double_linear_con, middle_drop, double_middle_drop)
    #[arg(long, default_value = "constant")]
    lr_schedule: String,

    /// The number of actions
    #[arg(long, default_value_t = 4)]
    dim: usize,

    /// The number of environments
    #[arg(long, default_value_t = 4)]
    n_envs: usize,

    /// The number of environment steps to train for
    #[arg(long, default_value_t = 40_000)]
    total_timesteps: usize,

    /// Disable the trust region
    #[arg(long, default_value_t = false)]
    no_trust_region: bool,

    /// Log metrics with tensorboard
    #[arg(long, default_value_t = false)]
    tensorboard: bool,

    /// Evaluate the saved model, not train
    #[arg(long, default_value_t = false)]
    eval: bool,
}

fn env(args: &Args, seed: i64) -> Result<SyncVecEnv<IdentityEnv>> {
    let config = IdentityEnvConfig::default().dim(args.dim).ep_length(10);
    SyncVecEnv::build(&config, args.n_envs, seed)
}

fn agent_config(args: &Args) -> Result<AcerConfig> {
    let lr_schedule: LrSchedule = args.lr_schedule.parse()?;
    Ok(AcerConfig::default()
        .net_config(ActorCriticNetConfig::from_name(&args.policy)?)
        .obs_shape(vec![args.dim])
        .n_actions(args.dim)
        .learning_rate(1e-3)
        .lr_schedule(lr_schedule)
        .trust_region(!args.no_trust_region))
}

fn train(args: &Args) -> Result<()> {
    let trainer_config = TrainerConfig::default()
        .total_timesteps(args.total_timesteps)
        .n_steps(20)
        .n_stack(1)
        .replay_ratio(4.0)
        .replay_start(200)
        .log_interval(50)
        .model_dir(MODEL_DIR);
    let mut recorder: Box<dyn AggregateRecorder> = match args.tensorboard {
        true => Box::new(TensorboardRecorder::new(MODEL_DIR)),
        false => Box::new(TabularRecorder::new()),
    };

    let _ = learn(env(args, 0)?, agent_config(args)?, trainer_config, 5000, recorder.as_mut())?;

    Ok(())
}

fn eval(args: &Args) -> Result<()> {
    let mut agent = Acer::build(agent_config(args)?)?;
    agent.load_params(&std::path::Path::new(MODEL_DIR).join("final"))?;
    agent.eval();

    let mut runner = Runner::new(env(args, 42)?, 100, 1)?;
    let rollout = runner.run(&mut agent)?;
    let rewards = &rollout.batch.rewards;
    info!(
        "Accuracy of the greedy policy: {}",
        rewards.iter().sum::<f32>() / rewards.len() as f32
    );

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.eval {
        eval(&args)?;
    } else {
        train(&args)?;
        eval(&args)?;
    }

    Ok(())
}
