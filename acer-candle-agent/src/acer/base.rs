//! ACER agent implemented with candle.
use super::{AcerConfig, AcerModel};
use crate::{
    opt::Optimizer,
    util::{add_grads, clip_by_global_norm, global_norm, obs_to_tensor, track},
};
use acer_core::{
    record::{Record, RecordValue::Scalar},
    retrace::{explained_variance, q_retrace, EPS},
    trust_region::{avg_norm, kl_grad, project},
    Agent, Configurable, ObsBatch, Policy, PolicyOutput, RolloutBatch,
};
use anyhow::{bail, Context, Result};
use candle_core::{backprop::GradStore, Device, Tensor, Var};
use log::{trace, warn};
use rand::{distributions::WeightedIndex, rngs::SmallRng, Rng, SeedableRng};
use std::{convert::TryFrom, fs, path::Path};

/// Policy losses as functions of the action probabilities `f`, `[n, n_actions]`.
///
/// `w_f` and `w_bc` are the constant weights of the truncated importance-sampling term
/// and of the bias-correction term. Returns `(loss_f, loss_bc, entropy)`.
fn policy_losses(
    f: &Tensor,
    actions: &Tensor,
    w_f: &Tensor,
    w_bc: &Tensor,
) -> Result<(Tensor, Tensor, Tensor)> {
    let log_f = (f + EPS as f64)?.log()?;
    let log_f_i = log_f.gather(actions, 1)?.squeeze(1)?;
    let loss_f = (log_f_i * w_f)?.mean_all()?.neg()?;
    let loss_bc = (&log_f * w_bc)?.sum(1)?.mean_all()?.neg()?;
    let entropy = (f * &log_f)?.sum(1)?.neg()?.mean_all()?;
    Ok((loss_f, loss_bc, entropy))
}

/// ACER agent implemented with candle.
///
/// The agent holds the live networks, trained by the optimizer, and an exponential
/// moving average of them (the polyak model) defining the trust region.
pub struct Acer {
    config: AcerConfig,
    device: Device,
    model: AcerModel,
    polyak: AcerModel,
    opt: Optimizer,
    train: bool,
    n_opts: usize,
    rng: SmallRng,
}

impl Acer {
    /// Configuration of the agent.
    pub fn config(&self) -> &AcerConfig {
        &self.config
    }

    /// The number of optimization steps applied so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Returns action probabilities and Q-values of the live networks.
    pub fn forward(
        &self,
        obs: &ObsBatch,
        state: Option<&[f32]>,
        masks: &[i8],
    ) -> Result<(Tensor, Tensor)> {
        let obs = obs_to_tensor(obs, &self.device)?;
        self.model.forward(&obs, state, masks)
    }

    fn check_batch(&self, batch: &RolloutBatch) -> Result<()> {
        let n = batch.n_batch();
        let n_actions = self.config.n_actions;
        if batch.n_actions != n_actions {
            bail!("batch has {} actions, agent has {}", batch.n_actions, n_actions);
        }
        if batch.obs.len() != batch.n_envs * (batch.n_steps + 1)
            || batch.actions.len() != n
            || batch.rewards.len() != n
            || batch.dones.len() != n
            || batch.mus.len() != n * n_actions
            || batch.masks.len() != batch.n_envs * (batch.n_steps + 1)
        {
            bail!("inconsistent rollout batch of {} envs x {} steps", batch.n_envs, batch.n_steps);
        }
        if let Some(a) = batch.actions.iter().find(|&&a| a < 0 || a as usize >= n_actions) {
            bail!("action {} out of range", a);
        }
        Ok(())
    }

    /// Index of the rows of non-bootstrap steps, `e * (n_steps + 1) + t`.
    fn keep_index(&self, n_envs: usize, n_steps: usize) -> Result<Tensor> {
        let ixs: Vec<i64> = (0..n_envs)
            .flat_map(|e| (0..n_steps).map(move |t| (e * (n_steps + 1) + t) as i64))
            .collect();
        Ok(Tensor::from_vec(ixs, (n_envs * n_steps,), &self.device)?)
    }

    /// Computes the gradients of the live parameters and the diagnostics of a batch.
    ///
    /// With the trust region enabled, the policy gradient is projected before being
    /// backpropagated through the action probabilities.
    fn grads(&self, batch: &RolloutBatch) -> Result<(GradStore, Record)> {
        self.check_batch(batch)?;
        let (n_envs, n_steps, n_actions) = (batch.n_envs, batch.n_steps, batch.n_actions);
        let n = n_envs * n_steps;
        let c = self.config.correction_term;
        let q_coef = self.config.q_coef as f64;
        let ent_coef = self.config.ent_coef as f64;
        let device = &self.device;

        let obs = obs_to_tensor(&batch.obs, device)?;
        let state = batch.state.as_deref();
        let (f_all, q_all) = self.model.forward(&obs, state, &batch.masks)?;
        let (f_polyak_all, _) = self.polyak.forward(&obs, state, &batch.masks)?;

        // Drop the bootstrap step of each environment
        let keep = self.keep_index(n_envs, n_steps)?;
        let f = f_all.index_select(&keep, 0)?;
        let q = q_all.index_select(&keep, 0)?;

        // Retrace targets and importance weights, without gradient
        let values: Vec<f32> = (&f_all * &q_all)?.sum(1)?.detach().to_vec1()?;
        let f_vec: Vec<f32> = f.detach().flatten_all()?.to_vec1()?;
        let q_vec: Vec<f32> = q.detach().flatten_all()?.to_vec1()?;
        let v: Vec<f32> = (0..n)
            .map(|i| values[(i / n_steps) * (n_steps + 1) + i % n_steps])
            .collect();
        let taken = |i: usize| i * n_actions + batch.actions[i] as usize;
        let rho: Vec<f32> = f_vec
            .iter()
            .zip(batch.mus.iter())
            .map(|(f, mu)| f / (mu + EPS))
            .collect();
        let rho_i: Vec<f32> = (0..n).map(|i| rho[taken(i)]).collect();
        let rho_bar: Vec<f32> = rho_i.iter().map(|r| r.min(1.0)).collect();
        let q_i_vec: Vec<f32> = (0..n).map(|i| q_vec[taken(i)]).collect();
        let qret = q_retrace(
            &batch.rewards,
            &batch.dones,
            &q_i_vec,
            &values,
            &rho_bar,
            n_envs,
            n_steps,
            self.config.gamma,
        );
        let w_f: Vec<f32> = (0..n).map(|i| (qret[i] - v[i]) * c.min(rho_i[i])).collect();
        let w_bc: Vec<f32> = (0..n * n_actions)
            .map(|j| {
                let i = j / n_actions;
                (q_vec[j] - v[i]) * (1.0 - c / (rho[j] + EPS)).max(0.0) * f_vec[j]
            })
            .collect();

        let actions = Tensor::from_vec(batch.actions.clone(), (n, 1), device)?;
        let qret_t = Tensor::from_slice(&qret, (n,), device)?;
        let w_f = Tensor::from_vec(w_f, (n,), device)?;
        let w_bc = Tensor::from_vec(w_bc, (n, n_actions), device)?;

        // Losses
        let (loss_f, loss_bc, entropy) = policy_losses(&f, &actions, &w_f, &w_bc)?;
        let q_i = q.gather(&actions, 1)?.squeeze(1)?;
        let loss_q = ((&qret_t - &q_i)?.sqr()? * 0.5)?.mean_all()?;
        let loss_policy = (&loss_f + &loss_bc)?;
        let loss = ((&loss_policy + (&loss_q * q_coef)?)? - (&entropy * ent_coef)?)?;

        let mut record = Record::from_slice(&[
            ("loss", Scalar(loss.to_scalar::<f32>()?)),
            ("loss_q", Scalar(loss_q.to_scalar::<f32>()?)),
            ("entropy", Scalar(entropy.to_scalar::<f32>()?)),
            ("loss_policy", Scalar(loss_policy.to_scalar::<f32>()?)),
            ("loss_f", Scalar(loss_f.to_scalar::<f32>()?)),
            ("loss_bc", Scalar(loss_bc.to_scalar::<f32>()?)),
            ("explained_variance", Scalar(explained_variance(&q_i_vec, &qret))),
            ("avg_rho_bar", Scalar(rho_bar.iter().sum::<f32>() / n as f32)),
            (
                "avg_rho_i_truncated",
                Scalar(rho_i.iter().map(|r| r.min(c)).sum::<f32>() / n as f32),
            ),
        ]);

        if !self.config.trust_region {
            return Ok((loss.backward()?, record));
        }

        let vars = self.model.vars();

        // Gradient of the policy objective with respect to the probabilities
        let f_leaf = Var::from_tensor(&f.detach())?;
        let g: Vec<f32> = {
            let (loss_f, loss_bc, entropy) = policy_losses(f_leaf.as_tensor(), &actions, &w_f, &w_bc)?;
            let objective = ((loss_f + loss_bc)? - (entropy * ent_coef)?)?.affine(-(n as f64), 0.0)?;
            let grads = objective.backward()?;
            let g = grads
                .get(f_leaf.as_tensor())
                .context("no gradient with respect to the action probabilities")?;
            g.flatten_all()?.to_vec1()?
        };
        let f_polyak: Vec<f32> = f_polyak_all
            .index_select(&keep, 0)?
            .detach()
            .flatten_all()?
            .to_vec1()?;
        let k = kl_grad(&f_polyak, &f_vec);
        let (g, stats) = project(&g, &k, n_actions, self.config.delta);
        let grads_f: Vec<f32> = g.iter().map(|g| -g / n as f32).collect();
        let avg_norm_grads_f = avg_norm(&grads_f, n_actions) * n as f32;
        let grads_f = Tensor::from_vec(grads_f, (n, n_actions), device)?;

        // Backpropagate the projected gradient through f, and the Q loss separately
        let mut grads = (&f * &grads_f)?.sum_all()?.backward()?;
        let grads_q = (&loss_q * q_coef)?.backward()?;
        let norm_grads_policy = global_norm(&grads, &vars)?;
        let norm_grads_q = global_norm(&grads_q, &vars)?;
        add_grads(&mut grads, &grads_q, &vars)?;

        record.merge_inplace(Record::from_slice(&[
            ("norm_grads_q", Scalar(norm_grads_q)),
            ("norm_grads_policy", Scalar(norm_grads_policy)),
            ("avg_norm_grads_f", Scalar(avg_norm_grads_f)),
            ("avg_norm_k", Scalar(stats.avg_norm_k)),
            ("avg_norm_g", Scalar(stats.avg_norm_g)),
            ("avg_norm_k_dot_g", Scalar(stats.avg_norm_k_dot_g)),
            ("avg_norm_adj", Scalar(stats.avg_norm_adj)),
        ]));

        Ok((grads, record))
    }

    fn opt_(&mut self, batch: &RolloutBatch, progress: f32) -> Result<Record> {
        let (mut grads, mut record) = self.grads(batch)?;
        let vars = self.model.vars();
        let loss = record.get_scalar("loss")?;
        let norm_grads = clip_by_global_norm(&mut grads, &vars, self.config.max_grad_norm)?;
        let lr = self.config.opt_config.lr() * self.config.lr_schedule.value(progress) as f64;
        record.insert("norm_grads", Scalar(norm_grads));
        record.insert("lr", Scalar(lr as f32));

        if !loss.is_finite() || !norm_grads.is_finite() {
            warn!(
                "Skipped update {}: loss = {}, norm of gradients = {}",
                self.n_opts, loss, norm_grads
            );
            record.insert("skipped_update", Scalar(1.0));
            return Ok(record);
        }

        self.opt.set_learning_rate(lr);
        self.opt.step(&grads)?;
        let tau = 1.0 - self.config.alpha as f64;
        track(self.polyak.get_varmap(), self.model.get_varmap(), tau)?;
        self.n_opts += 1;
        trace!("update {}, loss = {}, lr = {}", self.n_opts, loss, lr);

        record.insert("skipped_update", Scalar(0.0));
        Ok(record)
    }
}

impl Configurable for Acer {
    type Config = AcerConfig;

    /// Constructs ACER agent.
    ///
    /// The polyak model starts as a copy of the live networks.
    fn build(config: Self::Config) -> Result<Self> {
        config.validate()?;
        let device = candle_core::Device::try_from(config.device.unwrap_or(crate::Device::Cpu))?;
        let model = AcerModel::build(&config, &device)?;
        let polyak = AcerModel::build(&config, &device)?;
        track(polyak.get_varmap(), model.get_varmap(), 1.0)?;
        let opt = config.opt_config.build(model.vars())?;
        let rng = SmallRng::seed_from_u64(config.seed);

        Ok(Self {
            config,
            device,
            model,
            polyak,
            opt,
            train: true,
            n_opts: 0,
            rng,
        })
    }
}

impl Policy for Acer {
    /// Samples actions from the live policy in training mode, takes the most probable
    /// actions in evaluation mode.
    fn sample(
        &mut self,
        obs: &ObsBatch,
        state: Option<&[f32]>,
        masks: &[i8],
    ) -> Result<PolicyOutput> {
        let (probs, _) = self.forward(obs, state, masks)?;
        let probs: Vec<Vec<f32>> = probs.detach().to_vec2()?;
        let mut actions = Vec::with_capacity(probs.len());

        for p in probs.iter() {
            let a = if self.train {
                self.rng.sample(WeightedIndex::new(p)?)
            } else {
                p.iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |(i_max, p_max), (i, &x)| {
                        if x > p_max {
                            (i, x)
                        } else {
                            (i_max, p_max)
                        }
                    })
                    .0
            };
            actions.push(a as i64);
        }

        Ok(PolicyOutput {
            actions,
            mus: probs.concat(),
            state: None,
        })
    }
}

impl Agent for Acer {
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt_with_record(&mut self, batch: &RolloutBatch, progress: f32) -> Result<Record> {
        self.opt_(batch, progress)
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.model.save(path.join("live.safetensors"))?;
        self.polyak.save(path.join("polyak.safetensors"))?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.model.load(path.join("live.safetensors"))?;
        self.polyak.load(path.join("polyak.safetensors"))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    const N_ENVS: usize = 2;
    const N_STEPS: usize = 3;

    fn agent(trust_region: bool) -> Result<Acer> {
        let config = AcerConfig::default()
            .obs_shape(vec![4])
            .n_actions(2)
            .trust_region(trust_region)
            .learning_rate(1e-2);
        Acer::build(config)
    }

    fn batch() -> RolloutBatch {
        let n_obs = N_ENVS * (N_STEPS + 1);
        let obs = (0..n_obs * 4).map(|i| ((i % 7) as f32 - 3.0) / 3.0).collect();
        RolloutBatch {
            n_envs: N_ENVS,
            n_steps: N_STEPS,
            n_actions: 2,
            obs: ObsBatch::new(obs, vec![n_obs, 4]),
            actions: vec![0, 1, 1, 1, 0, 0],
            rewards: vec![1.0, 0.0, 1.0, 0.0, 1.0, 1.0],
            mus: vec![0.5, 0.5, 0.3, 0.7, 0.9, 0.1, 0.5, 0.5, 0.6, 0.4, 0.2, 0.8],
            dones: vec![0, 1, 0, 0, 0, 0],
            masks: vec![0, 0, 1, 0, 0, 0, 0, 0],
            state: None,
        }
    }

    fn params(model: &AcerModel) -> Vec<f32> {
        let mut vars: Vec<_> = model.get_varmap().data().lock().unwrap().clone().into_iter().collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars.iter()
            .flat_map(|(_, v)| v.as_tensor().flatten_all().unwrap().to_vec1::<f32>().unwrap())
            .collect()
    }

    fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(a, b)| (a - b).abs()).fold(0.0, f32::max)
    }

    #[test]
    fn test_sample() -> Result<()> {
        let mut agent = agent(true)?;
        let obs = ObsBatch::new(vec![0.1; 5 * 4], vec![5, 4]);
        let masks = [0; 5];
        let state = agent.initial_state(5);
        assert_eq!(state, None);
        let out = agent.sample(&obs, state.as_deref(), &masks)?;
        let (actions, probs) = (out.actions, out.mus);
        assert_eq!(out.state, None);
        assert_eq!(actions.len(), 5);
        assert!(actions.iter().all(|&a| a == 0 || a == 1));
        assert_eq!(probs.len(), 10);
        assert!(probs.chunks(2).all(|p| (p[0] + p[1] - 1.0).abs() < 1e-5));

        // Identical observations share the greedy action in evaluation mode
        agent.eval();
        let actions = agent.sample(&obs, None, &masks)?.actions;
        assert!(actions.iter().all(|&a| a == actions[0]));

        // One mask per observation
        assert!(agent.sample(&obs, None, &masks[..4]).is_err());
        Ok(())
    }

    #[test]
    fn test_polyak_starts_as_copy() -> Result<()> {
        let agent = agent(true)?;
        assert_eq!(params(&agent.model), params(&agent.polyak));
        Ok(())
    }

    #[test]
    fn test_opt_updates_live_and_polyak() -> Result<()> {
        let mut agent = agent(true)?;
        let before = params(&agent.model);
        let record = agent.opt_with_record(&batch(), 0.0)?;

        for key in [
            "loss",
            "loss_q",
            "entropy",
            "loss_policy",
            "loss_f",
            "loss_bc",
            "explained_variance",
            "norm_grads",
            "norm_grads_q",
            "norm_grads_policy",
            "avg_norm_grads_f",
            "avg_norm_k",
            "avg_norm_g",
            "avg_norm_k_dot_g",
            "avg_norm_adj",
        ] {
            assert!(record.get(key).is_some(), "missing {}", key);
        }
        assert!(record.get_scalar("loss")?.is_finite());
        assert_eq!(record.get_scalar("skipped_update")?, 0.0);
        assert!((record.get_scalar("lr")? - 1e-2).abs() < 1e-8);
        assert_eq!(agent.n_opts(), 1);

        let live = params(&agent.model);
        let polyak = params(&agent.polyak);
        assert!(max_abs_diff(&before, &live) > 0.0);

        // polyak = 0.99 before + 0.01 live
        let expected: Vec<f32> = before
            .iter()
            .zip(live.iter())
            .map(|(b, l)| 0.99 * b + 0.01 * l)
            .collect();
        assert!(max_abs_diff(&polyak, &expected) < 1e-5);
        Ok(())
    }

    #[test]
    fn test_lr_follows_schedule() -> Result<()> {
        let mut agent = agent(false)?;
        let record = agent.opt_with_record(&batch(), 0.25)?;
        assert!((record.get_scalar("lr")? - 0.75e-2).abs() < 1e-8);
        assert!(record.get("avg_norm_k").is_none());
        Ok(())
    }

    #[test]
    fn test_unprojected_gradient_equals_loss_gradient() -> Result<()> {
        // With a trust region too wide to bind, the split backpropagation must match
        // the gradient of the total loss
        let mut agent = agent(true)?;
        agent.config.delta = 1e9;
        let vars = agent.model.vars();
        let (grads_tr, record) = agent.grads(&batch())?;
        assert_eq!(record.get_scalar("avg_norm_adj")?, 0.0);

        agent.config.trust_region = false;
        let (grads, _) = agent.grads(&batch())?;

        for var in vars.iter() {
            let g1: Vec<f32> = grads_tr.get(var.as_tensor()).unwrap().flatten_all()?.to_vec1()?;
            let g2: Vec<f32> = grads.get(var.as_tensor()).unwrap().flatten_all()?.to_vec1()?;
            assert!(max_abs_diff(&g1, &g2) < 1e-4);
        }
        Ok(())
    }

    #[test]
    fn test_non_finite_loss_skips_update() -> Result<()> {
        let mut agent = agent(true)?;
        let before = params(&agent.model);
        let mut batch = batch();
        batch.rewards[0] = f32::NAN;

        let record = agent.opt_with_record(&batch, 0.0)?;
        assert_eq!(record.get_scalar("skipped_update")?, 1.0);
        assert_eq!(agent.n_opts(), 0);
        assert_eq!(params(&agent.model), before);
        assert_eq!(params(&agent.polyak), before);
        Ok(())
    }

    #[test]
    fn test_invalid_batch() -> Result<()> {
        let mut agent = agent(true)?;
        let mut b = batch();
        b.actions[2] = 2;
        assert!(agent.opt_with_record(&b, 0.0).is_err());

        let mut b = batch();
        b.mus.pop();
        assert!(agent.opt_with_record(&b, 0.0).is_err());

        let mut b = batch();
        b.masks.pop();
        assert!(agent.opt_with_record(&b, 0.0).is_err());

        // The feed-forward networks keep no recurrent state
        let mut b = batch();
        b.state = Some(vec![0.0; N_ENVS]);
        assert!(agent.opt_with_record(&b, 0.0).is_err());
        assert_eq!(agent.n_opts(), 0);
        Ok(())
    }

    #[test]
    fn test_save_and_load_params() -> Result<()> {
        let mut agent1 = agent(true)?;
        agent1.opt(&batch(), 0.0)?;
        let dir = TempDir::new("acer")?;
        agent1.save_params(dir.path())?;
        assert!(dir.path().join("live.safetensors").exists());
        assert!(dir.path().join("polyak.safetensors").exists());

        let mut agent2 = agent(true)?;
        agent2.load_params(dir.path())?;
        assert_eq!(params(&agent1.model), params(&agent2.model));
        assert_eq!(params(&agent1.polyak), params(&agent2.polyak));
        Ok(())
    }
}
