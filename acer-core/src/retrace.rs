//! Retrace targets for the Q-function.
//!
//! Given rewards `r_t`, episode ends `d_t`, the Q-value of the taken action `Q_t`,
//! the state value `V_t = Σ_a π(a|s_t) Q(s_t, a)` and the truncated importance weight
//! `ρ̄_t = min(1, π(a_t|s_t) / μ(a_t|s_t))`, the target is computed backward from the
//! bootstrap value `V_T`:
//!
//! ```text
//! carry = V_T
//! for t = T-1 .. 0:
//!     target_t = r_t + γ (1 - d_t) carry
//!     carry    = V_t + ρ̄_t (target_t - Q_t)
//! ```

/// Guard against division by zero and `log(0)`.
pub const EPS: f32 = 1e-6;

/// Computes Retrace targets for a batch of `n_envs` trajectories of `n_steps` steps.
///
/// `rewards`, `dones`, `q_i` and `rho_bar` hold `n_steps` values per environment.
/// `values` holds `n_steps + 1` values per environment, the last one being the
/// bootstrap value. All arrays are env-major.
#[allow(clippy::too_many_arguments)]
pub fn q_retrace(
    rewards: &[f32],
    dones: &[i8],
    q_i: &[f32],
    values: &[f32],
    rho_bar: &[f32],
    n_envs: usize,
    n_steps: usize,
    gamma: f32,
) -> Vec<f32> {
    let n = n_envs * n_steps;
    assert_eq!(rewards.len(), n);
    assert_eq!(dones.len(), n);
    assert_eq!(q_i.len(), n);
    assert_eq!(rho_bar.len(), n);
    assert_eq!(values.len(), n_envs * (n_steps + 1));

    let mut qret = vec![0f32; n];

    for e in 0..n_envs {
        let v = &values[e * (n_steps + 1)..(e + 1) * (n_steps + 1)];
        let mut carry = v[n_steps];

        for t in (0..n_steps).rev() {
            let i = e * n_steps + t;
            let not_done = 1.0 - dones[i] as f32;
            let target = rewards[i] + gamma * carry * not_done;
            qret[i] = target;
            carry = rho_bar[i] * (target - q_i[i]) + v[t];
        }
    }

    qret
}

fn variance(xs: &[f32]) -> f32 {
    let n = xs.len() as f32;
    let mean = xs.iter().sum::<f32>() / n;
    xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n
}

/// Explained variance of `y_pred` against `y`, `1 - Var[y - y_pred] / Var[y]`.
///
/// Returns NaN if `Var[y]` is zero.
pub fn explained_variance(y_pred: &[f32], y: &[f32]) -> f32 {
    assert_eq!(y_pred.len(), y.len());
    let var_y = variance(y);
    if var_y == 0.0 || y.is_empty() {
        return f32::NAN;
    }
    let diff: Vec<f32> = y.iter().zip(y_pred.iter()).map(|(a, b)| a - b).collect();
    1.0 - variance(&diff) / var_y
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_zero_discount_gives_rewards() {
        let rewards = [1.0, -2.0, 0.5, 3.0, 0.0, 1.5];
        let dones = [0, 1, 0, 0, 0, 1];
        let q_i = [0.3, 9.0, -1.0, 2.0, 4.0, 0.0];
        let values = [1.0, 2.0, 3.0, 4.0, -5.0, 6.0, 7.0, 8.0];
        let rho_bar = [0.2, 1.0, 0.7, 0.1, 0.9, 0.4];
        let qret = q_retrace(&rewards, &dones, &q_i, &values, &rho_bar, 2, 3, 0.0);
        assert_close(&qret, &rewards);
    }

    #[test]
    fn test_calibrated_critic_gives_n_step_return() {
        // With rho_bar = 1 and Q = V, the carry equals the target itself
        let rewards = [1.0, 0.0, 2.0];
        let values = [0.3, -0.7, 1.1, 0.5];
        let q_i = [0.3, -0.7, 1.1];
        let rho_bar = [1.0; 3];

        let qret = q_retrace(&rewards, &[0, 0, 0], &q_i, &values, &rho_bar, 1, 3, 0.9);
        // 2 + 0.9 * 0.5, 0.9 * 2.45, 1 + 0.9 * 2.205
        assert_close(&qret, &[2.9845, 2.205, 2.45]);

        let qret = q_retrace(&rewards, &[0, 0, 1], &q_i, &values, &rho_bar, 1, 3, 0.9);
        // 1 + 0.9 * 0 + 0.81 * 2
        assert_close(&qret, &[2.62, 1.8, 2.0]);
    }

    #[test]
    fn test_truncated_weight_mixes_in_value() {
        // rho_bar = 0 cuts the trace: target_t = r_t + γ V_{t+1}
        let rewards = [1.0, 1.0];
        let values = [0.0, 2.0, 4.0];
        let q_i = [5.0, 5.0];
        let qret = q_retrace(&rewards, &[0, 0], &q_i, &values, &[0.0, 0.0], 1, 2, 0.5);
        assert_close(&qret, &[2.0, 3.0]);
    }

    #[test]
    fn test_explained_variance() {
        let y = [1.0, 2.0, 3.0, 4.0];
        assert!((explained_variance(&y, &y) - 1.0).abs() < 1e-6);
        assert!(explained_variance(&[2.5; 4], &y).abs() < 1e-6);
        assert!(explained_variance(&y, &[1.0; 4]).is_nan());
    }
}
