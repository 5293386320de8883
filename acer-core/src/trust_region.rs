//! Trust-region projection of the policy gradient.
//!
//! The gradient `g` of the policy objective with respect to the action probabilities
//! is projected, per sample, so that its inner product with the gradient `k` of
//! `KL(π_polyak || π)` does not exceed `delta`:
//!
//! ```text
//! adj = max(0, (k·g - delta) / (|k|² + ε))
//! g'  = g - adj k
//! ```
use crate::retrace::EPS;

/// Diagnostics of [`project`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrustRegionStats {
    /// Mean L2 norm of `k` over samples.
    pub avg_norm_k: f32,

    /// Mean L2 norm of `g` over samples.
    pub avg_norm_g: f32,

    /// Mean of `|k·g|` over samples.
    pub avg_norm_k_dot_g: f32,

    /// Mean of the adjustment over samples.
    pub avg_norm_adj: f32,
}

/// Gradient of `KL(f_polyak || f)` with respect to `f`, `-f_polyak / (f + ε)`.
pub fn kl_grad(f_polyak: &[f32], f: &[f32]) -> Vec<f32> {
    assert_eq!(f_polyak.len(), f.len());
    f_polyak
        .iter()
        .zip(f.iter())
        .map(|(fp, f)| -fp / (f + EPS))
        .collect()
}

/// Mean of the L2 norms of the rows of `xs`, each of `width` values.
pub fn avg_norm(xs: &[f32], width: usize) -> f32 {
    let n = xs.len() / width;
    if n == 0 {
        return 0.0;
    }
    xs.chunks(width)
        .map(|row| row.iter().map(|x| x * x).sum::<f32>().sqrt())
        .sum::<f32>()
        / n as f32
}

/// Projects `g` against `k`, rows of `n_actions` values.
pub fn project(g: &[f32], k: &[f32], n_actions: usize, delta: f32) -> (Vec<f32>, TrustRegionStats) {
    assert_eq!(g.len(), k.len());
    let n = g.len() / n_actions;

    let mut out = Vec::with_capacity(g.len());
    let mut sum_dot = 0f32;
    let mut sum_adj = 0f32;

    for (g_row, k_row) in g.chunks(n_actions).zip(k.chunks(n_actions)) {
        let dot: f32 = k_row.iter().zip(g_row.iter()).map(|(k, g)| k * g).sum();
        let k_sq: f32 = k_row.iter().map(|k| k * k).sum();
        let adj = ((dot - delta) / (k_sq + EPS)).max(0.0);
        out.extend(g_row.iter().zip(k_row.iter()).map(|(g, k)| g - adj * k));
        sum_dot += dot.abs();
        sum_adj += adj;
    }

    let n_ = n.max(1) as f32;
    let stats = TrustRegionStats {
        avg_norm_k: avg_norm(k, n_actions),
        avg_norm_g: avg_norm(g, n_actions),
        avg_norm_k_dot_g: sum_dot / n_,
        avg_norm_adj: sum_adj / n_,
    };

    (out, stats)
}

#[cfg(test)]
mod test {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(a, b)| a * b).sum()
    }

    #[test]
    fn test_kl_grad_of_identical_policies() {
        let f = [0.2, 0.3, 0.5];
        let k = kl_grad(&f, &f);
        for k in k.iter() {
            assert!((k + 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_project_inside_trust_region() {
        let f = [0.25, 0.75, 0.5, 0.5];
        let k = kl_grad(&f, &f);
        // k ≈ -1, g = -0.1 k gives k·g ≈ -0.2 <= delta
        let g: Vec<f32> = k.iter().map(|k| -0.1 * k).collect();
        let (g_, stats) = project(&g, &k, 2, 1.0);
        assert_eq!(g_, g);
        assert_eq!(stats.avg_norm_adj, 0.0);
    }

    #[test]
    fn test_project_onto_trust_region_boundary() {
        let f = [0.25, 0.75, 0.5, 0.5];
        let k = kl_grad(&f, &f);
        let g: Vec<f32> = k.iter().map(|k| 3.0 * k).collect();
        let delta = 1.0;
        let (g_, stats) = project(&g, &k, 2, delta);

        for (g_row, k_row) in g_.chunks(2).zip(k.chunks(2)) {
            assert!((dot(g_row, k_row) - delta).abs() < 1e-3);
        }
        assert!((stats.avg_norm_k - 2f32.sqrt()).abs() < 1e-3);
        assert!((stats.avg_norm_k_dot_g - 6.0).abs() < 1e-3);
        assert!((stats.avg_norm_adj - 2.5).abs() < 1e-3);

        // With delta = 0, a gradient parallel to k vanishes
        let (g_, _) = project(&g, &k, 2, 0.0);
        assert!(g_.iter().all(|g| g.abs() < 1e-4));
    }

    #[test]
    fn test_avg_norm() {
        assert_eq!(avg_norm(&[3.0, 4.0, 0.0, 0.0], 2), 2.5);
        assert_eq!(avg_norm(&[], 2), 0.0);
    }
}
