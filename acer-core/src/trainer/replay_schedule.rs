//! Number of off-policy updates per cycle.
use anyhow::{anyhow, Result};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Poisson};

/// Draws the number of off-policy updates of a cycle from `Poisson(replay_ratio)`.
pub struct ReplaySchedule {
    poisson: Option<Poisson<f64>>,
    rng: StdRng,
}

impl ReplaySchedule {
    /// Creates a schedule. A zero ratio always draws zero.
    pub fn new(replay_ratio: f32, seed: u64) -> Result<Self> {
        let poisson = if replay_ratio > 0.0 {
            Some(
                Poisson::new(replay_ratio as f64)
                    .map_err(|e| anyhow!("invalid replay ratio {}: {}", replay_ratio, e))?,
            )
        } else {
            None
        };
        Ok(Self {
            poisson,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Draws the number of off-policy updates.
    pub fn draw(&mut self) -> usize {
        match &self.poisson {
            Some(poisson) => poisson.sample(&mut self.rng) as usize,
            None => 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mean_converges_to_ratio() -> Result<()> {
        for &ratio in [0.5f32, 4.0].iter() {
            let mut schedule = ReplaySchedule::new(ratio, 0)?;
            let n = 20000;
            let mean = (0..n).map(|_| schedule.draw()).sum::<usize>() as f32 / n as f32;
            assert!((mean - ratio).abs() < 0.1, "{} vs {}", mean, ratio);
        }
        Ok(())
    }

    #[test]
    fn test_zero_ratio() -> Result<()> {
        let mut schedule = ReplaySchedule::new(0.0, 0)?;
        assert!((0..100).all(|_| schedule.draw() == 0));
        Ok(())
    }
}
