//! Stochastic simulation of molecule counts with Gillespie's direct method
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::simulate::network::CompiledNetwork;
use crate::simulate::{SimulationError, Simulator};

/// Exact stochastic simulator, owns the random stream so repeated calls to
/// [`Simulator::advance`] continue one reproducible trajectory
#[derive(Clone, Debug)]
pub struct StochasticSimulator {
    rng: ChaCha8Rng,
}

impl StochasticSimulator {
    /// Create a simulator, seeded from the OS when `seed` is None
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        StochasticSimulator { rng }
    }
}

impl Simulator for StochasticSimulator {
    fn advance(
        &mut self,
        network: &CompiledNetwork,
        state: &mut [f64],
        duration: f64,
    ) -> Result<(), SimulationError> {
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(SimulationError::InvalidDuration(duration));
        }
        let mut propensities = vec![0.0; network.n_reactions()];
        let mut t = 0.0;
        let mut firings = 0usize;
        loop {
            network.propensities(state, &mut propensities);
            let total: f64 = propensities.iter().sum();
            if total <= 0.0 || !total.is_finite() {
                break;
            }
            // 1 - u lies in (0, 1], keeping the logarithm finite
            let u: f64 = self.rng.gen();
            let tau = -(1.0 - u).ln() / total;
            // The waiting time is memoryless, so a draw past the end can be discarded
            if t + tau > duration {
                break;
            }
            t += tau;

            let threshold = self.rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = propensities.len() - 1;
            for (index, propensity) in propensities.iter().enumerate() {
                cumulative += propensity;
                if threshold < cumulative {
                    chosen = index;
                    break;
                }
            }
            network.fire(chosen, state);
            firings += 1;
        }
        trace!(firings, duration, "gillespie step finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::model::{Model, ReactionTuple};
    use indexmap::IndexMap;

    fn birth_death() -> CompiledNetwork {
        let model = Model::from_tuples(
            &["X"],
            vec![
                ReactionTuple::new(&[], &["X"], "massaction", &[("k", "10")]),
                ReactionTuple::new(&["X"], &[], "massaction", &[("k", "1")]),
            ],
            IndexMap::new(),
            IndexMap::new(),
        )
        .unwrap();
        CompiledNetwork::compile(&model, 1.0).unwrap()
    }

    #[test]
    fn counts_stay_integral_and_nonnegative() {
        let network = birth_death();
        let mut simulator = StochasticSimulator::new(Some(7));
        let mut state = vec![0.0];
        for _ in 0..50 {
            simulator.advance(&network, &mut state, 0.5).unwrap();
            assert!(state[0] >= 0.0);
            assert_eq!(state[0].fract(), 0.0);
        }
    }

    #[test]
    fn same_seed_same_trajectory() {
        let network = birth_death();
        let run = |seed| {
            let mut simulator = StochasticSimulator::new(Some(seed));
            let mut state = vec![0.0];
            let mut trajectory = Vec::new();
            for _ in 0..20 {
                simulator.advance(&network, &mut state, 1.0).unwrap();
                trajectory.push(state[0]);
            }
            trajectory
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn no_reactions_possible() {
        let model = Model::from_tuples(
            &["X"],
            vec![ReactionTuple::new(&["X"], &[], "massaction", &[("k", "1")])],
            IndexMap::new(),
            IndexMap::new(),
        )
        .unwrap();
        let network = CompiledNetwork::compile(&model, 1.0).unwrap();
        let mut simulator = StochasticSimulator::new(Some(1));
        let mut state = vec![0.0];
        simulator.advance(&network, &mut state, 100.0).unwrap();
        assert_eq!(state, vec![0.0]);
    }

    #[test]
    fn saturating_degradation_stops_at_zero() {
        // X is consumed at a rate that does not depend on X itself
        let model = Model::from_tuples(
            &["X", "Y"],
            vec![ReactionTuple::new(
                &["X"],
                &[],
                "hillnegative",
                &[("k", "1"), ("s1", "Y"), ("K", "1")],
            )],
            IndexMap::new(),
            IndexMap::new(),
        )
        .unwrap();
        let network = CompiledNetwork::compile(&model, 1.0).unwrap();
        let mut simulator = StochasticSimulator::new(Some(3));
        let mut state = vec![0.0, 0.0];
        simulator.advance(&network, &mut state, 5.0).unwrap();
        assert_eq!(state, vec![0.0, 0.0]);

        let mut state = vec![3.0, 0.0];
        for _ in 0..20 {
            simulator.advance(&network, &mut state, 1.0).unwrap();
            assert!(state[0] >= 0.0);
        }
        assert_eq!(state[0], 0.0);
    }

    #[test]
    fn stationary_mean_near_ratio() {
        // Birth-death has a Poisson stationary distribution with mean k_birth / k_death
        let network = birth_death();
        let mut simulator = StochasticSimulator::new(Some(2024));
        let mut state = vec![10.0];
        let mut total = 0.0;
        let samples = 2000;
        for _ in 0..samples {
            simulator.advance(&network, &mut state, 1.0).unwrap();
            total += state[0];
        }
        let mean = total / samples as f64;
        assert!((mean - 10.0).abs() < 1.0, "mean was {}", mean);
    }
}
