//! Deterministic simulation, integrating the reaction rate equations
use ode_solvers::dopri5::Dopri5;
use ode_solvers::{DVector, System};
use tracing::{debug, warn};

use crate::configuration::Integrator;
use crate::simulate::network::CompiledNetwork;
use crate::simulate::{Simulator, SimulationError};

type State = DVector<f64>;

/// Reaction rate equations of a network in the form expected by `ode_solvers`
struct RateEquations<'n> {
    network: &'n CompiledNetwork,
}

impl System<f64, State> for RateEquations<'_> {
    fn system(&self, _t: f64, y: &State, dy: &mut State) {
        self.network.derivatives(y.as_slice(), dy.as_mut_slice());
    }
}

/// Integrates the rate equations of a network with continuous concentrations
#[derive(Clone, Debug)]
pub struct DeterministicSimulator {
    pub integrator: Integrator,
    /// Step size of the fixed step integrator
    pub internal_dt: f64,
    /// Relative tolerance of the adaptive integrator
    pub rtol: f64,
    /// Absolute tolerance of the adaptive integrator
    pub atol: f64,
}

impl DeterministicSimulator {
    pub fn new(integrator: Integrator, internal_dt: f64, rtol: f64, atol: f64) -> Self {
        DeterministicSimulator {
            integrator,
            internal_dt,
            rtol,
            atol,
        }
    }

    fn dopri5(
        &self,
        network: &CompiledNetwork,
        state: &mut [f64],
        duration: f64,
    ) -> Result<(), SimulationError> {
        let y0 = State::from_column_slice(state);
        // A single output interval, so the last output is the end point
        let mut stepper = Dopri5::new(
            RateEquations { network },
            0.0,
            duration,
            duration,
            y0,
            self.rtol,
            self.atol,
        );
        let stats = stepper
            .integrate()
            .map_err(|e| SimulationError::Integration(format!("{:?}", e)))?;
        debug!(
            accepted = stats.accepted_steps,
            rejected = stats.rejected_steps,
            "dopri5 step finished"
        );
        match stepper.y_out().last() {
            Some(y) => {
                state.copy_from_slice(y.as_slice());
                Ok(())
            }
            None => Err(SimulationError::Integration(
                "integrator produced no output".to_string(),
            )),
        }
    }

    /// Classic Runge-Kutta 4 at `internal_dt`, with the last step shortened to end on
    /// `duration`
    fn rk4(&self, network: &CompiledNetwork, state: &mut [f64], duration: f64) {
        let n = state.len();
        let steps = (duration / self.internal_dt).ceil().max(1.0) as usize;
        let mut k1 = vec![0.0; n];
        let mut k2 = vec![0.0; n];
        let mut k3 = vec![0.0; n];
        let mut k4 = vec![0.0; n];
        let mut scratch = vec![0.0; n];

        for step in 0..steps {
            // Times are computed from the index to avoid accumulating rounding errors
            let t = step as f64 * self.internal_dt;
            let dt = (duration - t).min(self.internal_dt);
            if dt <= 0.0 {
                break;
            }

            network.derivatives(state, &mut k1);
            axpy(state, &k1, dt / 2.0, &mut scratch);
            network.derivatives(&scratch, &mut k2);
            axpy(state, &k2, dt / 2.0, &mut scratch);
            network.derivatives(&scratch, &mut k3);
            axpy(state, &k3, dt, &mut scratch);
            network.derivatives(&scratch, &mut k4);

            for i in 0..n {
                state[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
            }
        }
    }
}

/// out = y + a * k
fn axpy(y: &[f64], k: &[f64], a: f64, out: &mut [f64]) {
    for ((o, yi), ki) in out.iter_mut().zip(y).zip(k) {
        *o = yi + a * ki;
    }
}

impl Simulator for DeterministicSimulator {
    fn advance(
        &mut self,
        network: &CompiledNetwork,
        state: &mut [f64],
        duration: f64,
    ) -> Result<(), SimulationError> {
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(SimulationError::InvalidDuration(duration));
        }
        if duration == 0.0 || network.n_species() == 0 {
            return Ok(());
        }
        match self.integrator {
            Integrator::Dopri5 => self.dopri5(network, state, duration)?,
            Integrator::Rk4 => {
                if !(self.internal_dt.is_finite() && self.internal_dt > 0.0) {
                    return Err(SimulationError::InvalidStepSize(self.internal_dt));
                }
                self.rk4(network, state, duration)
            }
        }
        // Integration error can push vanishing species slightly below zero
        let mut clamped = 0usize;
        for value in state.iter_mut() {
            if *value < 0.0 {
                *value = 0.0;
                clamped += 1;
            }
        }
        if clamped > 0 {
            warn!(clamped, "clamped negative concentrations to zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::model::{Model, ReactionTuple};
    use indexmap::IndexMap;

    fn decay() -> CompiledNetwork {
        let model = Model::from_tuples(
            &["X"],
            vec![ReactionTuple::new(&["X"], &[], "massaction", &[("k", "0.5")])],
            IndexMap::new(),
            IndexMap::new(),
        )
        .unwrap();
        CompiledNetwork::compile(&model, 1.0).unwrap()
    }

    #[test]
    fn dopri5_exponential_decay() {
        let network = decay();
        let mut simulator = DeterministicSimulator::new(Integrator::Dopri5, 0.01, 1e-8, 1e-10);
        let mut state = vec![10.0];
        simulator.advance(&network, &mut state, 2.0).unwrap();
        let expected = 10.0 * (-1.0f64).exp();
        assert!((state[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn rk4_exponential_decay() {
        let network = decay();
        let mut simulator = DeterministicSimulator::new(Integrator::Rk4, 0.01, 1e-8, 1e-10);
        let mut state = vec![10.0];
        // Duration is not a multiple of the step size
        simulator.advance(&network, &mut state, 1.005).unwrap();
        let expected = 10.0 * (-0.5025f64).exp();
        assert!((state[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn zero_duration_is_noop() {
        let network = decay();
        let mut simulator = DeterministicSimulator::new(Integrator::Dopri5, 0.01, 1e-6, 1e-9);
        let mut state = vec![3.0];
        simulator.advance(&network, &mut state, 0.0).unwrap();
        assert_eq!(state, vec![3.0]);
    }

    #[test]
    fn invalid_arguments() {
        let network = decay();
        let mut simulator = DeterministicSimulator::new(Integrator::Rk4, 0.0, 1e-6, 1e-9);
        let mut state = vec![3.0];
        assert!(matches!(
            simulator.advance(&network, &mut state, 1.0),
            Err(SimulationError::InvalidStepSize(_))
        ));
        assert!(matches!(
            simulator.advance(&network, &mut state, -1.0),
            Err(SimulationError::InvalidDuration(_))
        ));
    }
}
