//! Numerical simulation of reaction networks
//!
//! A [`Model`] is first compiled into a [`CompiledNetwork`], then advanced in time by a
//! [`Simulator`]: either the [`DeterministicSimulator`] integrating the rate equations
//! or the [`StochasticSimulator`] sampling molecule counts.
use indexmap::IndexMap;
use thiserror::Error;

use crate::configuration::{self, Integrator};
use crate::network::expression::ExprError;
use crate::network::model::{Model, ModelError};
use crate::network::rate_law::RateLawError;

pub mod deterministic;
pub mod network;
pub mod stochastic;

pub use deterministic::DeterministicSimulator;
pub use network::CompiledNetwork;
pub use stochastic::StochasticSimulator;

/// Advances the state of a compiled network through time
pub trait Simulator {
    /// Advance `state` (in network species order) by `duration` time units
    fn advance(
        &mut self,
        network: &CompiledNetwork,
        state: &mut [f64],
        duration: f64,
    ) -> Result<(), SimulationError>;
}

/// Which simulator to use, with its settings
#[derive(Clone, Debug, PartialEq)]
pub enum SimulationMode {
    Deterministic {
        integrator: Integrator,
        internal_dt: f64,
        rtol: f64,
        atol: f64,
    },
    Stochastic {
        seed: Option<u64>,
    },
}

impl SimulationMode {
    /// Deterministic mode using the globally configured integrator settings
    pub fn deterministic() -> Self {
        let config = configuration::defaults();
        SimulationMode::Deterministic {
            integrator: config.integrator,
            internal_dt: config.internal_dt,
            rtol: config.rtol,
            atol: config.atol,
        }
    }

    pub fn stochastic(seed: Option<u64>) -> Self {
        SimulationMode::Stochastic { seed }
    }

    pub fn is_stochastic(&self) -> bool {
        matches!(self, SimulationMode::Stochastic { .. })
    }

    /// Create the simulator for this mode
    pub fn simulator(&self) -> Box<dyn Simulator> {
        match self {
            SimulationMode::Deterministic {
                integrator,
                internal_dt,
                rtol,
                atol,
            } => Box::new(DeterministicSimulator::new(
                *integrator,
                *internal_dt,
                *rtol,
                *atol,
            )),
            SimulationMode::Stochastic { seed } => Box::new(StochasticSimulator::new(*seed)),
        }
    }
}

// region Time Series
/// Recorded trajectory, every species vector is aligned with `time`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries {
    pub time: Vec<f64>,
    pub species: IndexMap<String, Vec<f64>>,
}

impl TimeSeries {
    /// Create an empty time series for the given species
    pub fn new<S: AsRef<str>>(species: &[S]) -> Self {
        TimeSeries {
            time: Vec::new(),
            species: species
                .iter()
                .map(|s| (s.as_ref().to_string(), Vec::new()))
                .collect(),
        }
    }

    /// Record the value of every species at time `t`
    ///
    /// Species missing from `values` are recorded as NaN so the columns stay aligned.
    pub fn push(&mut self, t: f64, values: &IndexMap<String, f64>) {
        self.time.push(t);
        for (id, column) in self.species.iter_mut() {
            column.push(values.get(id).copied().unwrap_or(f64::NAN));
        }
    }

    pub fn get(&self, species: &str) -> Option<&[f64]> {
        self.species.get(species).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn species_names(&self) -> Vec<String> {
        self.species.keys().cloned().collect()
    }

    /// Value of every species at the last recorded time
    pub fn final_state(&self) -> Option<IndexMap<String, f64>> {
        if self.is_empty() {
            return None;
        }
        Some(
            self.species
                .iter()
                .filter_map(|(id, v)| v.last().map(|x| (id.clone(), *x)))
                .collect(),
        )
    }
}
// endregion Time Series

/// Simulate one trajectory of a model and record it at the requested times
///
/// The volume is taken from the model compartment. `initial` overrides the model's
/// initial values. Timepoints must be non-decreasing, and the trajectory starts at the
/// first one.
///
/// # Examples
/// ```rust
/// use indexmap::IndexMap;
/// use crnsim_core::library::{gene_expression, gene_expression_initial_state};
/// use crnsim_core::simulate::{simulate_timepoints, SimulationMode};
/// let model = gene_expression().unwrap();
/// let series = simulate_timepoints(
///     &model,
///     &SimulationMode::deterministic(),
///     &[0.0, 10.0, 20.0],
///     &gene_expression_initial_state(),
/// ).unwrap();
/// assert_eq!(series.len(), 3);
/// ```
pub fn simulate_timepoints(
    model: &Model,
    mode: &SimulationMode,
    timepoints: &[f64],
    initial: &IndexMap<String, f64>,
) -> Result<TimeSeries, SimulationError> {
    let network = CompiledNetwork::compile(model, model.compartment.size)?;
    let mut start = model.initial_state();
    for (id, value) in initial {
        start.insert(id.clone(), *value);
    }
    let mut state = network.state_vector(&start)?;
    if mode.is_stochastic() {
        state.iter_mut().for_each(|x| *x = x.round());
    }
    let mut simulator = mode.simulator();

    let mut series = TimeSeries::new(&network.species.keys().collect::<Vec<_>>());
    let mut previous = match timepoints.first() {
        Some(t) => *t,
        None => return Ok(series),
    };
    for t in timepoints {
        if *t < previous {
            return Err(SimulationError::TimeNotIncreasing(previous, *t));
        }
        simulator.advance(&network, &mut state, t - previous)?;
        series.push(*t, &network.state_map(&state));
        previous = *t;
    }
    Ok(series)
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid model")]
    Model(#[from] ModelError),
    #[error("Invalid rate law")]
    RateLaw(#[from] RateLawError),
    #[error("Invalid rate expression")]
    Expression(#[from] ExprError),
    #[error("Species {0} is not part of the model")]
    UnknownSpecies(String),
    #[error("Volume must be positive and finite, got {0}")]
    InvalidVolume(f64),
    #[error("Duration must be non-negative and finite, got {0}")]
    InvalidDuration(f64),
    #[error("Integration step size must be positive and finite, got {0}")]
    InvalidStepSize(f64),
    #[error("Timepoints must not decrease, {1} follows {0}")]
    TimeNotIncreasing(f64, f64),
    #[error("Integration failed: {0}")]
    Integration(String),
}
