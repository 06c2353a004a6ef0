//! Run a process over time and record the trajectory
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::process::{round_counts, ProcessError, SimulationProcess};
use crate::simulate::TimeSeries;

/// Settings of a single experiment
#[derive(Clone, Debug, PartialEq)]
pub struct ExperimentSettings {
    /// Simulated time to run for
    pub total_time: f64,
    /// Initial values replacing those of the model
    pub initial_state: IndexMap<String, f64>,
}

impl ExperimentSettings {
    pub fn new(total_time: f64) -> Self {
        ExperimentSettings {
            total_time,
            initial_state: IndexMap::new(),
        }
    }

    pub fn with_initial_state(mut self, initial_state: IndexMap<String, f64>) -> Self {
        self.initial_state = initial_state;
        self
    }
}

/// Run a process from its initial state for `settings.total_time`
///
/// The state is recorded at time zero and after every `time_step` of the process. The
/// final step is shortened so the last record lands exactly on `total_time`.
///
/// # Examples
/// ```rust
/// use crnsim_core::experiment::{run_experiment, ExperimentSettings};
/// use crnsim_core::library::{gene_expression, gene_expression_initial_state};
/// use crnsim_core::process::SimulationProcess;
/// let mut process = SimulationProcess::from_model(gene_expression().unwrap()).unwrap();
/// let settings = ExperimentSettings::new(10.0).with_initial_state(gene_expression_initial_state());
/// let series = run_experiment(&mut process, &settings).unwrap();
/// assert_eq!(series.len(), 11);
/// ```
pub fn run_experiment(
    process: &mut SimulationProcess,
    settings: &ExperimentSettings,
) -> Result<TimeSeries, ExperimentError> {
    let total_time = settings.total_time;
    if !(total_time.is_finite() && total_time > 0.0) {
        return Err(ExperimentError::InvalidTotalTime(total_time));
    }

    let species = process.species_names();
    let mut state = starting_state(process, &settings.initial_state)?;

    let time_step = process.time_step();
    info!(total_time, time_step, "starting experiment");
    let mut series = TimeSeries::new(&species);
    series.push(0.0, &state);

    let mut step = 0usize;
    let mut t = 0.0;
    while t < total_time {
        step += 1;
        // Computed from the step count so rounding does not accumulate
        let next = (step as f64 * time_step).min(total_time);
        let update = process.next_update(next - t, &state)?;
        for (id, delta) in &update.delta_species {
            if let Some(value) = state.get_mut(id) {
                *value += delta;
            }
        }
        t = next;
        debug!(t, "recorded state");
        series.push(t, &state);
    }
    info!(records = series.len(), "finished experiment");
    Ok(series)
}

/// Initial state of `process` with `overrides` applied, rounded for stochastic processes
pub(crate) fn starting_state(
    process: &SimulationProcess,
    overrides: &IndexMap<String, f64>,
) -> Result<IndexMap<String, f64>, ExperimentError> {
    let mut state = process.initial_state();
    for (id, value) in overrides {
        match state.get_mut(id) {
            Some(current) => *current = *value,
            None => return Err(ExperimentError::UnknownSpecies(id.clone())),
        }
    }
    if process.is_stochastic() {
        round_counts(&mut state);
    }
    Ok(state)
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("Total time must be positive and finite, got {0}")]
    InvalidTotalTime(f64),
    #[error("Initial state names species {0}, which is not in the model")]
    UnknownSpecies(String),
    #[error("Process update failed")]
    Process(#[from] ProcessError),
}
