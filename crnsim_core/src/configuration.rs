//! Process wide default settings used when a builder field is left unset
use std::sync::{LazyLock, RwLock};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

#[derive(Clone, Debug)]
pub struct Configuration {
    /// Interval between process updates during an experiment
    pub time_step: f64,
    /// Step size used by the fixed step integrator
    pub internal_dt: f64,
    /// Whether processes simulate stochastically by default
    pub stochastic: bool,
    /// Size of the compartment created for new models
    pub volume: f64,
    /// Id of the compartment created for new models
    pub compartment: String,
    /// Relative tolerance of the adaptive integrator
    pub rtol: f64,
    /// Absolute tolerance of the adaptive integrator
    pub atol: f64,
    /// Integrator used for deterministic simulation
    pub integrator: Integrator,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            time_step: 1.0,
            internal_dt: 0.01,
            stochastic: false,
            volume: 1.0,
            compartment: "default".to_string(),
            rtol: 1e-6,
            atol: 1e-9,
            integrator: Integrator::Dopri5,
        }
    }
}

/// Enum used to specify the deterministic integration method
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Integrator {
    /// Adaptive Dormand-Prince 5(4), controlled by rtol and atol
    Dopri5,
    /// Classic fixed step Runge-Kutta 4, stepping at internal_dt
    Rk4,
}

/// Snapshot of the current defaults
///
/// A poisoned lock still holds valid plain data, so its contents are used as is.
pub fn defaults() -> Configuration {
    match CONFIGURATION.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Replace the process wide defaults
pub fn set_defaults(configuration: Configuration) {
    match CONFIGURATION.write() {
        Ok(mut config) => *config = configuration,
        Err(poisoned) => *poisoned.into_inner() = configuration,
    }
}
