//! A reaction network wrapped as a time-stepping process
//!
//! The process owns its model and simulator. Each call to
//! [`SimulationProcess::next_update`] advances a copy of the given state by one
//! interval and reports how every species changed.
use std::path::PathBuf;

use derive_builder::Builder;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::configuration::{self, Integrator};
use crate::io::sbml::SbmlError;
use crate::network::model::Model;
use crate::simulate::{CompiledNetwork, SimulationError, SimulationMode, Simulator};

/// Where the model of a process comes from
#[derive(Clone, Debug, PartialEq)]
pub enum ModelSource {
    /// An in-memory model
    Model(Model),
    /// Path to an SBML file
    SbmlFile(PathBuf),
}

impl From<Model> for ModelSource {
    fn from(model: Model) -> Self {
        ModelSource::Model(model)
    }
}

impl From<PathBuf> for ModelSource {
    fn from(path: PathBuf) -> Self {
        ModelSource::SbmlFile(path)
    }
}

impl From<&str> for ModelSource {
    fn from(path: &str) -> Self {
        ModelSource::SbmlFile(PathBuf::from(path))
    }
}

/// Settings of a simulation process, unset fields come from the global configuration
///
/// # Examples
/// ```rust
/// use crnsim_core::library::gene_expression;
/// use crnsim_core::process::ProcessConfigBuilder;
/// let config = ProcessConfigBuilder::default()
///     .source(gene_expression().unwrap())
///     .stochastic(true)
///     .seed(Some(1))
///     .build()
///     .unwrap();
/// assert_eq!(config.time_step, 1.0);
/// ```
#[derive(Builder, Clone, Debug, PartialEq)]
pub struct ProcessConfig {
    /// Model or SBML file to simulate
    #[builder(setter(into))]
    pub source: ModelSource,
    /// Interval between updates when run in an experiment
    #[builder(default = "configuration::defaults().time_step")]
    pub time_step: f64,
    /// Step size of the fixed step integrator
    #[builder(default = "configuration::defaults().internal_dt")]
    pub internal_dt: f64,
    /// Sample molecule counts instead of integrating concentrations
    #[builder(default = "configuration::defaults().stochastic")]
    pub stochastic: bool,
    /// Reaction volume, the size of the model compartment when None
    #[builder(default = "None")]
    pub volume: Option<f64>,
    #[builder(default = "configuration::defaults().integrator")]
    pub integrator: Integrator,
    #[builder(default = "configuration::defaults().rtol")]
    pub rtol: f64,
    #[builder(default = "configuration::defaults().atol")]
    pub atol: f64,
    /// Seed of the stochastic simulator, drawn from the OS when None
    #[builder(default = "None")]
    pub seed: Option<u64>,
}

impl ProcessConfig {
    fn mode(&self) -> SimulationMode {
        if self.stochastic {
            SimulationMode::Stochastic { seed: self.seed }
        } else {
            SimulationMode::Deterministic {
                integrator: self.integrator,
                internal_dt: self.internal_dt,
                rtol: self.rtol,
                atol: self.atol,
            }
        }
    }
}

/// Result of advancing a process by one interval
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessUpdate {
    /// Change of every species over the interval
    pub delta_species: IndexMap<String, f64>,
    /// Rate of every reaction at the start of the interval
    pub rates: IndexMap<String, f64>,
}

/// Reaction network simulation stepped from the outside
pub struct SimulationProcess {
    config: ProcessConfig,
    model: Model,
    network: CompiledNetwork,
    simulator: Box<dyn Simulator>,
}

impl SimulationProcess {
    /// Load (or take) the model, validate it and compile it for simulation
    pub fn new(config: ProcessConfig) -> Result<Self, ProcessError> {
        let model = match &config.source {
            ModelSource::Model(model) => model.clone(),
            ModelSource::SbmlFile(path) => {
                info!(path = %path.display(), "loading SBML model");
                Model::read_sbml(path)?
            }
        };
        if !(config.time_step.is_finite() && config.time_step > 0.0) {
            return Err(ProcessError::InvalidTimeStep(config.time_step));
        }
        let volume = config.volume.unwrap_or(model.compartment.size);
        let network = CompiledNetwork::compile(&model, volume)?;
        let simulator = config.mode().simulator();
        info!(
            model = model.id.as_deref().unwrap_or("unnamed"),
            species = network.n_species(),
            reactions = network.n_reactions(),
            volume,
            stochastic = config.stochastic,
            "created simulation process"
        );
        Ok(SimulationProcess {
            config,
            model,
            network,
            simulator,
        })
    }

    /// Shorthand for a process with default settings around an in-memory model
    pub fn from_model(model: Model) -> Result<Self, ProcessError> {
        let config = ProcessConfigBuilder::default().source(model).build()?;
        SimulationProcess::new(config)
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn time_step(&self) -> f64 {
        self.config.time_step
    }

    /// Reaction volume the network was compiled with
    pub fn volume(&self) -> f64 {
        self.network.volume
    }

    pub fn is_stochastic(&self) -> bool {
        self.config.stochastic
    }

    /// Ids of the species the process updates, in model order
    pub fn species_names(&self) -> Vec<String> {
        self.network.species.keys().cloned().collect()
    }

    /// Ids of the reactions whose rates are reported, in model order
    pub fn reaction_names(&self) -> Vec<String> {
        self.network.reaction_ids()
    }

    /// Global parameters of the model
    pub fn parameters(&self) -> &IndexMap<String, f64> {
        &self.model.parameters
    }

    /// Initial values of the model species
    ///
    /// Stochastic processes work on molecule counts, so non-integer values are rounded.
    pub fn initial_state(&self) -> IndexMap<String, f64> {
        let mut state = self.model.initial_state();
        if self.config.stochastic {
            round_counts(&mut state);
        }
        state
    }

    /// Advance `state` by `dt` and report the change of every species
    ///
    /// Species missing from `state` are taken to be zero.
    pub fn next_update(
        &mut self,
        dt: f64,
        state: &IndexMap<String, f64>,
    ) -> Result<ProcessUpdate, ProcessError> {
        let before = self.network.state_vector(state)?;
        let mut rates = vec![0.0; self.network.n_reactions()];
        if self.config.stochastic {
            self.network.propensities(&before, &mut rates);
        } else {
            self.network.rates(&before, &mut rates);
        }

        let mut after = before.clone();
        self.simulator.advance(&self.network, &mut after, dt)?;

        let delta_species = self
            .network
            .species
            .iter()
            .map(|(id, index)| (id.clone(), after[*index] - before[*index]))
            .collect();
        let rates = self.network.reaction_ids().into_iter().zip(rates).collect();
        debug!(dt, "computed process update");
        Ok(ProcessUpdate {
            delta_species,
            rates,
        })
    }
}

/// Round every value to the nearest count, warning when anything changed
pub(crate) fn round_counts(state: &mut IndexMap<String, f64>) {
    for (id, value) in state.iter_mut() {
        let rounded = value.round();
        if rounded != *value {
            warn!(species = %id, value = *value, rounded, "rounding initial value to a molecule count");
            *value = rounded;
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Unable to load the SBML model")]
    Sbml(#[from] SbmlError),
    #[error("Simulation failed")]
    Simulation(#[from] SimulationError),
    #[error("Invalid process configuration")]
    Config(#[from] ProcessConfigBuilderError),
    #[error("Time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),
}

#[cfg(test)]
mod process_tests {
    use super::*;
    use crate::library::{gene_expression, gene_expression_initial_state};

    fn process(stochastic: bool) -> SimulationProcess {
        let config = ProcessConfigBuilder::default()
            .source(gene_expression().unwrap())
            .stochastic(stochastic)
            .seed(Some(11))
            .build()
            .unwrap();
        SimulationProcess::new(config).unwrap()
    }

    #[test]
    fn builder_defaults() {
        let config = ProcessConfigBuilder::default()
            .source("model.xml")
            .build()
            .unwrap();
        assert_eq!(config.source, ModelSource::SbmlFile(PathBuf::from("model.xml")));
        assert!(!config.stochastic);
        assert_eq!(config.internal_dt, 0.01);
        assert_eq!(config.integrator, Integrator::Dopri5);
        assert!(config.seed.is_none());
    }

    #[test]
    fn missing_source() {
        assert!(ProcessConfigBuilder::default().build().is_err());
    }

    #[test]
    fn species_and_parameters() {
        let process = process(false);
        assert_eq!(process.species_names(), vec!["G", "T", "P", "R"]);
        assert_eq!(process.parameters().get("k_tl"), Some(&0.1));
        assert_eq!(process.initial_state().get("R"), Some(&100.0));
    }

    #[test]
    fn deterministic_update() {
        let mut process = process(false);
        let update = process
            .next_update(1.0, &gene_expression_initial_state())
            .unwrap();
        // Transcription runs at k_tx with one gene, nothing else can happen yet
        assert!((update.delta_species["T"] - 0.05).abs() < 1e-3);
        assert_eq!(update.delta_species["G"], 0.0);
        assert_eq!(update.delta_species["R"], 0.0);
        assert!((update.rates["r0"] - 0.05).abs() < 1e-12);
        assert_eq!(update.rates["r1"], 0.0);
    }

    #[test]
    fn stochastic_update_is_integral() {
        let mut process = process(true);
        let update = process
            .next_update(100.0, &gene_expression_initial_state())
            .unwrap();
        assert!(update.delta_species.values().all(|d| d.fract() == 0.0));
    }

    #[test]
    fn stochastic_initial_state_rounded() {
        let mut model = gene_expression().unwrap();
        model.set_initial_condition("R", 99.6).unwrap();
        let config = ProcessConfigBuilder::default()
            .source(model)
            .stochastic(true)
            .build()
            .unwrap();
        let process = SimulationProcess::new(config).unwrap();
        assert_eq!(process.initial_state().get("R"), Some(&100.0));
    }

    #[test]
    fn invalid_time_step() {
        let config = ProcessConfigBuilder::default()
            .source(gene_expression().unwrap())
            .time_step(0.0)
            .build()
            .unwrap();
        assert!(matches!(
            SimulationProcess::new(config),
            Err(ProcessError::InvalidTimeStep(_))
        ));
    }

    #[test]
    fn volume_from_compartment() {
        let mut model = gene_expression().unwrap();
        model.compartment.size = 4.0;
        let from_model = SimulationProcess::from_model(model.clone()).unwrap();
        assert_eq!(from_model.volume(), 4.0);
        let config = ProcessConfigBuilder::default()
            .source(model)
            .volume(Some(2.5))
            .build()
            .unwrap();
        assert_eq!(SimulationProcess::new(config).unwrap().volume(), 2.5);
    }

    #[test]
    fn modes_agree_on_translation_rate() {
        let state = IndexMap::from([
            ("G".to_string(), 1.0),
            ("T".to_string(), 10.0),
            ("R".to_string(), 100.0),
        ]);
        let rate = |stochastic: bool| {
            let config = ProcessConfigBuilder::default()
                .source(gene_expression().unwrap())
                .stochastic(stochastic)
                .volume(Some(10.0))
                .seed(Some(2))
                .build()
                .unwrap();
            let mut process = SimulationProcess::new(config).unwrap();
            process.next_update(0.0, &state).unwrap().rates["r1"]
        };
        // k_tl * T * (R / V) / (K + R / V) = 0.1 * 10 * 10 / 20
        assert!((rate(false) - 0.5).abs() < 1e-12);
        assert!((rate(true) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_state_species() {
        let mut process = process(false);
        let state = IndexMap::from([("X".to_string(), 1.0)]);
        assert!(matches!(
            process.next_update(1.0, &state),
            Err(ProcessError::Simulation(SimulationError::UnknownSpecies(_)))
        ));
    }
}
