//! Several processes run side by side, with species changes of one process fed into
//! the state of another
//!
//! Every process keeps its own state. After each shared step, a process's own changes
//! are applied to its state, and every [`Connection`] maps the changes of its source
//! process onto species of its target process.
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::experiment::{starting_state, ExperimentError};
use crate::process::{ProcessError, SimulationProcess};
use crate::simulate::TimeSeries;

/// Function turning species changes of a source process into changes of target species
pub type SpeciesMap = Box<dyn Fn(&IndexMap<String, f64>) -> IndexMap<String, f64>>;

/// One way coupling from the changes of `source` into the state of `target`
pub struct Connection {
    pub source: String,
    pub target: String,
    map: SpeciesMap,
}

impl Connection {
    pub fn new<F>(source: &str, target: &str, map: F) -> Self
    where
        F: Fn(&IndexMap<String, f64>) -> IndexMap<String, f64> + 'static,
    {
        Connection {
            source: source.to_string(),
            target: target.to_string(),
            map: Box::new(map),
        }
    }

    /// Connection passing the change of each `(source species, target species)` pair
    /// through unchanged
    ///
    /// Changes of several source species mapped onto one target species are summed.
    ///
    /// # Examples
    /// ```rust
    /// use crnsim_core::connector::Connection;
    /// let transcripts = Connection::from_pairs("producer", "consumer", &[("T", "mRNA")]);
    /// ```
    pub fn from_pairs(source: &str, target: &str, pairs: &[(&str, &str)]) -> Self {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        Connection::new(source, target, move |deltas| {
            let mut mapped = IndexMap::new();
            for (from, to) in &pairs {
                if let Some(delta) = deltas.get(from) {
                    *mapped.entry(to.clone()).or_insert(0.0) += delta;
                }
            }
            mapped
        })
    }

    /// Apply the map to the changes of the source process
    pub fn apply(&self, deltas: &IndexMap<String, f64>) -> IndexMap<String, f64> {
        (self.map)(deltas)
    }
}

/// Named processes and the connections between them
#[derive(Default)]
pub struct Connector {
    processes: IndexMap<String, SimulationProcess>,
    connections: Vec<Connection>,
}

impl Connector {
    pub fn new() -> Self {
        Connector::default()
    }

    pub fn add_process(
        &mut self,
        name: &str,
        process: SimulationProcess,
    ) -> Result<(), ConnectorError> {
        if self.processes.contains_key(name) {
            return Err(ConnectorError::DuplicateProcess(name.to_string()));
        }
        self.processes.insert(name.to_string(), process);
        Ok(())
    }

    /// Add a connection between two processes that were already added
    pub fn add_connection(&mut self, connection: Connection) -> Result<(), ConnectorError> {
        for name in [&connection.source, &connection.target] {
            if !self.processes.contains_key(name) {
                return Err(ConnectorError::UnknownProcess(name.clone()));
            }
        }
        self.connections.push(connection);
        Ok(())
    }

    pub fn process(&self, name: &str) -> Option<&SimulationProcess> {
        self.processes.get(name)
    }

    pub fn process_names(&self) -> Vec<String> {
        self.processes.keys().cloned().collect()
    }

    /// Initial state of every process, keyed by process name
    pub fn initial_state(&self) -> IndexMap<String, IndexMap<String, f64>> {
        self.processes
            .iter()
            .map(|(name, process)| (name.clone(), process.initial_state()))
            .collect()
    }

    /// Step shared by all processes, they must agree on it
    fn time_step(&self) -> Result<f64, ConnectorError> {
        let mut steps = self.processes.values().map(|p| p.time_step());
        let first = steps.next().ok_or(ConnectorError::NoProcesses)?;
        match steps.find(|step| *step != first) {
            Some(other) => Err(ConnectorError::MismatchedTimeStep(first, other)),
            None => Ok(first),
        }
    }
}

/// Settings of an experiment over connected processes
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectedSettings {
    /// Simulated time to run for
    pub total_time: f64,
    /// Initial values replacing those of the models, keyed by process name
    pub initial_state: IndexMap<String, IndexMap<String, f64>>,
}

impl ConnectedSettings {
    pub fn new(total_time: f64) -> Self {
        ConnectedSettings {
            total_time,
            initial_state: IndexMap::new(),
        }
    }

    pub fn with_initial_state(mut self, process: &str, initial_state: IndexMap<String, f64>) -> Self {
        self.initial_state.insert(process.to_string(), initial_state);
        self
    }
}

/// Run every process of `connector` for `settings.total_time`, one time series per process
///
/// All processes advance from the states at the start of a step, then their own changes
/// and the mapped changes of their connections are added. Values a connection would push
/// below zero are clamped to zero. Records are taken at time zero and after every step,
/// the final step shortened to end on `total_time`.
pub fn run_connected_experiment(
    connector: &mut Connector,
    settings: &ConnectedSettings,
) -> Result<IndexMap<String, TimeSeries>, ConnectorError> {
    let total_time = settings.total_time;
    if !(total_time.is_finite() && total_time > 0.0) {
        return Err(ExperimentError::InvalidTotalTime(total_time).into());
    }
    let time_step = connector.time_step()?;
    if let Some(name) = settings
        .initial_state
        .keys()
        .find(|name| !connector.processes.contains_key(*name))
    {
        return Err(ConnectorError::UnknownProcess(name.clone()));
    }

    let no_overrides = IndexMap::new();
    let mut states = IndexMap::with_capacity(connector.processes.len());
    let mut records = IndexMap::with_capacity(connector.processes.len());
    for (name, process) in &connector.processes {
        let overrides = settings.initial_state.get(name).unwrap_or(&no_overrides);
        let state = starting_state(process, overrides)?;
        let mut series = TimeSeries::new(&process.species_names());
        series.push(0.0, &state);
        states.insert(name.clone(), state);
        records.insert(name.clone(), series);
    }
    info!(
        total_time,
        time_step,
        processes = connector.processes.len(),
        connections = connector.connections.len(),
        "starting connected experiment"
    );

    let mut step = 0usize;
    let mut t = 0.0;
    while t < total_time {
        step += 1;
        let next = (step as f64 * time_step).min(total_time);
        let mut deltas = IndexMap::with_capacity(connector.processes.len());
        for (name, process) in connector.processes.iter_mut() {
            let state = states
                .get(name)
                .ok_or_else(|| ConnectorError::UnknownProcess(name.clone()))?;
            let update = process
                .next_update(next - t, state)
                .map_err(|source| ConnectorError::Process {
                    process: name.clone(),
                    source,
                })?;
            deltas.insert(name.clone(), update.delta_species);
        }

        for (name, delta) in &deltas {
            if let Some(state) = states.get_mut(name) {
                add_changes(state, delta);
            }
        }
        for connection in &connector.connections {
            let mapped = match deltas.get(&connection.source) {
                Some(delta) => connection.apply(delta),
                None => continue,
            };
            let target = states
                .get_mut(&connection.target)
                .ok_or_else(|| ConnectorError::UnknownProcess(connection.target.clone()))?;
            if let Some(id) = mapped.keys().find(|id| !target.contains_key(*id)) {
                return Err(ConnectorError::UnknownSpecies {
                    species: id.clone(),
                    process: connection.target.clone(),
                });
            }
            add_changes(target, &mapped);
        }

        t = next;
        for (name, state) in states.iter_mut() {
            let clamped = clamp_negative(state);
            if clamped > 0 {
                warn!(process = %name, clamped, t, "connected changes drove species below zero");
            }
            if let Some(series) = records.get_mut(name) {
                series.push(t, state);
            }
        }
        debug!(t, "recorded connected state");
    }
    info!(steps = step, "finished connected experiment");
    Ok(records)
}

fn add_changes(state: &mut IndexMap<String, f64>, changes: &IndexMap<String, f64>) {
    for (id, change) in changes {
        if let Some(value) = state.get_mut(id) {
            *value += change;
        }
    }
}

fn clamp_negative(state: &mut IndexMap<String, f64>) -> usize {
    let mut clamped = 0;
    for value in state.values_mut() {
        if *value < 0.0 {
            *value = 0.0;
            clamped += 1;
        }
    }
    clamped
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("No process named {0}")]
    UnknownProcess(String),
    #[error("A process named {0} was already added")]
    DuplicateProcess(String),
    #[error("Connected experiment needs at least one process")]
    NoProcesses,
    #[error("Connected processes must share a time step, got {0} and {1}")]
    MismatchedTimeStep(f64, f64),
    #[error("Connection maps onto species {species}, which process {process} does not have")]
    UnknownSpecies { species: String, process: String },
    #[error("Update of process {process} failed")]
    Process {
        process: String,
        #[source]
        source: ProcessError,
    },
    #[error("Invalid experiment")]
    Experiment(#[from] ExperimentError),
}

#[cfg(test)]
mod connector_tests {
    use super::*;
    use crate::library::{gene_expression, gene_expression_initial_state};
    use crate::network::model::{Model, ReactionTuple};
    use crate::process::ProcessConfigBuilder;

    /// Transcripts T are translated into Q without being used up
    fn reporter() -> Model {
        Model::from_tuples(
            &["T", "Q"],
            vec![ReactionTuple::new(&["T"], &["T", "Q"], "massaction", &[("k", "0.5")])],
            IndexMap::new(),
            IndexMap::new(),
        )
        .unwrap()
    }

    fn process(model: Model, time_step: f64) -> SimulationProcess {
        let config = ProcessConfigBuilder::default()
            .source(model)
            .time_step(time_step)
            .build()
            .unwrap();
        SimulationProcess::new(config).unwrap()
    }

    fn connected() -> Connector {
        let mut connector = Connector::new();
        connector
            .add_process("expression", process(gene_expression().unwrap(), 1.0))
            .unwrap();
        connector
            .add_process("reporter", process(reporter(), 1.0))
            .unwrap();
        connector
    }

    #[test]
    fn transcripts_drive_reporter() {
        let mut connector = connected();
        connector
            .add_connection(Connection::from_pairs("expression", "reporter", &[("T", "T")]))
            .unwrap();
        let settings = ConnectedSettings::new(20.0)
            .with_initial_state("expression", gene_expression_initial_state());
        let records = run_connected_experiment(&mut connector, &settings).unwrap();

        let produced = records["expression"].get("T").unwrap();
        let received = records["reporter"].get("T").unwrap();
        assert_eq!(produced.len(), 21);
        // The reporter never changes T itself, so it follows the expression model exactly
        for (p, r) in produced.iter().zip(received) {
            assert!((p - r).abs() < 1e-12);
        }
        assert!(received[20] > 0.5);
        assert!(*records["reporter"].get("Q").unwrap().last().unwrap() > 0.0);
    }

    #[test]
    fn unconnected_reporter_stays_idle() {
        let mut connector = connected();
        let settings = ConnectedSettings::new(5.0);
        let records = run_connected_experiment(&mut connector, &settings).unwrap();
        assert!(records["reporter"].get("Q").unwrap().iter().all(|q| *q == 0.0));
        assert!(records["expression"].get("T").unwrap()[5] > 0.0);
    }

    #[test]
    fn custom_map() {
        let mut connector = connected();
        connector
            .add_connection(Connection::new("expression", "reporter", |deltas| {
                IndexMap::from([("Q".to_string(), 2.0 * deltas["P"])])
            }))
            .unwrap();
        let settings = ConnectedSettings::new(3.0).with_initial_state(
            "expression",
            IndexMap::from([("T".to_string(), 10.0)]),
        );
        let records = run_connected_experiment(&mut connector, &settings).unwrap();
        let protein = records["expression"].get("P").unwrap();
        let reporter = records["reporter"].get("Q").unwrap();
        for (p, q) in protein.iter().zip(reporter) {
            assert!((2.0 * p - q).abs() < 1e-9);
        }
    }

    #[test]
    fn unknown_connection_process() {
        let mut connector = connected();
        assert!(matches!(
            connector.add_connection(Connection::from_pairs("expression", "missing", &[])),
            Err(ConnectorError::UnknownProcess(_))
        ));
        assert!(matches!(
            connector.add_process("reporter", process(reporter(), 1.0)),
            Err(ConnectorError::DuplicateProcess(_))
        ));
    }

    #[test]
    fn unknown_target_species() {
        let mut connector = connected();
        connector
            .add_connection(Connection::from_pairs("expression", "reporter", &[("P", "P")]))
            .unwrap();
        match run_connected_experiment(&mut connector, &ConnectedSettings::new(1.0)) {
            Err(ConnectorError::UnknownSpecies { species, process }) => {
                assert_eq!(species, "P");
                assert_eq!(process, "reporter");
            }
            other => panic!("Expected an unknown species error, got {:?}", other.err()),
        }
    }

    #[test]
    fn mismatched_time_steps() {
        let mut connector = Connector::new();
        connector.add_process("a", process(reporter(), 1.0)).unwrap();
        connector.add_process("b", process(reporter(), 2.0)).unwrap();
        assert!(matches!(
            run_connected_experiment(&mut connector, &ConnectedSettings::new(4.0)),
            Err(ConnectorError::MismatchedTimeStep(_, _))
        ));
    }
}
