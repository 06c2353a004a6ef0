use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;

use crnsim_core::experiment::{run_experiment, ExperimentSettings};
use crnsim_core::io::sbml::species_ids_from_sbml;
use crnsim_core::process::{ProcessConfigBuilder, SimulationProcess};
use indexmap::IndexMap;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

/// Convert an error and its chain of sources into a Python ValueError
fn to_py_err<E: Error>(err: E) -> PyErr {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    PyValueError::new_err(message)
}

/// Reaction network loaded from SBML, wrapped as a simulation process
#[pyclass(unsendable)]
struct Simulation {
    inner: SimulationProcess,
}

#[pymethods]
impl Simulation {
    #[new]
    #[pyo3(signature = (sbml_file, stochastic=false, time_step=1.0, internal_dt=0.01, volume=None, seed=None))]
    fn new(
        sbml_file: PathBuf,
        stochastic: bool,
        time_step: f64,
        internal_dt: f64,
        volume: Option<f64>,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let config = ProcessConfigBuilder::default()
            .source(sbml_file)
            .stochastic(stochastic)
            .time_step(time_step)
            .internal_dt(internal_dt)
            .volume(volume)
            .seed(seed)
            .build()
            .map_err(to_py_err)?;
        let inner = SimulationProcess::new(config).map_err(to_py_err)?;
        Ok(Simulation { inner })
    }

    fn species_names(&self) -> Vec<String> {
        self.inner.species_names()
    }

    fn initial_state(&self) -> HashMap<String, f64> {
        self.inner.initial_state().into_iter().collect()
    }

    /// Run for `total_time`, returning the record times and a dict of species trajectories
    #[pyo3(signature = (total_time, initial_state=None))]
    fn run<'py>(
        &mut self,
        py: Python<'py>,
        total_time: f64,
        initial_state: Option<HashMap<String, f64>>,
    ) -> PyResult<(Vec<f64>, Bound<'py, PyDict>)> {
        let initial_state: IndexMap<String, f64> =
            initial_state.unwrap_or_default().into_iter().collect();
        let settings = ExperimentSettings::new(total_time).with_initial_state(initial_state);
        let series = run_experiment(&mut self.inner, &settings).map_err(to_py_err)?;
        let species = PyDict::new(py);
        for (id, values) in series.species {
            species.set_item(id, values)?;
        }
        Ok((series.time, species))
    }
}

/// Species ids of an SBML file, in document order
#[pyfunction]
fn sbml_species(sbml_file: PathBuf) -> PyResult<Vec<String>> {
    species_ids_from_sbml(sbml_file).map_err(to_py_err)
}

/// A Python module implemented in Rust. The name of this function must match
/// the `lib.name` setting in the `Cargo.toml`, else Python will not be able to
/// import the module.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(sbml_species, m)?)?;
    m.add_class::<Simulation>()?;
    Ok(())
}
