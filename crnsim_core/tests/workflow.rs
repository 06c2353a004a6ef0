use std::collections::HashSet;

use crnsim_core::experiment::{run_experiment, ExperimentSettings};
use crnsim_core::io::sbml::species_ids_from_sbml;
use crnsim_core::library::{gene_expression, gene_expression_initial_state};
use crnsim_core::network::model::Model;
use crnsim_core::process::{ProcessConfigBuilder, SimulationProcess};
use crnsim_core::simulate::TimeSeries;

fn run(process: &mut SimulationProcess, total_time: f64) -> TimeSeries {
    let settings =
        ExperimentSettings::new(total_time).with_initial_state(gene_expression_initial_state());
    run_experiment(process, &settings).unwrap()
}

fn deterministic_process() -> SimulationProcess {
    SimulationProcess::from_model(gene_expression().unwrap()).unwrap()
}

#[test]
fn sbml_round_trip_keeps_species_and_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gene_expression.xml");
    let model = gene_expression().unwrap();
    model.write_sbml(&path).unwrap();

    let read = Model::read_sbml(&path).unwrap();
    let written: HashSet<String> = model.species_ids().into_iter().collect();
    let loaded: HashSet<String> = read.species_ids().into_iter().collect();
    assert_eq!(written, loaded);
    for (name, value) in &model.parameters {
        assert_eq!(read.parameters.get(name), Some(value));
    }
    assert_eq!(species_ids_from_sbml(&path).unwrap(), model.species_ids());
}

#[test]
fn deterministic_run_is_non_negative() {
    let mut process = deterministic_process();
    let series = run(&mut process, 1000.0);
    assert_eq!(series.len(), 1001);
    for values in series.species.values() {
        assert!(values.iter().all(|v| *v >= 0.0));
    }
    // Transcripts and proteins accumulate from nothing
    let final_state = series.final_state().unwrap();
    assert!(final_state["T"] > 0.0);
    assert!(final_state["P"] > 0.0);
}

#[test]
fn deterministic_runs_are_identical() {
    let first = run(&mut deterministic_process(), 200.0);
    let second = run(&mut deterministic_process(), 200.0);
    assert_eq!(first, second);
}

#[test]
fn stochastic_run_counts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gene_expression.xml");
    gene_expression().unwrap().write_sbml(&path).unwrap();

    let config = ProcessConfigBuilder::default()
        .source(path)
        .stochastic(true)
        .time_step(5.0)
        .build()
        .unwrap();
    let mut process = SimulationProcess::new(config).unwrap();
    let series = run(&mut process, 1000.0);
    assert_eq!(series.len(), 201);
    for values in series.species.values() {
        assert!(values.iter().all(|v| *v >= 0.0 && v.fract() == 0.0));
    }
    // Genes and ribosomes are never consumed
    assert!(series.get("G").unwrap().iter().all(|g| *g == 1.0));
    assert!(series.get("R").unwrap().iter().all(|r| *r == 100.0));
}

#[test]
fn seeded_stochastic_runs_repeat() {
    let build = || {
        let config = ProcessConfigBuilder::default()
            .source(gene_expression().unwrap())
            .stochastic(true)
            .seed(Some(99))
            .time_step(10.0)
            .build()
            .unwrap();
        SimulationProcess::new(config).unwrap()
    };
    assert_eq!(run(&mut build(), 500.0), run(&mut build(), 500.0));
}

#[test]
fn csv_export() {
    let series = run(&mut deterministic_process(), 3.0);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("series.csv");
    series.write_csv(&path).unwrap();
    let csv = std::fs::read_to_string(path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("time,G,T,P,R"));
    assert_eq!(lines.count(), 4);
}
