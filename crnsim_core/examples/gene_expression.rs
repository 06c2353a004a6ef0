//! Simulate the sample gene expression network deterministically and stochastically
//!
//! Run with `cargo run --example gene_expression -- <output directory>`; files are
//! written to the current directory when no directory is given.
use std::error::Error;
use std::path::PathBuf;

use crnsim_core::experiment::{run_experiment, ExperimentSettings};
use crnsim_core::library::{gene_expression, gene_expression_initial_state};
use crnsim_core::process::{ProcessConfigBuilder, SimulationProcess};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)?;

    let model = gene_expression()?;
    let settings =
        ExperimentSettings::new(1000.0).with_initial_state(gene_expression_initial_state());

    // Deterministic run on the in-memory model
    let mut deterministic = SimulationProcess::from_model(model.clone())?;
    let series = run_experiment(&mut deterministic, &settings)?;
    series.write_csv(out_dir.join("deterministic.csv"))?;

    // Stochastic run on the same model after a trip through SBML
    let sbml_path = out_dir.join("gene_expression.xml");
    model.write_sbml(&sbml_path)?;
    let config = ProcessConfigBuilder::default()
        .source(sbml_path)
        .stochastic(true)
        .seed(Some(2021))
        .build()?;
    let mut stochastic = SimulationProcess::new(config)?;
    let stochastic_series = run_experiment(&mut stochastic, &settings)?;
    stochastic_series.write_csv(out_dir.join("stochastic.csv"))?;

    if let (Some(det), Some(sto)) = (series.final_state(), stochastic_series.final_state()) {
        for species in ["T", "P"] {
            info!(species, deterministic = det[species], stochastic = sto[species], "final value");
        }
    }

    #[cfg(feature = "plot")]
    {
        use crnsim_core::output::{plot_time_series, PlotConfig};
        let config = PlotConfig {
            title: "Gene expression".to_string(),
            species: Some(vec!["T".to_string(), "P".to_string()]),
            ..PlotConfig::default()
        };
        plot_time_series(&series, out_dir.join("deterministic.svg"), &config)?;
        plot_time_series(&stochastic_series, out_dir.join("stochastic.svg"), &config)?;
    }
    Ok(())
}
