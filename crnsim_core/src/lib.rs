//! Core rust implementation of crnsim, a crate for simulating chemical reaction networks.
//!
//! The usual workflow is to define a [`network::model::Model`] (in memory, or read from
//! SBML or JSON), wrap it in a [`process::SimulationProcess`], run it with
//! [`experiment::run_experiment`] and export the resulting [`simulate::TimeSeries`]
//! through [`output`]. Several processes exchanging species changes are run together
//! with [`connector::run_connected_experiment`].

pub mod configuration;
pub mod connector;
pub mod experiment;
pub mod io;
pub mod library;
pub mod network;
pub mod output;
pub mod process;
pub mod simulate;
