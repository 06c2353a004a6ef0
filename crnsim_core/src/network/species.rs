//! This module provides the species struct representing a chemical species

use derive_builder::Builder;

/// Represents a species of the reaction network
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct Species {
    /// Used to identify the species (must be unique)
    pub id: String,
    /// Human Readable name of the species
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Which compartment the species is in
    #[builder(default = "None")]
    pub compartment: Option<String>,
    /// Initial concentration (or count in stochastic simulations)
    #[builder(default = "0.0")]
    pub initial: f64,
}

impl Species {
    /// Create a new species with only an id, starting at zero
    pub fn new(id: &str) -> Species {
        Species {
            id: id.to_string(),
            name: None,
            compartment: None,
            initial: 0.0,
        }
    }
}
