//! This module provides the Model struct for representing an entire reaction network
use indexmap::IndexMap;
use nalgebra::DMatrix;
use thiserror::Error;

use crate::configuration;
use crate::network::rate_law::{RateLaw, RateLawError};
use crate::network::reaction::Reaction;
use crate::network::species::Species;

/// Compartment the species of a model live in
#[derive(Clone, Debug, PartialEq)]
pub struct Compartment {
    pub id: String,
    /// Compartment volume
    pub size: f64,
}

impl Default for Compartment {
    fn default() -> Self {
        Compartment {
            id: configuration::defaults().compartment,
            size: configuration::defaults().volume,
        }
    }
}

/// One reaction of a model given as plain data: reactant names, product names, rate law
/// type and the rate law parameter mapping
#[derive(Clone, Debug, PartialEq)]
pub struct ReactionTuple {
    pub reactants: Vec<String>,
    pub products: Vec<String>,
    pub kind: String,
    pub parameters: IndexMap<String, String>,
}

impl ReactionTuple {
    /// # Examples
    /// ```rust
    /// use crnsim_core::network::model::ReactionTuple;
    /// let transcription = ReactionTuple::new(&["G"], &["G", "T"], "massaction", &[("k", "k_tx")]);
    /// ```
    pub fn new(reactants: &[&str], products: &[&str], kind: &str, parameters: &[(&str, &str)]) -> Self {
        ReactionTuple {
            reactants: reactants.iter().map(|s| s.to_string()).collect(),
            products: products.iter().map(|s| s.to_string()).collect(),
            kind: kind.to_string(),
            parameters: parameters
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Represents a Chemical Reaction Network model
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    /// Id associated with the Model
    pub id: Option<String>,
    /// The compartment holding every species
    pub compartment: Compartment,
    /// Map of species ids to Species
    pub species: IndexMap<String, Species>,
    /// Map of reaction ids to Reactions
    pub reactions: IndexMap<String, Reaction>,
    /// Map of global parameter names to values
    pub parameters: IndexMap<String, f64>,
}

impl Model {
    pub fn new_empty() -> Self {
        Model {
            id: None,
            compartment: Compartment::default(),
            species: IndexMap::new(),
            reactions: IndexMap::new(),
            parameters: IndexMap::new(),
        }
    }

    /// Build and validate a model from plain data
    ///
    /// # Parameters
    /// - `species`: ids of every species, all starting at zero
    /// - `reactions`: reaction tuples, given ids `r0`, `r1`, ... in order
    /// - `parameters`: global parameter mapping
    /// - `initial_condition`: initial values overriding the zero default
    ///
    /// # Examples
    /// ```rust
    /// use indexmap::IndexMap;
    /// use crnsim_core::network::model::{Model, ReactionTuple};
    /// let model = Model::from_tuples(
    ///     &["G", "T"],
    ///     vec![ReactionTuple::new(&["G"], &["G", "T"], "massaction", &[("k", "k_tx")])],
    ///     IndexMap::from([("k_tx".to_string(), 0.05)]),
    ///     IndexMap::from([("G".to_string(), 1.0)]),
    /// ).unwrap();
    /// assert_eq!(model.initial_state().get("G"), Some(&1.0));
    /// ```
    pub fn from_tuples(
        species: &[&str],
        reactions: Vec<ReactionTuple>,
        parameters: IndexMap<String, f64>,
        initial_condition: IndexMap<String, f64>,
    ) -> Result<Model, ModelError> {
        let mut model = Model::new_empty();
        for id in species {
            model.add_species(Species::new(id));
        }
        for (index, tuple) in reactions.into_iter().enumerate() {
            let rate_law = RateLaw::from_parts(&tuple.kind, &tuple.parameters)?;
            let reaction = Reaction::from_lists(
                &format!("r{}", index),
                &tuple.reactants,
                &tuple.products,
                rate_law,
            );
            model.add_reaction(reaction);
        }
        model.parameters = parameters;
        for (id, value) in initial_condition {
            model.set_initial_condition(&id, value)?;
        }
        model.validate()?;
        Ok(model)
    }

    /// Add a species to the model, replacing any species with the same id
    ///
    /// # Examples
    /// ```rust
    /// use crnsim_core::network::model::Model;
    /// use crnsim_core::network::species::SpeciesBuilder;
    /// let mut model = Model::new_empty();
    /// let ribosome = SpeciesBuilder::default().id("R".to_string()).initial(100.0).build().unwrap();
    /// model.add_species(ribosome);
    /// ```
    pub fn add_species(&mut self, species: Species) {
        let id = species.id.clone();
        self.species.insert(id, species);
    }

    /// Add a reaction to the model, replacing any reaction with the same id
    pub fn add_reaction(&mut self, reaction: Reaction) {
        let id = reaction.id.clone();
        self.reactions.insert(id, reaction);
    }

    pub fn set_parameter(&mut self, name: &str, value: f64) {
        self.parameters.insert(name.to_string(), value);
    }

    /// Override the initial value of an existing species
    pub fn set_initial_condition(&mut self, species: &str, value: f64) -> Result<(), ModelError> {
        match self.species.get_mut(species) {
            Some(s) => {
                s.initial = value;
                Ok(())
            }
            None => Err(ModelError::UnknownSpecies {
                species: species.to_string(),
                context: "initial condition".to_string(),
            }),
        }
    }

    pub fn species_ids(&self) -> Vec<String> {
        self.species.keys().cloned().collect()
    }

    /// Map of species ids to their initial values
    pub fn initial_state(&self) -> IndexMap<String, f64> {
        self.species
            .iter()
            .map(|(id, s)| (id.clone(), s.initial))
            .collect()
    }

    /// Net stoichiometric matrix, rows are species and columns reactions, both in model order
    pub fn stoichiometric_matrix(&self) -> DMatrix<f64> {
        let mut matrix = DMatrix::zeros(self.species.len(), self.reactions.len());
        for (col, reaction) in self.reactions.values().enumerate() {
            for (species, change) in reaction.net_stoichiometry() {
                if let Some(row) = self.species.get_index_of(&species) {
                    matrix[(row, col)] = change;
                }
            }
        }
        matrix
    }

    /// Check that every referenced species exists and every symbolic parameter resolves
    pub fn validate(&self) -> Result<(), ModelError> {
        for reaction in self.reactions.values() {
            for species in reaction.species_refs() {
                if !self.species.contains_key(&species) {
                    return Err(ModelError::UnknownSpecies {
                        species,
                        context: format!("reaction {}", reaction.id),
                    });
                }
            }
            for parameter in reaction.rate_law.parameter_refs() {
                if !self.is_known_parameter(&parameter) {
                    return Err(ModelError::UnknownParameter {
                        parameter,
                        reaction: reaction.id.clone(),
                    });
                }
            }
            if let RateLaw::General { rate } = &reaction.rate_law {
                for symbol in rate.symbols() {
                    if !self.species.contains_key(&symbol) && !self.is_known_parameter(&symbol) {
                        return Err(ModelError::UnknownSymbol {
                            symbol,
                            reaction: reaction.id.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Global parameters and the compartment id, which evaluates to the reaction volume
    fn is_known_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name) || self.compartment.id == name
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Species {species} referenced by {context} is not in the model")]
    UnknownSpecies { species: String, context: String },
    #[error("Parameter {parameter} used by reaction {reaction} is not defined")]
    UnknownParameter { parameter: String, reaction: String },
    #[error("Symbol {symbol} in the rate of reaction {reaction} is neither a species nor a parameter")]
    UnknownSymbol { symbol: String, reaction: String },
    #[error("Invalid rate law")]
    RateLawError(#[from] RateLawError),
}

#[cfg(test)]
mod model_tests {
    use super::*;
    use crate::network::species::SpeciesBuilder;

    fn birth_death() -> Model {
        Model::from_tuples(
            &["X"],
            vec![
                ReactionTuple::new(&[], &["X"], "massaction", &[("k", "k_birth")]),
                ReactionTuple::new(&["X"], &[], "massaction", &[("k", "0.1")]),
            ],
            IndexMap::from([("k_birth".to_string(), 10.0)]),
            IndexMap::from([("X".to_string(), 5.0)]),
        )
        .unwrap()
    }

    #[test]
    fn from_tuples() {
        let model = birth_death();
        assert_eq!(model.species_ids(), vec!["X"]);
        assert_eq!(model.reactions.keys().collect::<Vec<_>>(), vec!["r0", "r1"]);
        assert_eq!(model.initial_state().get("X"), Some(&5.0));
        assert_eq!(model.parameters.get("k_birth"), Some(&10.0));
    }

    #[test]
    fn stoichiometric_matrix() {
        let model = birth_death();
        let matrix = model.stoichiometric_matrix();
        assert_eq!(matrix.shape(), (1, 2));
        assert_eq!(matrix[(0, 0)], 1.0);
        assert_eq!(matrix[(0, 1)], -1.0);
    }

    #[test]
    fn unknown_species() {
        let result = Model::from_tuples(
            &["X"],
            vec![ReactionTuple::new(&["Y"], &[], "massaction", &[("k", "1")])],
            IndexMap::new(),
            IndexMap::new(),
        );
        match result {
            Err(ModelError::UnknownSpecies { species, .. }) => assert_eq!(species, "Y"),
            _ => panic!("Unknown species should be rejected"),
        }
    }

    #[test]
    fn unknown_parameter() {
        let result = Model::from_tuples(
            &["X"],
            vec![ReactionTuple::new(&["X"], &[], "massaction", &[("k", "delta")])],
            IndexMap::new(),
            IndexMap::new(),
        );
        match result {
            Err(ModelError::UnknownParameter { parameter, reaction }) => {
                assert_eq!(parameter, "delta");
                assert_eq!(reaction, "r0");
            }
            _ => panic!("Unknown parameter should be rejected"),
        }
    }

    #[test]
    fn unknown_symbol_in_general_rate() {
        let result = Model::from_tuples(
            &["X"],
            vec![ReactionTuple::new(&["X"], &[], "general", &[("rate", "k * X * Z")])],
            IndexMap::from([("k".to_string(), 1.0)]),
            IndexMap::new(),
        );
        match result {
            Err(ModelError::UnknownSymbol { symbol, .. }) => assert_eq!(symbol, "Z"),
            _ => panic!("Unknown symbol should be rejected"),
        }
    }

    #[test]
    fn unknown_initial_condition() {
        let result = Model::from_tuples(
            &["X"],
            vec![],
            IndexMap::new(),
            IndexMap::from([("Q".to_string(), 1.0)]),
        );
        assert!(matches!(result, Err(ModelError::UnknownSpecies { .. })));
    }

    #[test]
    fn add_species_replaces() {
        let mut model = Model::new_empty();
        model.add_species(Species::new("R"));
        model.add_species(
            SpeciesBuilder::default()
                .id("R".to_string())
                .initial(100.0)
                .build()
                .unwrap(),
        );
        assert_eq!(model.species.len(), 1);
        assert_eq!(model.initial_state().get("R"), Some(&100.0));
    }
}
