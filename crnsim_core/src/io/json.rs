//! Module providing JSON IO for reaction network Models
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::model::{Compartment, Model, ModelError};
use crate::network::rate_law::{RateLaw, RateLawError};
use crate::network::reaction::{Reaction, ReactionBuilder, ReactionBuilderError};
use crate::network::species::Species;

// region JSON Model
/// Represents a JSON serialized model, used for reading and writing models in json format
#[derive(Serialize, Deserialize)]
struct JsonModel {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    compartment: Option<JsonCompartment>,
    species: Vec<JsonSpecies>,
    reactions: Vec<JsonReaction>,
    #[serde(default)]
    parameters: IndexMap<String, f64>,
}

#[derive(Serialize, Deserialize)]
struct JsonCompartment {
    id: String,
    #[serde(default = "unit_size")]
    size: f64,
}

fn unit_size() -> f64 {
    1.0
}

#[derive(Serialize, Deserialize)]
struct JsonSpecies {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compartment: Option<String>,
    #[serde(default)]
    initial: f64,
}

#[derive(Serialize, Deserialize)]
struct JsonReaction {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    reactants: IndexMap<String, f64>,
    #[serde(default)]
    products: IndexMap<String, f64>,
    /// Rate law kind tag, e.g. "massaction"
    kind: String,
    /// Rate law parameter mapping
    parameters: IndexMap<String, String>,
}
// endregion JSON Model

// region Conversions
impl From<JsonSpecies> for Species {
    fn from(s: JsonSpecies) -> Self {
        Species {
            id: s.id,
            name: s.name,
            compartment: s.compartment,
            initial: s.initial,
        }
    }
}

impl From<&Species> for JsonSpecies {
    fn from(s: &Species) -> Self {
        JsonSpecies {
            id: s.id.clone(),
            name: s.name.clone(),
            compartment: s.compartment.clone(),
            initial: s.initial,
        }
    }
}

impl From<&Reaction> for JsonReaction {
    fn from(r: &Reaction) -> Self {
        JsonReaction {
            id: r.id.clone(),
            name: r.name.clone(),
            reactants: r.reactants.clone(),
            products: r.products.clone(),
            kind: r.rate_law.kind().to_string(),
            parameters: r.rate_law.parameters(),
        }
    }
}

impl Model {
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Model, JsonError> {
        let model_str = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) => return Err(JsonError::UnableToRead(format!("{:?}", err))),
        };
        Model::from_json_str(&model_str)
    }

    pub fn from_json_str(json: &str) -> Result<Model, JsonError> {
        let json_model = match serde_json::from_str::<JsonModel>(json) {
            Ok(model) => model,
            Err(err) => return Err(JsonError::UnableToParse(format!("{:?}", err))),
        };
        Model::from_json(json_model)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), JsonError> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String, JsonError> {
        Ok(serde_json::to_string_pretty(&self.to_json())?)
    }

    fn from_json(json_model: JsonModel) -> Result<Self, JsonError> {
        let mut model = Model::new_empty();
        model.id = json_model.id;
        if let Some(compartment) = json_model.compartment {
            model.compartment = Compartment {
                id: compartment.id,
                size: compartment.size,
            };
        }
        json_model.species.into_iter().for_each(|s| {
            model.add_species(Species::from(s));
        });
        for rxn in json_model.reactions {
            let rate_law = RateLaw::from_parts(&rxn.kind, &rxn.parameters)?;
            let new_reaction = ReactionBuilder::default()
                .id(rxn.id)
                .name(rxn.name)
                .reactants(rxn.reactants)
                .products(rxn.products)
                .rate_law(rate_law)
                .build()?;
            model.add_reaction(new_reaction);
        }
        model.parameters = json_model.parameters;
        model.validate()?;
        Ok(model)
    }

    fn to_json(&self) -> JsonModel {
        JsonModel {
            id: self.id.clone(),
            compartment: Some(JsonCompartment {
                id: self.compartment.id.clone(),
                size: self.compartment.size,
            }),
            species: self.species.values().map(JsonSpecies::from).collect(),
            reactions: self.reactions.values().map(JsonReaction::from).collect(),
            parameters: self.parameters.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum JsonError {
    #[error("Unable to read file due to {0}")]
    UnableToRead(String),
    #[error("Unable to parse json due to {0}")]
    UnableToParse(String),
    #[error("Invalid rate law")]
    RateLawError(#[from] RateLawError),
    #[error("Unable to build reaction")]
    UnableToBuildReaction(#[from] ReactionBuilderError),
    #[error("Invalid model")]
    ModelError(#[from] ModelError),
    #[error("Serde json parse error")]
    SerdeJsonParseError(#[from] serde_json::Error),
    #[error("Unable to write to file")]
    UnableToWrite(#[from] std::io::Error),
}

// endregion Conversions

#[cfg(test)]
mod json_tests {
    use super::*;
    use crate::library::gene_expression;
    use crate::network::rate_law::RateLawKind;
    use std::path::PathBuf;

    #[test]
    fn json_species() {
        let data = r#"{"id":"R","name":"Ribosome","initial":100}"#;
        let species: JsonSpecies = serde_json::from_str(data).unwrap();
        let species = Species::from(species);
        assert_eq!(species.id, "R");
        assert_eq!(species.name.unwrap(), "Ribosome");
        assert!(species.compartment.is_none());
        assert_eq!(species.initial, 100.0);
    }

    #[test]
    fn json_reaction() {
        let data = r#"{
"id":"translation",
"reactants":{"T":1},
"products":{"T":1,"P":1},
"kind":"proportionalhillpositive",
"parameters":{"k":"k_tl","d":"T","s1":"R","K":"10"}
}"#;
        let reaction: JsonReaction = serde_json::from_str(data).unwrap();
        assert_eq!(reaction.id, "translation");
        assert!(reaction.name.is_none());
        assert_eq!(reaction.products.get("P"), Some(&1.0));
        let law = RateLaw::from_parts(&reaction.kind, &reaction.parameters).unwrap();
        assert_eq!(law.kind(), RateLawKind::ProportionalHillPositive);
    }

    #[test]
    fn round_trip() {
        let model = gene_expression().unwrap();
        let json = model.to_json_string().unwrap();
        assert_eq!(Model::from_json_str(&json).unwrap(), model);
    }

    #[test]
    fn json_model() {
        let data_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("test_data")
            .join("models")
            .join("birth_death.json");
        let model = Model::read_json(data_path).unwrap();
        assert_eq!(model.id.as_deref(), Some("birth_death"));
        assert_eq!(model.compartment.size, 2.0);
        assert_eq!(model.species_ids(), vec!["X"]);
        assert_eq!(model.parameters.get("k_birth"), Some(&5.0));
        assert_eq!(model.reactions.len(), 2);
        assert_eq!(model.initial_state().get("X"), Some(&3.0));
    }

    #[test]
    fn unknown_parameter() {
        let data = r#"{
"species":[{"id":"X"}],
"reactions":[{"id":"d","reactants":{"X":1},"kind":"massaction","parameters":{"k":"missing"}}]
}"#;
        assert!(matches!(
            Model::from_json_str(data),
            Err(JsonError::ModelError(ModelError::UnknownParameter { .. }))
        ));
    }

    #[test]
    fn unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Model::read_json(dir.path().join("absent.json")),
            Err(JsonError::UnableToRead(_))
        ));
    }
}
