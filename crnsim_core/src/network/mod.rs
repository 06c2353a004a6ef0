//! Module providing the Model struct for representing a chemical reaction network.

pub mod expression;
pub mod model;
pub mod rate_law;
pub mod reaction;
pub mod species;
