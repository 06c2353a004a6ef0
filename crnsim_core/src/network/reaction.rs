//! This module provides a struct for representing reactions
use derive_builder::Builder;
use indexmap::IndexMap;

use crate::network::rate_law::RateLaw;

/// Represents a reaction in the reaction network
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct Reaction {
    /// Used to identify the reaction
    pub id: String,
    /// Species consumed by the reaction, with their stoichiometry
    #[builder(default = "IndexMap::new()")]
    pub reactants: IndexMap<String, f64>,
    /// Species produced by the reaction, with their stoichiometry
    #[builder(default = "IndexMap::new()")]
    pub products: IndexMap<String, f64>,
    /// Law determining the reaction rate
    pub rate_law: RateLaw,
    /// Human-readable reaction name
    #[builder(default = "None")]
    pub name: Option<String>,
}

impl Reaction {
    /// Create a reaction from lists of reactant and product names
    ///
    /// A species listed more than once has its stoichiometry increased for every repeat,
    /// so `["A", "A"]` means two molecules of A.
    ///
    /// # Examples
    /// ```rust
    /// use crnsim_core::network::reaction::Reaction;
    /// use crnsim_core::network::rate_law::RateLaw;
    /// let transcription = Reaction::from_lists("r0", &["G"], &["G", "T"], RateLaw::mass_action("k_tx"));
    /// assert_eq!(transcription.net_stoichiometry().get("T"), Some(&1.0));
    /// ```
    pub fn from_lists<S: AsRef<str>>(
        id: &str,
        reactants: &[S],
        products: &[S],
        rate_law: RateLaw,
    ) -> Reaction {
        Reaction {
            id: id.to_string(),
            reactants: count_species(reactants),
            products: count_species(products),
            rate_law,
            name: None,
        }
    }

    /// Net change of every participating species when the reaction fires once
    ///
    /// Species whose net change is zero (e.g. catalysts listed on both sides) are kept
    /// with a zero entry.
    pub fn net_stoichiometry(&self) -> IndexMap<String, f64> {
        let mut net: IndexMap<String, f64> = IndexMap::new();
        for (species, stoich) in &self.reactants {
            *net.entry(species.clone()).or_insert(0.0) -= stoich;
        }
        for (species, stoich) in &self.products {
            *net.entry(species.clone()).or_insert(0.0) += stoich;
        }
        net
    }

    /// Every species the reaction touches, reactants first, then products, then the
    /// species read by the rate law
    pub fn species_refs(&self) -> Vec<String> {
        let mut refs: Vec<String> = Vec::new();
        let candidates = self
            .reactants
            .keys()
            .chain(self.products.keys())
            .cloned()
            .chain(self.rate_law.species_refs());
        for species in candidates {
            if !refs.contains(&species) {
                refs.push(species);
            }
        }
        refs
    }

    /// Species read by the rate law that are not reactants (SBML modifiers)
    pub fn modifiers(&self) -> Vec<String> {
        self.rate_law
            .species_refs()
            .into_iter()
            .filter(|s| !self.reactants.contains_key(s))
            .collect()
    }

    /// Sum of the reactant stoichiometries
    pub fn order(&self) -> f64 {
        self.reactants.values().sum()
    }
}

fn count_species<S: AsRef<str>>(names: &[S]) -> IndexMap<String, f64> {
    let mut counts = IndexMap::new();
    for name in names {
        *counts.entry(name.as_ref().to_string()).or_insert(0.0) += 1.0;
    }
    counts
}

#[cfg(test)]
mod reaction_tests {
    use super::*;

    #[test]
    fn repeated_species() {
        let dimerization =
            Reaction::from_lists("dimer", &["A", "A"], &["A2"], RateLaw::mass_action(0.1));
        assert_eq!(dimerization.reactants.get("A"), Some(&2.0));
        assert_eq!(dimerization.order(), 2.0);
        let net = dimerization.net_stoichiometry();
        assert_eq!(net.get("A"), Some(&-2.0));
        assert_eq!(net.get("A2"), Some(&1.0));
    }

    #[test]
    fn catalyst_net_zero() {
        let translation =
            Reaction::from_lists("r1", &["T"], &["T", "P"], RateLaw::mass_action("k_tl"));
        let net = translation.net_stoichiometry();
        assert_eq!(net.get("T"), Some(&0.0));
        assert_eq!(net.get("P"), Some(&1.0));
    }

    #[test]
    fn builder_defaults() {
        let degradation = ReactionBuilder::default()
            .id("deg".to_string())
            .reactants(IndexMap::from([("P".to_string(), 1.0)]))
            .rate_law(RateLaw::mass_action("delta"))
            .build()
            .unwrap();
        assert!(degradation.products.is_empty());
        assert!(degradation.name.is_none());
        assert_eq!(degradation.species_refs(), vec!["P"]);
    }

    #[test]
    fn modifiers() {
        let params: IndexMap<String, String> = [("k", "k_tl"), ("d", "T"), ("s1", "R"), ("K", "K")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let law = RateLaw::from_parts("proportionalhillpositive", &params).unwrap();
        let translation = Reaction::from_lists("r1", &["T"], &["T", "P"], law);
        assert_eq!(translation.modifiers(), vec!["R"]);
        assert_eq!(translation.species_refs(), vec!["T", "P", "R"]);
    }
}
