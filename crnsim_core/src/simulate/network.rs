//! Index based form of a model used by the simulators
use indexmap::IndexMap;

use crate::network::expression::BoundExpr;
use crate::network::model::Model;
use crate::network::rate_law::{Hill, RateLaw};
use crate::simulate::SimulationError;

/// Rate law with every parameter resolved and every species replaced by its state index
#[derive(Clone, Debug, PartialEq)]
enum CompiledLaw {
    MassAction {
        k: f64,
    },
    Hill {
        k: f64,
        s1: usize,
        kd: f64,
        n: f64,
        /// Species the rate is proportional to
        d: Option<usize>,
        /// Activation when true, repression otherwise
        positive: bool,
    },
    General(BoundExpr),
}

#[derive(Clone, Debug, PartialEq)]
struct CompiledReaction {
    id: String,
    law: CompiledLaw,
    /// (species index, stoichiometry) of the reactants
    reactants: Vec<(usize, f64)>,
    /// (species index, net change) for every species whose count changes
    changes: Vec<(usize, f64)>,
    /// Sum of reactant stoichiometries
    order: f64,
}

/// A validated model in the form consumed by the simulators
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledNetwork {
    /// Map of species ids to their position in state vectors
    pub species: IndexMap<String, usize>,
    reactions: Vec<CompiledReaction>,
    /// Reaction volume, scales rates of higher order reactions
    pub volume: f64,
}

impl CompiledNetwork {
    /// Compile a model, validating it on the way
    pub fn compile(model: &Model, volume: f64) -> Result<Self, SimulationError> {
        if !(volume.is_finite() && volume > 0.0) {
            return Err(SimulationError::InvalidVolume(volume));
        }
        model.validate()?;
        let species: IndexMap<String, usize> = model
            .species
            .keys()
            .enumerate()
            .map(|(index, id)| (id.clone(), index))
            .collect();
        let index_of = |id: &str| -> Result<usize, SimulationError> {
            species
                .get(id)
                .copied()
                .ok_or_else(|| SimulationError::UnknownSpecies(id.to_string()))
        };

        // The compartment id stands for the reaction volume unless a parameter shadows it
        let mut parameters = model.parameters.clone();
        parameters
            .entry(model.compartment.id.clone())
            .or_insert(volume);

        let mut reactions = Vec::with_capacity(model.reactions.len());
        for reaction in model.reactions.values() {
            let hill = |hill: &Hill,
                        d: Option<&String>,
                        positive: bool|
             -> Result<CompiledLaw, SimulationError> {
                Ok(CompiledLaw::Hill {
                    k: hill.k.resolve(&parameters)?,
                    s1: index_of(&hill.s1)?,
                    kd: hill.kd.resolve(&parameters)?,
                    n: hill.n.resolve(&parameters)?,
                    d: d.map(|d| index_of(d)).transpose()?,
                    positive,
                })
            };
            let law = match &reaction.rate_law {
                RateLaw::MassAction { k } => CompiledLaw::MassAction {
                    k: k.resolve(&parameters)?,
                },
                RateLaw::HillPositive(h) => hill(h, None, true)?,
                RateLaw::HillNegative(h) => hill(h, None, false)?,
                RateLaw::ProportionalHillPositive { hill: h, d } => hill(h, Some(d), true)?,
                RateLaw::ProportionalHillNegative { hill: h, d } => hill(h, Some(d), false)?,
                RateLaw::General { rate } => {
                    CompiledLaw::General(rate.bind(&species, &parameters)?)
                }
            };
            let reactants = reaction
                .reactants
                .iter()
                .map(|(id, stoich)| index_of(id).map(|index| (index, *stoich)))
                .collect::<Result<Vec<_>, SimulationError>>()?;
            let changes = reaction
                .net_stoichiometry()
                .into_iter()
                .filter(|(_, change)| *change != 0.0)
                .map(|(id, change)| index_of(&id).map(|index| (index, change)))
                .collect::<Result<Vec<_>, SimulationError>>()?;
            reactions.push(CompiledReaction {
                id: reaction.id.clone(),
                law,
                reactants,
                changes,
                order: reaction.order(),
            });
        }

        Ok(CompiledNetwork {
            species,
            reactions,
            volume,
        })
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    pub fn n_reactions(&self) -> usize {
        self.reactions.len()
    }

    pub fn reaction_ids(&self) -> Vec<String> {
        self.reactions.iter().map(|r| r.id.clone()).collect()
    }

    /// Deterministic rate of every reaction at concentrations `x`
    pub fn rates(&self, x: &[f64], out: &mut [f64]) {
        for (rate, reaction) in out.iter_mut().zip(&self.reactions) {
            *rate = self.rate(reaction, x, false);
        }
    }

    /// Stochastic propensity of every reaction at molecule counts `x`
    ///
    /// A reaction can not fire without enough molecules of each reactant, whatever its
    /// rate law says. Negative values from general rate expressions are reported as zero.
    pub fn propensities(&self, x: &[f64], out: &mut [f64]) {
        for (propensity, reaction) in out.iter_mut().zip(&self.reactions) {
            let available = reaction
                .reactants
                .iter()
                .all(|(index, stoich)| x[*index] >= *stoich);
            *propensity = if available {
                self.rate(reaction, x, true).max(0.0)
            } else {
                0.0
            };
        }
    }

    /// Time derivative of every species at concentrations `x`
    pub fn derivatives(&self, x: &[f64], dx: &mut [f64]) {
        dx.iter_mut().for_each(|v| *v = 0.0);
        for reaction in &self.reactions {
            let rate = self.rate(reaction, x, false);
            for (index, change) in &reaction.changes {
                dx[*index] += change * rate;
            }
        }
    }

    /// Apply a single firing of reaction `reaction` to the counts `x`
    pub fn fire(&self, reaction: usize, x: &mut [f64]) {
        for (index, change) in &self.reactions[reaction].changes {
            x[*index] += change;
        }
    }

    /// Convert a map of species values into a state vector in network order
    ///
    /// Species missing from `state` start at zero, unknown species are an error.
    pub fn state_vector(&self, state: &IndexMap<String, f64>) -> Result<Vec<f64>, SimulationError> {
        let mut x = vec![0.0; self.n_species()];
        for (id, value) in state {
            match self.species.get(id) {
                Some(index) => x[*index] = *value,
                None => return Err(SimulationError::UnknownSpecies(id.clone())),
            }
        }
        Ok(x)
    }

    /// Convert a state vector back into a map of species values
    pub fn state_map(&self, x: &[f64]) -> IndexMap<String, f64> {
        self.species
            .iter()
            .map(|(id, index)| (id.clone(), x[*index]))
            .collect()
    }

    fn rate(&self, reaction: &CompiledReaction, x: &[f64], stochastic: bool) -> f64 {
        match &reaction.law {
            CompiledLaw::MassAction { k } => {
                let mut rate = *k;
                for (index, stoich) in &reaction.reactants {
                    rate *= if stochastic {
                        falling_factorial(x[*index], *stoich)
                    } else {
                        x[*index].powf(*stoich)
                    };
                }
                if reaction.order > 1.0 {
                    rate /= self.volume.powf(reaction.order - 1.0);
                }
                rate
            }
            CompiledLaw::Hill {
                k,
                s1,
                kd,
                n,
                d,
                positive,
            } => {
                // Saturation works on concentrations, as do mass action constants
                let s = (x[*s1] / self.volume).max(0.0);
                let saturation = if *positive {
                    let s_n = s.powf(*n);
                    s_n / (kd.powf(*n) + s_n)
                } else {
                    1.0 / (1.0 + (s / kd).powf(*n))
                };
                let proportional = match d {
                    Some(index) => x[*index],
                    None => 1.0,
                };
                k * proportional * saturation
            }
            CompiledLaw::General(expr) => expr.eval(x, 1.0),
        }
    }
}

/// x (x - 1) ... (x - m + 1), the number of ordered ways to pick m molecules out of x
fn falling_factorial(x: f64, m: f64) -> f64 {
    if m.fract() != 0.0 {
        return x.max(0.0).powf(m);
    }
    let mut value = 1.0;
    let mut i = 0.0;
    while i < m {
        let factor = x - i;
        if factor <= 0.0 {
            return 0.0;
        }
        value *= factor;
        i += 1.0;
    }
    value
}
