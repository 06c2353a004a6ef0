//! This module provides the rate laws which determine how fast a reaction fires
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

use crate::io::expr_parse::{parse_expr, ExprParseError};
use crate::network::expression::{format_number, Expr};

/// Value of a rate law parameter, either given directly or by name
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// Numeric value
    Literal(f64),
    /// Name of a global model parameter
    Symbol(String),
}

impl ParamValue {
    /// Parse a parameter value, numeric text becomes a literal and anything else a symbol
    pub fn parse(value: &str) -> ParamValue {
        let trimmed = value.trim();
        match trimmed.parse::<f64>() {
            Ok(v) => ParamValue::Literal(v),
            Err(_) => ParamValue::Symbol(trimmed.to_string()),
        }
    }

    /// Look up the numeric value of the parameter
    pub fn resolve(&self, parameters: &IndexMap<String, f64>) -> Result<f64, RateLawError> {
        match self {
            ParamValue::Literal(v) => Ok(*v),
            ParamValue::Symbol(name) => parameters
                .get(name)
                .copied()
                .ok_or_else(|| RateLawError::UnresolvedParameter(name.clone())),
        }
    }

    pub fn to_expr(&self) -> Expr {
        match self {
            ParamValue::Literal(v) => Expr::Number(*v),
            ParamValue::Symbol(name) => Expr::Symbol(name.clone()),
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Literal(v) => write!(f, "{}", format_number(*v)),
            ParamValue::Symbol(name) => write!(f, "{}", name),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Literal(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::parse(value)
    }
}

/// Tags identifying the kind of rate law
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RateLawKind {
    MassAction,
    HillPositive,
    HillNegative,
    ProportionalHillPositive,
    ProportionalHillNegative,
    General,
}

impl RateLawKind {
    pub fn tag(&self) -> &'static str {
        match self {
            RateLawKind::MassAction => "massaction",
            RateLawKind::HillPositive => "hillpositive",
            RateLawKind::HillNegative => "hillnegative",
            RateLawKind::ProportionalHillPositive => "proportionalhillpositive",
            RateLawKind::ProportionalHillNegative => "proportionalhillnegative",
            RateLawKind::General => "general",
        }
    }
}

impl Display for RateLawKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for RateLawKind {
    type Err = RateLawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "massaction" => Ok(RateLawKind::MassAction),
            "hillpositive" => Ok(RateLawKind::HillPositive),
            "hillnegative" => Ok(RateLawKind::HillNegative),
            "proportionalhillpositive" => Ok(RateLawKind::ProportionalHillPositive),
            "proportionalhillnegative" => Ok(RateLawKind::ProportionalHillNegative),
            "general" => Ok(RateLawKind::General),
            other => Err(RateLawError::UnknownKind(other.to_string())),
        }
    }
}

/// Saturating function of a single species used by the Hill family of rate laws
#[derive(Clone, Debug, PartialEq)]
pub struct Hill {
    /// Rate constant
    pub k: ParamValue,
    /// Species the rate saturates in
    pub s1: String,
    /// Half saturation constant
    pub kd: ParamValue,
    /// Hill coefficient
    pub n: ParamValue,
}

/// Represents the rate law of a reaction
#[derive(Clone, Debug, PartialEq)]
pub enum RateLaw {
    /// Rate is k times the product of the reactant quantities
    MassAction { k: ParamValue },
    /// k * s1^n / (K^n + s1^n)
    HillPositive(Hill),
    /// k / (1 + (s1/K)^n)
    HillNegative(Hill),
    /// k * d * s1^n / (K^n + s1^n)
    ProportionalHillPositive { hill: Hill, d: String },
    /// k * d / (1 + (s1/K)^n)
    ProportionalHillNegative { hill: Hill, d: String },
    /// Arbitrary expression over species and parameters
    General { rate: Expr },
}

impl RateLaw {
    pub fn mass_action<P: Into<ParamValue>>(k: P) -> RateLaw {
        RateLaw::MassAction { k: k.into() }
    }

    /// Build a rate law from its kind tag and its parameter mapping
    ///
    /// # Parameters
    /// - `kind`: one of the [`RateLawKind`] tags, e.g. "massaction"
    /// - `params`: map of law parameter keys to values or parameter names
    ///
    /// # Examples
    /// ```rust
    /// use indexmap::IndexMap;
    /// use crnsim_core::network::rate_law::RateLaw;
    /// let mut params = IndexMap::new();
    /// params.insert("k".to_string(), "k_tx".to_string());
    /// let law = RateLaw::from_parts("massaction", &params).unwrap();
    /// ```
    pub fn from_parts(kind: &str, params: &IndexMap<String, String>) -> Result<Self, RateLawError> {
        let kind = RateLawKind::from_str(kind)?;
        let required = |key: &str| -> Result<String, RateLawError> {
            params
                .get(key)
                .cloned()
                .ok_or_else(|| RateLawError::MissingParameter(kind, key.to_string()))
        };
        let hill = || -> Result<Hill, RateLawError> {
            Ok(Hill {
                k: ParamValue::parse(&required("k")?),
                s1: required("s1")?.trim().to_string(),
                kd: ParamValue::parse(&required("K")?),
                n: params
                    .get("n")
                    .map(|n| ParamValue::parse(n))
                    .unwrap_or(ParamValue::Literal(1.0)),
            })
        };
        Ok(match kind {
            RateLawKind::MassAction => RateLaw::MassAction {
                k: ParamValue::parse(&required("k")?),
            },
            RateLawKind::HillPositive => RateLaw::HillPositive(hill()?),
            RateLawKind::HillNegative => RateLaw::HillNegative(hill()?),
            RateLawKind::ProportionalHillPositive => RateLaw::ProportionalHillPositive {
                hill: hill()?,
                d: required("d")?.trim().to_string(),
            },
            RateLawKind::ProportionalHillNegative => RateLaw::ProportionalHillNegative {
                hill: hill()?,
                d: required("d")?.trim().to_string(),
            },
            RateLawKind::General => RateLaw::General {
                rate: parse_expr(&required("rate")?)?,
            },
        })
    }

    pub fn kind(&self) -> RateLawKind {
        match self {
            RateLaw::MassAction { .. } => RateLawKind::MassAction,
            RateLaw::HillPositive(_) => RateLawKind::HillPositive,
            RateLaw::HillNegative(_) => RateLawKind::HillNegative,
            RateLaw::ProportionalHillPositive { .. } => RateLawKind::ProportionalHillPositive,
            RateLaw::ProportionalHillNegative { .. } => RateLawKind::ProportionalHillNegative,
            RateLaw::General { .. } => RateLawKind::General,
        }
    }

    /// The parameter mapping of the rate law, the inverse of [`RateLaw::from_parts`]
    pub fn parameters(&self) -> IndexMap<String, String> {
        let mut params = IndexMap::new();
        let add_hill = |params: &mut IndexMap<String, String>, hill: &Hill| {
            params.insert("k".to_string(), hill.k.to_string());
            params.insert("s1".to_string(), hill.s1.clone());
            params.insert("K".to_string(), hill.kd.to_string());
            params.insert("n".to_string(), hill.n.to_string());
        };
        match self {
            RateLaw::MassAction { k } => {
                params.insert("k".to_string(), k.to_string());
            }
            RateLaw::HillPositive(hill) | RateLaw::HillNegative(hill) => {
                add_hill(&mut params, hill);
            }
            RateLaw::ProportionalHillPositive { hill, d }
            | RateLaw::ProportionalHillNegative { hill, d } => {
                add_hill(&mut params, hill);
                params.insert("d".to_string(), d.clone());
            }
            RateLaw::General { rate } => {
                params.insert("rate".to_string(), rate.to_infix());
            }
        }
        params
    }

    /// Species the rate law reads directly (not counting mass action reactants)
    pub fn species_refs(&self) -> Vec<String> {
        match self {
            RateLaw::MassAction { .. } => vec![],
            RateLaw::HillPositive(hill) | RateLaw::HillNegative(hill) => vec![hill.s1.clone()],
            RateLaw::ProportionalHillPositive { hill, d }
            | RateLaw::ProportionalHillNegative { hill, d } => {
                if *d == hill.s1 {
                    vec![hill.s1.clone()]
                } else {
                    vec![hill.s1.clone(), d.clone()]
                }
            }
            // Symbols of a general law may be either species or parameters
            RateLaw::General { .. } => vec![],
        }
    }

    /// Parameter values of the rate law given by name
    pub fn parameter_refs(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut push = |value: &ParamValue| {
            if let ParamValue::Symbol(name) = value {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        };
        match self {
            RateLaw::MassAction { k } => push(k),
            RateLaw::HillPositive(hill)
            | RateLaw::HillNegative(hill)
            | RateLaw::ProportionalHillPositive { hill, .. }
            | RateLaw::ProportionalHillNegative { hill, .. } => {
                push(&hill.k);
                push(&hill.kd);
                push(&hill.n);
            }
            RateLaw::General { .. } => {}
        }
        names
    }

    /// Copy of the rate law with parameter names replaced according to `renames`
    ///
    /// Species names of Hill laws are left untouched, symbols of general rates are all
    /// renamed.
    pub fn rename_parameters(&self, renames: &IndexMap<String, String>) -> RateLaw {
        let rename = |value: &ParamValue| match value {
            ParamValue::Symbol(name) => match renames.get(name) {
                Some(new_name) => ParamValue::Symbol(new_name.clone()),
                None => value.clone(),
            },
            ParamValue::Literal(_) => value.clone(),
        };
        let rename_hill = |hill: &Hill| Hill {
            k: rename(&hill.k),
            s1: hill.s1.clone(),
            kd: rename(&hill.kd),
            n: rename(&hill.n),
        };
        match self {
            RateLaw::MassAction { k } => RateLaw::MassAction { k: rename(k) },
            RateLaw::HillPositive(hill) => RateLaw::HillPositive(rename_hill(hill)),
            RateLaw::HillNegative(hill) => RateLaw::HillNegative(rename_hill(hill)),
            RateLaw::ProportionalHillPositive { hill, d } => RateLaw::ProportionalHillPositive {
                hill: rename_hill(hill),
                d: d.clone(),
            },
            RateLaw::ProportionalHillNegative { hill, d } => RateLaw::ProportionalHillNegative {
                hill: rename_hill(hill),
                d: d.clone(),
            },
            RateLaw::General { rate } => RateLaw::General {
                rate: rate.rename_symbols(renames),
            },
        }
    }

    /// The deterministic rate as an expression
    ///
    /// # Parameters
    /// - `reactants`: reactant stoichiometry of the reaction the law belongs to
    pub fn to_expr(&self, reactants: &IndexMap<String, f64>) -> Expr {
        let hill_fraction = |hill: &Hill| {
            // s^n / (K^n + s^n)
            let s_n = Expr::Pow(
                Box::new(Expr::symbol(&hill.s1)),
                Box::new(hill.n.to_expr()),
            );
            let k_n = Expr::Pow(Box::new(hill.kd.to_expr()), Box::new(hill.n.to_expr()));
            Expr::Div(Box::new(s_n.clone()), Box::new(Expr::Add(vec![k_n, s_n])))
        };
        let hill_repression = |hill: &Hill| {
            // 1 + (s/K)^n
            Expr::Add(vec![
                Expr::Number(1.0),
                Expr::Pow(
                    Box::new(Expr::Div(
                        Box::new(Expr::symbol(&hill.s1)),
                        Box::new(hill.kd.to_expr()),
                    )),
                    Box::new(hill.n.to_expr()),
                ),
            ])
        };
        match self {
            RateLaw::MassAction { k } => {
                let mut factors = vec![k.to_expr()];
                for (species, stoich) in reactants {
                    if (*stoich - 1.0).abs() < f64::EPSILON {
                        factors.push(Expr::symbol(species));
                    } else {
                        factors.push(Expr::Pow(
                            Box::new(Expr::symbol(species)),
                            Box::new(Expr::Number(*stoich)),
                        ));
                    }
                }
                if factors.len() == 1 {
                    k.to_expr()
                } else {
                    Expr::Mul(factors)
                }
            }
            RateLaw::HillPositive(hill) => Expr::Mul(vec![hill.k.to_expr(), hill_fraction(hill)]),
            RateLaw::HillNegative(hill) => {
                Expr::Div(Box::new(hill.k.to_expr()), Box::new(hill_repression(hill)))
            }
            RateLaw::ProportionalHillPositive { hill, d } => {
                Expr::Mul(vec![hill.k.to_expr(), Expr::symbol(d), hill_fraction(hill)])
            }
            RateLaw::ProportionalHillNegative { hill, d } => Expr::Div(
                Box::new(Expr::Mul(vec![hill.k.to_expr(), Expr::symbol(d)])),
                Box::new(hill_repression(hill)),
            ),
            RateLaw::General { rate } => rate.clone(),
        }
    }

    /// Render as the `type=<kind> key=value ...` annotation string
    pub fn to_annotation(&self) -> String {
        let mut parts = vec![format!("type={}", self.kind())];
        for (key, value) in self.parameters() {
            // General rates may contain spaces, which would split the value
            parts.push(format!("{}={}", key, value.replace(' ', "")));
        }
        parts.join(" ")
    }

    /// Parse a `type=<kind> key=value ...` annotation string
    pub fn from_annotation(annotation: &str) -> Result<Self, RateLawError> {
        let mut kind: Option<String> = None;
        let mut params = IndexMap::new();
        for part in annotation.split_whitespace() {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| RateLawError::MalformedAnnotation(part.to_string()))?;
            if key == "type" {
                kind = Some(value.to_string());
            } else {
                params.insert(key.to_string(), value.to_string());
            }
        }
        match kind {
            Some(kind) => RateLaw::from_parts(&kind, &params),
            None => Err(RateLawError::MalformedAnnotation(annotation.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum RateLawError {
    #[error("Unknown rate law type {0}")]
    UnknownKind(String),
    #[error("Rate law {0} requires the parameter {1}")]
    MissingParameter(RateLawKind, String),
    #[error("Parameter {0} is not defined in the model")]
    UnresolvedParameter(String),
    #[error("Malformed rate law annotation: {0}")]
    MalformedAnnotation(String),
    #[error("Unable to parse the rate expression")]
    ExpressionError(#[from] ExprParseError),
}

#[cfg(test)]
mod rate_law_tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn param_value_parse() {
        assert_eq!(ParamValue::parse("0.5"), ParamValue::Literal(0.5));
        assert_eq!(ParamValue::parse("1e-3"), ParamValue::Literal(1e-3));
        assert_eq!(
            ParamValue::parse(" k_tx "),
            ParamValue::Symbol("k_tx".to_string())
        );
    }

    #[test]
    fn resolve() {
        let mut globals = IndexMap::new();
        globals.insert("k_tx".to_string(), 0.05);
        assert_eq!(ParamValue::parse("k_tx").resolve(&globals).unwrap(), 0.05);
        match ParamValue::parse("k_tl").resolve(&globals) {
            Err(RateLawError::UnresolvedParameter(name)) => assert_eq!(name, "k_tl"),
            _ => panic!("Unresolved parameter should error"),
        }
    }

    #[test]
    fn mass_action_from_parts() {
        let law = RateLaw::from_parts("massaction", &params(&[("k", "k_tx")])).unwrap();
        assert_eq!(law, RateLaw::mass_action("k_tx"));
        assert_eq!(law.parameter_refs(), vec!["k_tx"]);
    }

    #[test]
    fn hill_defaults() {
        let law = RateLaw::from_parts(
            "proportionalhillpositive",
            &params(&[("k", "k_tl"), ("d", "T"), ("s1", "R"), ("K", "K")]),
        )
        .unwrap();
        match &law {
            RateLaw::ProportionalHillPositive { hill, d } => {
                assert_eq!(d, "T");
                assert_eq!(hill.s1, "R");
                assert_eq!(hill.n, ParamValue::Literal(1.0));
            }
            _ => panic!("Incorrect rate law kind"),
        }
        assert_eq!(law.species_refs(), vec!["R", "T"]);
        assert_eq!(law.parameter_refs(), vec!["k_tl", "K"]);
    }

    #[test]
    fn missing_parameter() {
        match RateLaw::from_parts("hillpositive", &params(&[("k", "1")])) {
            Err(RateLawError::MissingParameter(kind, key)) => {
                assert_eq!(kind, RateLawKind::HillPositive);
                assert_eq!(key, "s1");
            }
            _ => panic!("Missing parameter should error"),
        }
        assert!(matches!(
            RateLaw::from_parts("michaelis", &params(&[])),
            Err(RateLawError::UnknownKind(_))
        ));
    }

    #[test]
    fn annotation_round_trip() {
        let law = RateLaw::from_parts(
            "hillnegative",
            &params(&[("k", "2"), ("s1", "P"), ("K", "K"), ("n", "2")]),
        )
        .unwrap();
        let annotation = law.to_annotation();
        assert_eq!(annotation, "type=hillnegative k=2 s1=P K=K n=2");
        assert_eq!(RateLaw::from_annotation(&annotation).unwrap(), law);
    }

    #[test]
    fn general_annotation() {
        let law = RateLaw::from_parts("general", &params(&[("rate", "k * A^2")])).unwrap();
        let annotation = law.to_annotation();
        assert_eq!(annotation, "type=general rate=(k*(A^2))");
        assert_eq!(RateLaw::from_annotation(&annotation).unwrap(), law);
    }

    #[test]
    fn mass_action_expr() {
        let mut reactants = IndexMap::new();
        reactants.insert("A".to_string(), 2.0);
        reactants.insert("B".to_string(), 1.0);
        let expr = RateLaw::mass_action("k").to_expr(&reactants);
        assert_eq!(expr.to_infix(), "(k * (A ^ 2) * B)");
        // A source reaction is just the rate constant
        assert_eq!(
            RateLaw::mass_action(0.5).to_expr(&IndexMap::new()),
            Expr::Number(0.5)
        );
    }
}
