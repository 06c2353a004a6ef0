//! Arithmetic expressions used by rate laws
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use thiserror::Error;

/// Representation of a rate expression as an AST
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(f64),
    /// Reference to a species or a parameter
    Symbol(String),
    /// Sum of the terms
    Add(Vec<Expr>),
    /// Product of the factors
    Mul(Vec<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_infix())
    }
}

impl Expr {
    pub fn symbol(name: &str) -> Expr {
        Expr::Symbol(name.to_string())
    }

    /// Generate an infix string from the AST
    ///
    /// Every compound node is wrapped in parentheses, so the string parses back
    /// into the same tree.
    pub fn to_infix(&self) -> String {
        match self {
            Expr::Number(value) if *value < 0.0 => format!("(-{})", format_number(-value)),
            Expr::Number(value) => format_number(*value),
            Expr::Symbol(name) => name.clone(),
            Expr::Add(terms) => join_terms(terms, " + "),
            Expr::Mul(factors) => join_terms(factors, " * "),
            Expr::Sub(left, right) => format!("({} - {})", left.to_infix(), right.to_infix()),
            Expr::Div(left, right) => format!("({} / {})", left.to_infix(), right.to_infix()),
            Expr::Pow(base, exponent) => {
                format!("({} ^ {})", base.to_infix(), exponent.to_infix())
            }
            Expr::Neg(val) => format!("(-{})", val.to_infix()),
        }
    }

    /// Names of every symbol in the expression, in order of first appearance
    pub fn symbols(&self) -> Vec<String> {
        let mut found = Vec::new();
        self.collect_symbols(&mut found);
        found
    }

    fn collect_symbols(&self, found: &mut Vec<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Symbol(name) => {
                if !found.contains(name) {
                    found.push(name.clone());
                }
            }
            Expr::Add(items) | Expr::Mul(items) => {
                items.iter().for_each(|e| e.collect_symbols(found));
            }
            Expr::Sub(left, right) | Expr::Div(left, right) | Expr::Pow(left, right) => {
                left.collect_symbols(found);
                right.collect_symbols(found);
            }
            Expr::Neg(val) => val.collect_symbols(found),
        }
    }

    /// Return a copy of the expression with symbols renamed according to `renames`
    pub fn rename_symbols(&self, renames: &IndexMap<String, String>) -> Expr {
        match self {
            Expr::Number(value) => Expr::Number(*value),
            Expr::Symbol(name) => match renames.get(name) {
                Some(new_name) => Expr::Symbol(new_name.clone()),
                None => Expr::Symbol(name.clone()),
            },
            Expr::Add(terms) => Expr::Add(terms.iter().map(|e| e.rename_symbols(renames)).collect()),
            Expr::Mul(factors) => {
                Expr::Mul(factors.iter().map(|e| e.rename_symbols(renames)).collect())
            }
            Expr::Sub(l, r) => Expr::Sub(
                Box::new(l.rename_symbols(renames)),
                Box::new(r.rename_symbols(renames)),
            ),
            Expr::Div(l, r) => Expr::Div(
                Box::new(l.rename_symbols(renames)),
                Box::new(r.rename_symbols(renames)),
            ),
            Expr::Pow(l, r) => Expr::Pow(
                Box::new(l.rename_symbols(renames)),
                Box::new(r.rename_symbols(renames)),
            ),
            Expr::Neg(val) => Expr::Neg(Box::new(val.rename_symbols(renames))),
        }
    }

    /// Resolve every symbol, producing an expression that can be evaluated against a
    /// species state vector
    ///
    /// # Parameters
    /// - `species`: species ids, the position of an id is its index in the state vector
    /// - `parameters`: map of parameter names to values
    ///
    /// Species take precedence over parameters with the same name.
    pub fn bind(
        &self,
        species: &IndexMap<String, usize>,
        parameters: &IndexMap<String, f64>,
    ) -> Result<BoundExpr, ExprError> {
        Ok(match self {
            Expr::Number(value) => BoundExpr::Const(*value),
            Expr::Symbol(name) => {
                if let Some(index) = species.get(name) {
                    BoundExpr::Species(*index)
                } else if let Some(value) = parameters.get(name) {
                    BoundExpr::Const(*value)
                } else {
                    return Err(ExprError::UnresolvedSymbol(name.clone()));
                }
            }
            Expr::Add(terms) => BoundExpr::Add(
                terms
                    .iter()
                    .map(|e| e.bind(species, parameters))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Mul(factors) => BoundExpr::Mul(
                factors
                    .iter()
                    .map(|e| e.bind(species, parameters))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Sub(l, r) => BoundExpr::Sub(
                Box::new(l.bind(species, parameters)?),
                Box::new(r.bind(species, parameters)?),
            ),
            Expr::Div(l, r) => BoundExpr::Div(
                Box::new(l.bind(species, parameters)?),
                Box::new(r.bind(species, parameters)?),
            ),
            Expr::Pow(l, r) => BoundExpr::Pow(
                Box::new(l.bind(species, parameters)?),
                Box::new(r.bind(species, parameters)?),
            ),
            Expr::Neg(val) => BoundExpr::Neg(Box::new(val.bind(species, parameters)?)),
        })
    }
}

fn join_terms(terms: &[Expr], separator: &str) -> String {
    let inner: Vec<String> = terms.iter().map(|e| e.to_infix()).collect();
    format!("({})", inner.join(separator))
}

/// Format a float so that it is read back as the same number
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:?}", value)
    }
}

/// Expression with symbols resolved to state indices and constants
#[derive(Clone, Debug, PartialEq)]
pub enum BoundExpr {
    Const(f64),
    Species(usize),
    Add(Vec<BoundExpr>),
    Mul(Vec<BoundExpr>),
    Sub(Box<BoundExpr>, Box<BoundExpr>),
    Div(Box<BoundExpr>, Box<BoundExpr>),
    Pow(Box<BoundExpr>, Box<BoundExpr>),
    Neg(Box<BoundExpr>),
}

impl BoundExpr {
    /// Evaluate against a species state, `scale` divides every species value
    /// (used to convert counts into concentrations)
    pub fn eval(&self, state: &[f64], scale: f64) -> f64 {
        match self {
            BoundExpr::Const(value) => *value,
            BoundExpr::Species(index) => state[*index] / scale,
            BoundExpr::Add(terms) => terms.iter().map(|e| e.eval(state, scale)).sum(),
            BoundExpr::Mul(factors) => factors.iter().map(|e| e.eval(state, scale)).product(),
            BoundExpr::Sub(l, r) => l.eval(state, scale) - r.eval(state, scale),
            BoundExpr::Div(l, r) => l.eval(state, scale) / r.eval(state, scale),
            BoundExpr::Pow(l, r) => l.eval(state, scale).powf(r.eval(state, scale)),
            BoundExpr::Neg(val) => -val.eval(state, scale),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ExprError {
    #[error("Symbol {0} is neither a species nor a parameter of the model")]
    UnresolvedSymbol(String),
}
