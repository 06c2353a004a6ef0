//! Module for parsing infix rate expressions into [`Expr`] trees

use crate::io::expr_parse::lexer::LexerError;
use crate::io::expr_parse::parser::ParseError;
use crate::network::expression::Expr;
use thiserror::Error;

mod lexer;
pub mod parser;
mod token;

/// Parse an infix rate expression into an expression tree
///
/// # Parameters
/// - `input`: &str representing the rate, e.g. `"k_tl * T * R / (K + R)"`
///
/// # Returns
/// Parse result which is
/// - `Ok`: The root node of the expression tree
/// - `Err`: The ExprParseError describing the issue with the expression
///
/// # Examples
/// ```rust
/// use crnsim_core::io::expr_parse::parse_expr;
/// let rate = parse_expr("k * A ^ 2").unwrap();
/// assert_eq!(rate.to_string(), "(k * (A ^ 2))");
/// ```
pub fn parse_expr(input: &str) -> Result<Expr, ExprParseError> {
    let mut lexer = lexer::Lexer::new(input);
    let tokens = lexer.lex()?;

    let mut parser = parser::ExprParser::new(tokens);
    let expr = parser.parse()?;
    Ok(expr)
}

/// Enum representing possible lex and parse errors
#[derive(Debug, Error)]
pub enum ExprParseError {
    /// Lexing Error
    #[error("Error occurred during lexing (conversion of rate string to tokens)")]
    LexingError(#[from] LexerError),
    /// Parsing Error
    #[error("Error occurred during parsing (conversion of tokens to expression tree)")]
    ParsingError(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use crate::io::expr_parse::{parse_expr, ExprParseError};
    use crate::network::expression::Expr;

    #[test]
    fn test_parse_expr() {
        let rate = parse_expr("k_tl * T * R / (K + R)").unwrap();
        match rate {
            Expr::Div(numerator, denominator) => {
                match *numerator {
                    Expr::Mul(factors) => assert_eq!(factors.len(), 3),
                    _ => panic!("Incorrect Parse"),
                }
                match *denominator {
                    Expr::Add(terms) => {
                        assert_eq!(terms, vec![Expr::symbol("K"), Expr::symbol("R")])
                    }
                    _ => panic!("Incorrect Parse"),
                }
            }
            _ => panic!("Incorrect operation"),
        }
    }

    #[test]
    fn test_errors_are_wrapped() {
        assert!(matches!(
            parse_expr("k $ A"),
            Err(ExprParseError::LexingError(_))
        ));
        assert!(matches!(
            parse_expr("k * (A"),
            Err(ExprParseError::ParsingError(_))
        ));
    }
}
