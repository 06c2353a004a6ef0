use crate::io::expr_parse::token::Token;
use crate::network::expression::Expr;

use thiserror::Error;
/*
Rate expression grammar:
expression -> term (("+" | "-") term)* ;
term -> unary (("*" | "/") unary)* ;
unary -> "-" unary | power ;
power -> primary ("^" unary)? ;
primary -> NUMBER | IDENTIFIER | "(" expression ")" ;

e.g. k_tl * T * R / (K + R)
 */

/// Rate expression parser
pub struct ExprParser {
    /// Vector of tokens from the expression string
    tokens: Vec<Token>,
    /// Current token being processed
    current: usize,
}

impl ExprParser {
    /// Create a new ExprParser
    pub fn new(tokens: Vec<Token>) -> ExprParser {
        ExprParser { tokens, current: 0 }
    }

    // region Parsing Functions

    /// Parse the token vector into an expression AST
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.expression()?;
        if !self.is_at_end() {
            // If entire expression has not been parsed, an error has occurred
            return Err(ParseError::EarlyTermination(format!("{:?}", self.peek())));
        }
        Ok(expr)
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        let mut terms = vec![self.term()?];

        while self.match_token(&[Token::Plus, Token::Minus]) {
            let operator = self.previous();
            let right = self.term()?;
            match operator {
                Token::Plus => terms.push(right),
                Token::Minus => {
                    let left = collapse(terms, Expr::Add);
                    terms = vec![Expr::Sub(Box::new(left), Box::new(right))];
                }
                _ => return Err(ParseError::InvalidBinaryOperator),
            }
        }
        Ok(collapse(terms, Expr::Add))
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut factors = vec![self.unary()?];

        while self.match_token(&[Token::Star, Token::Slash]) {
            let operator = self.previous();
            let right = self.unary()?;
            match operator {
                Token::Star => factors.push(right),
                Token::Slash => {
                    let left = collapse(factors, Expr::Mul);
                    factors = vec![Expr::Div(Box::new(left), Box::new(right))];
                }
                _ => return Err(ParseError::InvalidBinaryOperator),
            }
        }
        Ok(collapse(factors, Expr::Mul))
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&[Token::Minus]) {
            let operand = self.unary()?;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.primary()?;
        if self.match_token(&[Token::Caret]) {
            // Right associative, a^b^c is a^(b^c)
            let exponent = self.unary()?;
            return Ok(Expr::Pow(Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Token::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            Token::Identifier(name) => {
                self.advance();
                Ok(Expr::Symbol(name))
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(Token::RightParen, "Expect ')' after expression.")?;
                Ok(expr)
            }
            _ => Err(ParseError::ExpectedExpression),
        }
    }

    // endregion Parsing Functions

    // region parsing helper functions

    /// Check whether the token at the current position matches one of the provided `tokens`,
    /// if it does advance [`self.current`] and return true, otherwise return false
    fn match_token(&mut self, tokens: &[Token]) -> bool {
        for t in tokens {
            if self.check(t) {
                self.advance();
                return true;
            }
        }
        false
    }

    /// Check whether the current token matches the provided `token`
    fn check(&self, token: &Token) -> bool {
        if self.is_at_end() {
            return false;
        }
        &self.peek() == token
    }

    /// Advance `self.current` one position unless at end of the token Vec, then return the
    /// previous token.
    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek() == Token::Eof
    }

    /// Get a copy of the current token
    fn peek(&self) -> Token {
        match self.tokens.get(self.current) {
            Some(token) => token.clone(),
            None => Token::Eof,
        }
    }

    /// Get a copy of the previous token
    fn previous(&self) -> Token {
        self.tokens[self.current.saturating_sub(1)].clone()
    }

    /// Check whether the current token matches an input token, if it matches advance to the
    /// next token, and if it doesn't return an error. Used mainly for matching parenthesis.
    fn consume(&mut self, token: Token, msg: &str) -> Result<Token, ParseError> {
        if self.check(&token) {
            return Ok(self.advance());
        }

        Err(ParseError::MissingToken(msg.to_string()))
    }

    // endregion parsing helper functions
}

/// Single item lists stay as the item, longer lists become an n-ary node
fn collapse(mut items: Vec<Expr>, node: fn(Vec<Expr>) -> Expr) -> Expr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        node(items)
    }
}

/// Enum representing possible parse errors
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParseError {
    /// Token was expected to be a binary operator but was not
    #[error("Invalid binary operator encountered")]
    InvalidBinaryOperator,
    /// Missing expected token (e.g. a right parenthesis)
    #[error("Missing expected token: {0}")]
    MissingToken(String),
    /// No expression found when one was expected
    #[error("No expression found, check that the rate string is not empty")]
    ExpectedExpression,
    /// Expression was not completed when parsing terminated
    #[error("Parsing terminated early at {0}")]
    EarlyTermination(String),
}
