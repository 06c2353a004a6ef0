//! Lex a rate expression string into a series of tokens for later parsing

use thiserror::Error;

use crate::io::expr_parse::token::Token;

pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
        }
    }

    /// Convert the source into tokens, always terminated by [`Token::Eof`]
    pub fn lex(&mut self) -> Result<Vec<Token>, LexerError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }

        self.tokens.push(Token::Eof);
        Ok(std::mem::take(&mut self.tokens))
    }

    fn scan_token(&mut self) -> Result<(), LexerError> {
        let c: char = self.advance();
        match c {
            // Single Character Tokens
            '(' => self.add_token(Token::LeftParen),
            ')' => self.add_token(Token::RightParen),
            '+' => self.add_token(Token::Plus),
            '-' => self.add_token(Token::Minus),
            '*' => {
                // Accept python style `**` for powers
                if self.peek() == '*' {
                    self.advance();
                    self.add_token(Token::Caret)
                } else {
                    self.add_token(Token::Star)
                }
            }
            '/' => self.add_token(Token::Slash),
            '^' => self.add_token(Token::Caret),
            // Literals and Identifiers
            '0'..='9' | '.' => self.read_number()?,
            'a'..='z' | 'A'..='Z' | '_' => self.read_identifier(),
            // Whitespace
            ' ' | '\r' | '\n' | '\t' => {}
            other => return Err(LexerError::InvalidCharacter(other, self.start)),
        };
        Ok(())
    }

    fn advance(&mut self) -> char {
        let char_at_current = self.source[self.current];
        self.current += 1;
        char_at_current
    }

    fn read_number(&mut self) -> Result<(), LexerError> {
        while Lexer::is_digit(self.peek()) || self.peek() == '.' {
            self.advance();
        }
        // Exponent, only consumed when followed by digits
        if matches!(self.peek(), 'e' | 'E') {
            let sign_offset = if matches!(self.peek_next(1), '+' | '-') { 2 } else { 1 };
            if Lexer::is_digit(self.peek_next(sign_offset)) {
                for _ in 0..sign_offset {
                    self.advance();
                }
                while Lexer::is_digit(self.peek()) {
                    self.advance();
                }
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        match text.parse::<f64>() {
            Ok(value) => {
                self.add_token(Token::Number(value));
                Ok(())
            }
            Err(_) => Err(LexerError::InvalidNumber(text)),
        }
    }

    fn read_identifier(&mut self) {
        while Lexer::is_alphanumeric(self.peek()) {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        self.add_token(Token::Identifier(text));
    }

    fn is_digit(c: char) -> bool {
        c.is_ascii_digit()
    }

    fn is_alpha(c: char) -> bool {
        matches!(c, 'a'..='z' | 'A'..='Z' | '_')
    }

    fn is_alphanumeric(c: char) -> bool {
        Lexer::is_alpha(c) || Lexer::is_digit(c)
    }

    fn peek(&self) -> char {
        self.peek_next(0)
    }

    fn peek_next(&self, offset: usize) -> char {
        match self.source.get(self.current + offset) {
            Some(c) => *c,
            None => '\0',
        }
    }

    fn add_token(&mut self, token: Token) {
        self.tokens.push(token);
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum LexerError {
    #[error("Invalid character {0:?} at position {1}")]
    InvalidCharacter(char, usize),
    #[error("Invalid numeric literal {0}")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use crate::io::expr_parse::lexer::{Lexer, LexerError};
    use crate::io::expr_parse::token::Token;

    #[test]
    fn test_mass_action() {
        let mut lexer = Lexer::new("k_tx * G");
        let tokens = lexer.lex().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Identifier(String::from("k_tx")),
                Token::Star,
                Token::Identifier(String::from("G")),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("1.5e-3 + 2E2 - .5");
        let tokens = lexer.lex().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Number(1.5e-3),
                Token::Plus,
                Token::Number(200.0),
                Token::Minus,
                Token::Number(0.5),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_power_operators() {
        let mut lexer = Lexer::new("(T^2)**n");
        let tokens = lexer.lex().unwrap();
        assert_eq!(tokens.len(), 8);
        assert_eq!(tokens[2], Token::Caret);
        assert_eq!(tokens[5], Token::Caret);
    }

    #[test]
    fn test_invalid_character() {
        let mut lexer = Lexer::new("k # G");
        assert_eq!(lexer.lex(), Err(LexerError::InvalidCharacter('#', 2)));
    }
}
