//! Tokenizer for arithmetic expressions using nom
//!
//! Token grammar:
//! ```text
//! number  := (digits ('.' digits?)? | '.' digits) (('e' | 'E') ('+' | '-')? digits)?
//! ident   := (letter | '_') (alphanumeric | '_')*
//! symbol  := '+' | '-' | '*' | '/' | '^' | '(' | ')'
//! ```
//!
//! A sign is only consumed as part of a number when it follows an exponent
//! marker, so `3-1e-5` lexes as `3`, `-`, `1e-5`. Characters that start no
//! token are skipped and reported, never rejected.

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, map_res, opt, recognize, value},
    sequence::{pair, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Caret => f.write_str("^"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

/// A token with its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// A character the tokenizer could not use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedChar {
    pub offset: usize,
    pub ch: char,
}

/// Output of [`tokenize`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lexed {
    pub tokens: Vec<Spanned>,
    pub skipped: Vec<SkippedChar>,
}

/// Split `input` into tokens, skipping whitespace and unknown characters
pub fn tokenize(input: &str) -> Lexed {
    let mut lexed = Lexed::default();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        let offset = input.len() - rest.len();
        match token(rest) {
            Ok((remaining, token)) => {
                lexed.tokens.push(Spanned { token, offset });
                rest = remaining;
            }
            Err(_) => {
                let mut chars = rest.chars();
                if let Some(ch) = chars.next() {
                    lexed.skipped.push(SkippedChar { offset, ch });
                }
                rest = chars.as_str();
            }
        }
        rest = rest.trim_start();
    }

    lexed
}

/// Parse a single token
fn token(input: &str) -> IResult<&str, Token> {
    alt((
        map(number, Token::Number),
        map(identifier, |s| Token::Ident(s.to_string())),
        symbol,
    ))(input)
}

/// Parse an unsigned number literal (including scientific notation)
fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(pair(
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        )),
        str::parse::<f64>,
    )(input)
}

/// Parse an identifier (starts with letter or underscore, followed by alphanumeric or underscore)
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

/// Parse an operator or parenthesis
fn symbol(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Plus, char('+')),
        value(Token::Minus, char('-')),
        value(Token::Star, char('*')),
        value(Token::Slash, char('/')),
        value(Token::Caret, char('^')),
        value(Token::LParen, char('(')),
        value(Token::RParen, char(')')),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).tokens.into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_tokenize_simple() {
        assert_eq!(
            kinds("2 + x*3"),
            vec![
                Token::Number(2.0),
                Token::Plus,
                Token::Ident("x".to_string()),
                Token::Star,
                Token::Number(3.0),
            ]
        );
    }

    #[test]
    fn test_exponent_sign_belongs_to_number() {
        assert_eq!(
            kinds("3-1e-5"),
            vec![Token::Number(3.0), Token::Minus, Token::Number(1e-5)]
        );
        assert_eq!(kinds("2.5E+3"), vec![Token::Number(2500.0)]);
    }

    #[test]
    fn test_leading_sign_is_an_operator() {
        assert_eq!(kinds("-4"), vec![Token::Minus, Token::Number(4.0)]);
        assert_eq!(kinds("+.5"), vec![Token::Plus, Token::Number(0.5)]);
    }

    #[test]
    fn test_dangling_exponent_is_identifier() {
        assert_eq!(
            kinds("2e"),
            vec![Token::Number(2.0), Token::Ident("e".to_string())]
        );
    }

    #[test]
    fn test_unknown_characters_are_skipped() {
        let lexed = tokenize("a $ b, 2");
        assert_eq!(
            lexed.tokens.iter().map(|s| s.token.clone()).collect::<Vec<_>>(),
            vec![
                Token::Ident("a".to_string()),
                Token::Ident("b".to_string()),
                Token::Number(2.0),
            ]
        );
        assert_eq!(
            lexed.skipped,
            vec![
                SkippedChar { offset: 2, ch: '$' },
                SkippedChar { offset: 5, ch: ',' },
            ]
        );
    }

    #[test]
    fn test_offsets() {
        let lexed = tokenize("  x ^ 2");
        let offsets: Vec<usize> = lexed.tokens.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![2, 4, 6]);
    }
}
