//! Recursive-descent parser over the token stream
//!
//! Grammar (lowest to highest precedence):
//! ```text
//! expr      := additive
//! additive  := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := power (('*' | '/') power)*
//! power     := unary ('^' unary)*          left-associative
//! unary     := ('-' | '+')* atom
//! atom      := number | '(' expr ')' | function '(' expr ')' | ident
//! function  := 'sqrt' | 'abs' | 'log' | 'ln' | 'exp' | 'sin' | 'cos'
//! ```
//!
//! `^` is left-associative, so `2^3^2` is `(2^3)^2`, and unary minus binds
//! tighter than `^`, so `-2^2` is `(-2)^2`.
//!
//! Parentheses and function calls may nest at most [`MAX_NESTING`] levels and
//! the finished tree may be at most [`MAX_TREE_HEIGHT`] nodes tall, which
//! bounds the recursion of everything that walks the tree.

use thiserror::Error;

use crate::ast::*;
use crate::lexer::{tokenize, Spanned, Token};

/// Deepest parenthesis or function-call nesting accepted
pub const MAX_NESTING: usize = 256;

/// Tallest expression tree accepted
pub const MAX_TREE_HEIGHT: usize = 1024;

/// Parse errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Unexpected '{found}' at offset {position}")]
    UnexpectedToken { position: usize, found: String },

    #[error("Unexpected end of input")]
    UnexpectedEnd,

    #[error("Unexpected input after expression at offset {position}")]
    TrailingInput { position: usize },

    #[error("Expression nested deeper than {limit} levels at offset {position}")]
    TooDeep { position: usize, limit: usize },
}

/// Parse an expression from a string.
///
/// Unknown characters are skipped by the tokenizer; every other deviation
/// from the grammar is an error.
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    parse_tokens(&tokenize(input).tokens)
}

/// Parse an already tokenized expression
pub fn parse_tokens(tokens: &[Spanned]) -> Result<Expr, ParseError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
    };
    let node = parser.additive()?;
    match parser.peek() {
        None => Ok(node.expr),
        Some(spanned) => Err(ParseError::TrailingInput {
            position: spanned.offset,
        }),
    }
}

/// A parsed subtree and its height
struct Node {
    expr: Expr,
    height: usize,
}

impl Node {
    fn leaf(expr: Expr) -> Self {
        Self { expr, height: 1 }
    }
}

fn check_height(height: usize, position: usize) -> Result<(), ParseError> {
    if height > MAX_TREE_HEIGHT {
        Err(ParseError::TooDeep {
            position,
            limit: MAX_TREE_HEIGHT,
        })
    } else {
        Ok(())
    }
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&'a Token> {
        self.peek().map(|s| &s.token)
    }

    fn next(&mut self) -> Option<&'a Spanned> {
        let spanned = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(spanned)
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        match self.next() {
            Some(spanned) if &spanned.token == expected => Ok(()),
            Some(spanned) => Err(unexpected(spanned)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    /// Consume the operator at the cursor and return its offset
    fn advance(&mut self) -> usize {
        let offset = self.peek().map_or(0, |s| s.offset);
        self.pos += 1;
        offset
    }

    fn binary(op: BinaryOp, lhs: Node, rhs: Node, position: usize) -> Result<Node, ParseError> {
        let height = lhs.height.max(rhs.height) + 1;
        check_height(height, position)?;
        Ok(Node {
            expr: Expr::binary(op, lhs.expr, rhs.expr),
            height,
        })
    }

    fn additive(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            let position = self.advance();
            let rhs = self.multiplicative()?;
            lhs = Self::binary(op, lhs, rhs, position)?;
        }
    }

    fn multiplicative(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.power()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            let position = self.advance();
            let rhs = self.power()?;
            lhs = Self::binary(op, lhs, rhs, position)?;
        }
    }

    fn power(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Caret) = self.peek_token() {
            let position = self.advance();
            let rhs = self.unary()?;
            lhs = Self::binary(BinaryOp::Pow, lhs, rhs, position)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node, ParseError> {
        let start = self.peek().map_or(0, |s| s.offset);
        let mut negations = 0usize;
        loop {
            match self.peek_token() {
                Some(Token::Minus) => negations += 1,
                Some(Token::Plus) => {}
                _ => break,
            }
            self.pos += 1;
        }

        let mut node = self.atom()?;
        check_height(node.height + negations, start)?;
        for _ in 0..negations {
            node = Node {
                expr: Expr::neg(node.expr),
                height: node.height + 1,
            };
        }
        Ok(node)
    }

    /// Parse a parenthesised subexpression, counting it against the nesting limit
    fn nested(&mut self, open: &Spanned) -> Result<Node, ParseError> {
        if self.nesting >= MAX_NESTING {
            return Err(ParseError::TooDeep {
                position: open.offset,
                limit: MAX_NESTING,
            });
        }
        self.nesting += 1;
        let inner = self.additive();
        self.nesting -= 1;
        let inner = inner?;
        self.expect(&Token::RParen)?;
        Ok(inner)
    }

    fn atom(&mut self) -> Result<Node, ParseError> {
        let spanned = self.next().ok_or(ParseError::UnexpectedEnd)?;
        match &spanned.token {
            Token::Number(n) => Ok(Node::leaf(Expr::Number(*n))),
            Token::LParen => self.nested(spanned),
            Token::Ident(name) => match (Function::from_name(name), self.peek()) {
                (Some(func), Some(open)) if open.token == Token::LParen => {
                    self.pos += 1;
                    let arg = self.nested(open)?;
                    let height = arg.height + 1;
                    check_height(height, spanned.offset)?;
                    Ok(Node {
                        expr: Expr::call(func, arg.expr),
                        height,
                    })
                }
                _ => Ok(Node::leaf(Expr::var(name.clone()))),
            },
            _ => Err(unexpected(spanned)),
        }
    }
}

fn unexpected(spanned: &Spanned) -> ParseError {
    ParseError::UnexpectedToken {
        position: spanned.offset,
        found: spanned.token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Expr {
        Expr::Number(n)
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse_expression("2 + 3 * 4").unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Add,
                num(2.0),
                Expr::binary(BinaryOp::Mul, num(3.0), num(4.0))
            )
        );
    }

    #[test]
    fn test_parse_power_left_associative() {
        let expr = parse_expression("2^3^2").unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Pow,
                Expr::binary(BinaryOp::Pow, num(2.0), num(3.0)),
                num(2.0)
            )
        );
    }

    #[test]
    fn test_parse_unary_binds_tighter_than_power() {
        let expr = parse_expression("-2^2").unwrap();
        assert_eq!(
            expr,
            Expr::binary(BinaryOp::Pow, Expr::neg(num(2.0)), num(2.0))
        );
    }

    #[test]
    fn test_parse_unary_plus_is_identity() {
        assert_eq!(parse_expression("+x").unwrap(), Expr::var("x"));
    }

    #[test]
    fn test_parse_function_call() {
        let expr = parse_expression("ln(x + 1)").unwrap();
        assert_eq!(
            expr,
            Expr::call(
                Function::Log,
                Expr::binary(BinaryOp::Add, Expr::var("x"), num(1.0))
            )
        );
    }

    #[test]
    fn test_function_name_without_parens_is_variable() {
        assert_eq!(parse_expression("sqrt").unwrap(), Expr::var("sqrt"));
    }

    #[test]
    fn test_parse_scientific_subtraction() {
        let expr = parse_expression("x-1e-5").unwrap();
        assert_eq!(expr, Expr::binary(BinaryOp::Sub, Expr::var("x"), num(1e-5)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_expression(""), Err(ParseError::UnexpectedEnd));
        assert_eq!(parse_expression("(1 + 2"), Err(ParseError::UnexpectedEnd));
        assert!(matches!(
            parse_expression("1 2"),
            Err(ParseError::TrailingInput { position: 2 })
        ));
        assert!(matches!(
            parse_expression("* 2"),
            Err(ParseError::UnexpectedToken { position: 0, .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let at_limit = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert_eq!(parse_expression(&at_limit), Ok(num(1.0)));

        let over = format!("{}1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert_eq!(
            parse_expression(&over),
            Err(ParseError::TooDeep {
                position: MAX_NESTING,
                limit: MAX_NESTING
            })
        );
    }

    #[test]
    fn test_function_calls_count_as_nesting() {
        let over = format!("{}x{}", "abs(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert!(matches!(
            parse_expression(&over),
            Err(ParseError::TooDeep { limit: MAX_NESTING, .. })
        ));
    }

    #[test]
    fn test_negation_chain_is_bounded_by_height() {
        let tallest = format!("{}1", "-".repeat(MAX_TREE_HEIGHT - 1));
        assert!(parse_expression(&tallest).is_ok());

        let too_tall = format!("{}1", "-".repeat(MAX_TREE_HEIGHT));
        assert_eq!(
            parse_expression(&too_tall),
            Err(ParseError::TooDeep {
                position: 0,
                limit: MAX_TREE_HEIGHT
            })
        );
    }

    #[test]
    fn test_long_sum_is_bounded_by_height() {
        let tallest = vec!["1"; MAX_TREE_HEIGHT].join("+");
        assert!(parse_expression(&tallest).is_ok());

        let too_tall = vec!["1"; MAX_TREE_HEIGHT + 1].join("+");
        assert!(matches!(
            parse_expression(&too_tall),
            Err(ParseError::TooDeep { limit: MAX_TREE_HEIGHT, .. })
        ));
    }

    #[test]
    fn test_display_round_trip() {
        for source in ["2 + 3 * 4", "-(a - b)^2 / c", "exp(-x) * sin(y)", "a^b^c"] {
            let expr = parse_expression(source).unwrap();
            let reparsed = parse_expression(&expr.to_string()).unwrap();
            assert_eq!(expr, reparsed, "round trip failed for {}", source);
        }
    }
}
