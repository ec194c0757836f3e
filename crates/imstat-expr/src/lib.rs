//! imstat-expr - Arithmetic formulas for Monte Carlo simulation
//!
//! This crate compiles the user-authored formula of a simulation into an
//! AST and evaluates it against sampled variable values.
//!
//! # Expression Syntax
//!
//! - **Numbers**: `42`, `0.5`, `.25`, `1e-5`
//! - **Variables**: any identifier, e.g. `revenue`, `X_1`
//! - **Operators**: `+ - * / ^` with the usual precedence, `^` left-associative
//! - **Functions**: `sqrt abs log exp sin cos` (`ln` is an alias of `log`)
//!
//! # Examples
//!
//! ```
//! use imstat_expr::{evaluate, parse_expression, EmptyEnvironment};
//!
//! let expr = parse_expression("2 + 3 * 4").unwrap();
//! assert_eq!(evaluate(&expr, &EmptyEnvironment), 14.0);
//!
//! let expr = parse_expression("X^2").unwrap();
//! assert_eq!(evaluate(&expr, &[("X", 3.0)][..]), 9.0);
//! ```

pub mod ast;
pub mod compile;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use compile::*;
pub use eval::*;
pub use lexer::{tokenize, Lexed, SkippedChar, Spanned, Token};
pub use parser::*;
