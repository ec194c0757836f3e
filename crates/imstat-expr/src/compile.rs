//! Lenient compilation of user-authored formulas
//!
//! [`CompiledExpression::compile`] never fails. Anything the strict parser
//! would reject compiles to the constant 0 and is reported as a
//! [`Diagnostic`], so a partially written formula still runs.

use serde::{Deserialize, Serialize};

use crate::ast::Expr;
use crate::eval::{Environment, EvalStats, Evaluator};
use crate::lexer::tokenize;
use crate::parser::parse_tokens;

/// Something the compiler tolerated instead of rejecting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A character that starts no token was ignored
    SkippedCharacter { offset: usize, ch: char },
    /// The formula did not parse and evaluates to 0
    ParseFailure { message: String },
    /// A referenced variable is not among the declared names
    UnresolvedVariable { name: String },
}

/// A parsed formula together with its source and diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledExpression {
    source: String,
    expr: Expr,
    diagnostics: Vec<Diagnostic>,
}

impl CompiledExpression {
    /// Compile a formula without checking variable names
    pub fn compile(source: &str) -> Self {
        let lexed = tokenize(source);
        let mut diagnostics: Vec<Diagnostic> = lexed
            .skipped
            .iter()
            .map(|s| Diagnostic::SkippedCharacter {
                offset: s.offset,
                ch: s.ch,
            })
            .collect();

        let expr = match parse_tokens(&lexed.tokens) {
            Ok(expr) => expr,
            Err(e) => {
                tracing::debug!("Formula '{}' failed to parse: {}", source, e);
                diagnostics.push(Diagnostic::ParseFailure {
                    message: e.to_string(),
                });
                Expr::Number(0.0)
            }
        };

        Self {
            source: source.to_string(),
            expr,
            diagnostics,
        }
    }

    /// Compile a formula and report references to names outside `declared`
    pub fn compile_with_variables<S: AsRef<str>>(source: &str, declared: &[S]) -> Self {
        let mut compiled = Self::compile(source);
        let unresolved: Vec<Diagnostic> = compiled
            .expr
            .variables()
            .into_iter()
            .filter(|name| !declared.iter().any(|d| d.as_ref() == *name))
            .map(|name| Diagnostic::UnresolvedVariable {
                name: name.to_string(),
            })
            .collect();
        compiled.diagnostics.extend(unresolved);
        compiled
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True when the formula compiled without any diagnostic
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Evaluate against an environment; always finite
    pub fn evaluate<E: Environment + ?Sized>(&self, env: &E) -> f64 {
        Evaluator::new(env).evaluate(&self.expr)
    }

    /// Evaluate and add the fallback counters to `stats`
    pub fn evaluate_tracked<E: Environment + ?Sized>(&self, env: &E, stats: &mut EvalStats) -> f64 {
        let mut evaluator = Evaluator::new(env);
        let value = evaluator.evaluate(&self.expr);
        stats.merge(&evaluator.stats());
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EmptyEnvironment;

    #[test]
    fn test_compile_clean() {
        let compiled = CompiledExpression::compile_with_variables("revenue - cost", &["revenue", "cost"]);
        assert!(compiled.is_clean());
        assert_eq!(compiled.evaluate(&[("revenue", 10.0), ("cost", 4.0)][..]), 6.0);
    }

    #[test]
    fn test_compile_reports_unresolved() {
        let compiled = CompiledExpression::compile_with_variables("a + b", &["a"]);
        assert_eq!(
            compiled.diagnostics(),
            &[Diagnostic::UnresolvedVariable {
                name: "b".to_string()
            }]
        );
        assert_eq!(compiled.evaluate(&[("a", 2.0)][..]), 2.0);
    }

    #[test]
    fn test_malformed_formula_evaluates_to_zero() {
        let compiled = CompiledExpression::compile("3 * (x +");
        assert!(matches!(
            compiled.diagnostics(),
            [Diagnostic::ParseFailure { .. }]
        ));
        assert_eq!(compiled.evaluate(&EmptyEnvironment), 0.0);
    }

    #[test]
    fn test_skipped_characters_are_reported() {
        let compiled = CompiledExpression::compile("2 # 3");
        // '#' is dropped, leaving "2 3" which has trailing input
        assert!(compiled
            .diagnostics()
            .contains(&Diagnostic::SkippedCharacter { offset: 2, ch: '#' }));
        assert_eq!(compiled.evaluate(&EmptyEnvironment), 0.0);

        let compiled = CompiledExpression::compile("2 $+ 3");
        assert_eq!(compiled.evaluate(&EmptyEnvironment), 5.0);
        assert_eq!(compiled.diagnostics().len(), 1);
    }

    #[test]
    fn test_evaluate_tracked_accumulates() {
        let compiled = CompiledExpression::compile("1 / y");
        let mut stats = EvalStats::default();
        for _ in 0..3 {
            compiled.evaluate_tracked(&EmptyEnvironment, &mut stats);
        }
        assert_eq!(stats.unresolved_variables, 3);
        assert_eq!(stats.divisions_by_zero, 3);
    }
}
