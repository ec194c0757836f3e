//! Expression evaluation
//!
//! Evaluation is total: it always produces a finite `f64`. Unresolved
//! variables read as 0, division by zero yields 0, and a non-finite final
//! result is coerced to 0. The evaluator counts each of these so callers can
//! surface them.
//!
//! Evaluation recurses once per tree level; parsed trees are at most
//! [`MAX_TREE_HEIGHT`](crate::parser::MAX_TREE_HEIGHT) tall.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use serde::{Deserialize, Serialize};

use crate::ast::*;

/// Provides variable values during evaluation
pub trait Environment {
    /// Value bound to `name`, if any
    fn lookup(&self, name: &str) -> Option<f64>;
}

impl<K, S> Environment for HashMap<K, f64, S>
where
    K: Borrow<str> + Hash + Eq,
    S: BuildHasher,
{
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl<K: Borrow<str> + Ord> Environment for BTreeMap<K, f64> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl Environment for [(&str, f64)] {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }
}

/// An environment with no bindings
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnvironment;

impl Environment for EmptyEnvironment {
    fn lookup(&self, _name: &str) -> Option<f64> {
        None
    }
}

/// Counters for the permissive fallbacks taken while evaluating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalStats {
    /// Variable references with no binding (read as 0)
    pub unresolved_variables: u64,
    /// Divisions whose divisor was 0 (yielded 0)
    pub divisions_by_zero: u64,
    /// Final results that were NaN or infinite (coerced to 0)
    pub non_finite_results: u64,
}

impl EvalStats {
    /// True when no fallback was taken
    pub fn is_clean(&self) -> bool {
        *self == EvalStats::default()
    }

    /// Add another set of counters into this one
    pub fn merge(&mut self, other: &EvalStats) {
        self.unresolved_variables += other.unresolved_variables;
        self.divisions_by_zero += other.divisions_by_zero;
        self.non_finite_results += other.non_finite_results;
    }
}

/// Evaluator for arithmetic expressions
pub struct Evaluator<'a, E: Environment + ?Sized> {
    env: &'a E,
    stats: EvalStats,
}

impl<'a, E: Environment + ?Sized> Evaluator<'a, E> {
    /// Create a new evaluator
    pub fn new(env: &'a E) -> Self {
        Self {
            env,
            stats: EvalStats::default(),
        }
    }

    /// Evaluate an expression to a finite value
    pub fn evaluate(&mut self, expr: &Expr) -> f64 {
        let value = self.evaluate_node(expr);
        if value.is_finite() {
            value
        } else {
            self.stats.non_finite_results += 1;
            0.0
        }
    }

    /// Counters accumulated over every call to [`Evaluator::evaluate`]
    pub fn stats(&self) -> EvalStats {
        self.stats
    }

    fn evaluate_node(&mut self, expr: &Expr) -> f64 {
        match expr {
            Expr::Number(n) => *n,

            Expr::Variable(name) => match self.env.lookup(name) {
                Some(value) => value,
                None => {
                    self.stats.unresolved_variables += 1;
                    0.0
                }
            },

            Expr::Neg(inner) => -self.evaluate_node(inner),

            Expr::Binary { op, lhs, rhs } => {
                let l = self.evaluate_node(lhs);
                let r = self.evaluate_node(rhs);
                if *op == BinaryOp::Div && r == 0.0 {
                    self.stats.divisions_by_zero += 1;
                }
                op.apply(l, r)
            }

            Expr::Call { func, arg } => {
                let x = self.evaluate_node(arg);
                func.apply(x)
            }
        }
    }
}

/// Evaluate an expression against an environment. Never fails.
pub fn evaluate<E: Environment + ?Sized>(expr: &Expr, env: &E) -> f64 {
    Evaluator::new(env).evaluate(expr)
}
