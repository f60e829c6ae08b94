//! Condition expression language.
//!
//! Behaviors and animation blocks are gated by small predicate expressions
//! such as `#{mascot.environment.floor.isOn(mascot.anchor) && mascot.y > 100}`.
//! They are compiled once, when a pack is loaded, into an [`Expr`] tree and
//! evaluated against a [`PetSnapshot`](crate::components::pet::PetSnapshot)
//! and the [`Environment`](crate::resources::environment::Environment).
//!
//! # Surface syntax
//!
//! - optional `#{...}` / `${...}` wrapper and optional `mascot.` prefix
//! - numbers, `true`, `false`, pet and environment attributes
//! - `+ - * / %`, comparisons `< <= > >= == !=`
//! - `&& || !` or `and or not`
//! - `isOn(border)`, `environment.<border>.isOn(anchor)`, `random(p)`,
//!   `Math.random()`, `abs`, `min`, `max`

pub mod eval;
pub mod lexer;
pub mod parser;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use eval::evaluate;
pub use parser::{Attribute, CmpOp, Expr, FunctionCall, Value};

/// Errors raised while compiling a condition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("empty condition")]
    Empty,
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unexpected token '{found}' at {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("function '{name}' takes {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// A condition compiled to an expression tree, together with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPredicate {
    pub source: Arc<str>,
    pub expr: Expr,
}

impl CompiledPredicate {
    /// Predicate that never matches; stands in for a condition that failed
    /// to compile.
    pub fn always_false(source: &str) -> Self {
        Self {
            source: Arc::from(source),
            expr: Expr::Literal(Value::Bool(false)),
        }
    }
}

impl fmt::Display for CompiledPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compile a condition string.
pub fn compile(text: &str) -> Result<CompiledPredicate, CompileError> {
    let body = lexer::strip_wrapper(text);
    let tokens = lexer::tokenize(body)?;
    let expr = parser::parse(&tokens)?;
    Ok(CompiledPredicate {
        source: Arc::from(text.trim()),
        expr,
    })
}
