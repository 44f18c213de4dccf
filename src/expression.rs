//! Expression trees for predicates and projections.
//!
//! This module provides:
//! - The closed expression AST and its runtime values
//! - An interpreter that evaluates trees against parameter bindings
//! - Structural rewriting and parameter substitution
//! - Embed handles that let one tree reference another

pub mod embed;
pub mod error;
pub mod eval;
pub mod expr;
pub mod operator;
pub mod rewrite;
pub mod value;

pub use embed::{EmbedHandle, Embeddable};
pub use error::{ExpressionError, ExpressionResult};
pub use eval::{evaluate_expression, to_bool, CompiledLambda, ExpressionEvaluator, Scope};
pub use expr::{Expression, Lambda, Literal, ParamId, Parameter};
pub use operator::{BinaryOperator, Method, UnaryOperator};
pub use rewrite::{substitute_parameter, substitute_parameters, walk, ExpressionRewriter};
pub use value::{DataType, Value};
