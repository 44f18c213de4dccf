//! Composable specifications and selectors kept as expression trees.
//!
//! Predicates and projections are built as [`expression::Expression`] trees,
//! combined with the specification algebra, embedded inside one another and
//! then either interpreted in-process or handed to a query engine.

pub mod error;
pub mod expression;
pub mod sequence;
pub mod specification;

pub use error::{Result, SpecError};
pub use sequence::{MemoryEngine, Query, QueryEngine, SpecificationSliceExt};
pub use specification::{
    ExpressionSelector, ExpressionSpec, Predicate, Projection, Selector, Specification,
    SpecificationExt,
};
