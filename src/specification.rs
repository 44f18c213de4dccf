//! Composable specifications and selectors.
//!
//! A specification is a reusable boolean rule over an entity type, kept as an
//! expression tree so that it can be combined, embedded in other trees and
//! still be handed to a query engine.

pub mod composite;
pub mod embed;
pub mod fusion;
pub mod predicate;
pub mod resolver;
pub mod selector;
pub mod spec;

pub use composite::{
    apply_and, apply_not, apply_or, AndSpecification, NotSpecification, OrSpecification,
    SelectedSpecification, SpecificationExt,
};
pub use fusion::{fuse, try_fuse};
pub use predicate::{
    BinaryPredicate, CompiledBinaryPredicate, CompiledPredicate, Predicate, PredicateKind,
};
pub use resolver::{resolve_embedded, resolve_lambda, EmbeddingResolver, ResolverConfig};
pub use selector::{
    CompiledProjection, ExpressionGroupSelector, ExpressionSelector, GroupBySelector, Grouping,
    KeyWithCount, Projection, Selector,
};
pub use spec::{BinarySpecification, ExpressionBinarySpec, ExpressionSpec, Specification};
