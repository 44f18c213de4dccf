//! Specification traits and their leaf implementations.

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::specification::{BinaryPredicate, Predicate};

/// A reusable boolean rule over `T`
pub trait Specification<T>: Send + Sync {
    /// Build a fresh predicate tree. Called again on every use.
    fn build_expression(&self) -> Predicate<T>;

    /// Evaluate the rule in-process against one entity
    fn is_satisfied_by(&self, item: &T) -> Result<bool>
    where
        T: Serialize,
    {
        self.build_expression().compile()?.test(item)
    }
}

/// A reusable boolean rule over a pair `(T, U)`
pub trait BinarySpecification<T, U>: Send + Sync {
    fn build_expression(&self) -> BinaryPredicate<T, U>;

    fn is_satisfied_by(&self, first: &T, second: &U) -> Result<bool>
    where
        T: Serialize,
        U: Serialize,
    {
        self.build_expression().compile()?.test(first, second)
    }
}

impl<T> Specification<T> for Predicate<T> {
    fn build_expression(&self) -> Predicate<T> {
        self.clone()
    }
}

impl<T, S: Specification<T> + ?Sized> Specification<T> for Arc<S> {
    fn build_expression(&self) -> Predicate<T> {
        (**self).build_expression()
    }
}

impl<T, S: Specification<T> + ?Sized> Specification<T> for Box<S> {
    fn build_expression(&self) -> Predicate<T> {
        (**self).build_expression()
    }
}

impl<T, U, S: BinarySpecification<T, U> + ?Sized> BinarySpecification<T, U> for Arc<S> {
    fn build_expression(&self) -> BinaryPredicate<T, U> {
        (**self).build_expression()
    }
}

/// Specification backed by a fixed predicate; no predicate means ShowAll
pub struct ExpressionSpec<T> {
    predicate: Option<Predicate<T>>,
}

impl<T> ExpressionSpec<T> {
    pub fn new(predicate: Predicate<T>) -> Self {
        Self {
            predicate: Some(predicate),
        }
    }

    pub fn from_option(predicate: Option<Predicate<T>>) -> Self {
        Self { predicate }
    }

    pub fn show_all() -> Self {
        Self { predicate: None }
    }
}

impl<T> Specification<T> for ExpressionSpec<T> {
    fn build_expression(&self) -> Predicate<T> {
        self.predicate.clone().unwrap_or_else(Predicate::show_all)
    }
}

pub struct ExpressionBinarySpec<T, U> {
    predicate: Option<BinaryPredicate<T, U>>,
}

impl<T, U> ExpressionBinarySpec<T, U> {
    pub fn new(predicate: BinaryPredicate<T, U>) -> Self {
        Self {
            predicate: Some(predicate),
        }
    }

    pub fn show_all() -> Self {
        Self { predicate: None }
    }
}

impl<T, U> BinarySpecification<T, U> for ExpressionBinarySpec<T, U> {
    fn build_expression(&self) -> BinaryPredicate<T, U> {
        self.predicate
            .clone()
            .unwrap_or_else(BinaryPredicate::show_all)
    }
}
