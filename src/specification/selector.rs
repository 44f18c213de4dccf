//! Projection trees and the selector traits built on them.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecError};
use crate::expression::{CompiledLambda, Expression, Lambda, Parameter, Value};
use crate::specification::resolver::resolve_lambda;

/// A one-parameter tree mapping `T` to `U`
pub struct Projection<T, U> {
    lambda: Lambda,
    _marker: PhantomData<fn(&T) -> U>,
}

impl<T, U> Projection<T, U> {
    /// Create a projection from a closure over the parameter node
    pub fn new(name: &str, build: impl FnOnce(Expression) -> Expression) -> Self {
        Self::wrap(Lambda::unary(name, build))
    }

    /// Wrap an existing lambda; it must take exactly one parameter
    pub fn from_lambda(lambda: Lambda) -> Result<Self> {
        if lambda.arity() != 1 {
            return Err(SpecError::ArityMismatch {
                expected: 1,
                supplied: lambda.arity(),
            });
        }
        Ok(Self::wrap(lambda))
    }

    pub(crate) fn wrap(lambda: Lambda) -> Self {
        Self {
            lambda,
            _marker: PhantomData,
        }
    }

    pub fn parameter(&self) -> &Parameter {
        &self.lambda.parameters[0]
    }

    pub fn body(&self) -> &Expression {
        &self.lambda.body
    }

    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    pub fn into_lambda(self) -> Lambda {
        self.lambda
    }

    pub fn resolve_embedded(&self) -> Result<Self> {
        Ok(Self::wrap(resolve_lambda(&self.lambda)?))
    }

    pub fn compile(&self) -> Result<CompiledProjection<T, U>> {
        let lambda = resolve_lambda(&self.lambda)?;
        Ok(CompiledProjection {
            compiled: CompiledLambda::new(lambda)?,
            _marker: PhantomData,
        })
    }
}

impl<T> Projection<T, T> {
    /// `x => x`
    pub fn identity() -> Self {
        Self::new("x", |x| x)
    }
}

impl<T, U> Clone for Projection<T, U> {
    fn clone(&self) -> Self {
        Self::wrap(self.lambda.clone())
    }
}

impl<T, U> fmt::Debug for Projection<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Projection")
            .field(&self.lambda.to_string())
            .finish()
    }
}

impl<T, U> fmt::Display for Projection<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lambda)
    }
}

/// A resolved projection ready to map entities
pub struct CompiledProjection<T, U> {
    compiled: CompiledLambda,
    _marker: PhantomData<fn(&T) -> U>,
}

impl<T, U> CompiledProjection<T, U> {
    pub fn apply_value(&self, value: Value) -> Result<Value> {
        Ok(self.compiled.invoke(vec![value])?)
    }
}

impl<T: Serialize, U: DeserializeOwned> CompiledProjection<T, U> {
    pub fn apply(&self, item: &T) -> Result<U> {
        let projected = self.apply_value(Value::from_serialize(item)?)?;
        Ok(projected.deserialize_into()?)
    }
}

/// A reusable rule mapping `T` to `U`
pub trait Selector<T, U>: Send + Sync {
    /// Build a fresh projection tree
    fn build_expression(&self) -> Projection<T, U>;
}

/// A projection is trivially its own selector
impl<T, U> Selector<T, U> for Projection<T, U> {
    fn build_expression(&self) -> Projection<T, U> {
        self.clone()
    }
}

impl<T, U, S: Selector<T, U> + ?Sized> Selector<T, U> for Arc<S> {
    fn build_expression(&self) -> Projection<T, U> {
        (**self).build_expression()
    }
}

impl<T, U, S: Selector<T, U> + ?Sized> Selector<T, U> for Box<S> {
    fn build_expression(&self) -> Projection<T, U> {
        (**self).build_expression()
    }
}

/// Selector backed by a fixed projection
pub struct ExpressionSelector<T, U> {
    projection: Projection<T, U>,
}

impl<T, U> ExpressionSelector<T, U> {
    pub fn new(projection: Projection<T, U>) -> Self {
        Self { projection }
    }
}

impl<T, U> Selector<T, U> for ExpressionSelector<T, U> {
    fn build_expression(&self) -> Projection<T, U> {
        self.projection.clone()
    }
}

/// A group of elements sharing a key, as seen by a group result projection.
///
/// In a tree the group is a record with the fields `key` and `items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping<K, T> {
    pub key: K,
    pub items: Vec<T>,
}

/// The record a [`Grouping`] becomes inside a tree
pub(crate) fn grouping_value(key: Value, items: Vec<Value>) -> Value {
    Value::Record(
        [
            ("key".to_string(), key),
            ("items".to_string(), Value::List(items)),
        ]
        .into_iter()
        .collect(),
    )
}

/// One row of a group-and-count result
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyWithCount<K> {
    pub key: K,
    pub count: usize,
}

/// Groups `T` by a key `K` and projects each group to `V`
pub trait GroupBySelector<T, K, V>: Send + Sync {
    /// Key of each element
    fn group_by(&self) -> Projection<T, K>;

    /// Result of each group
    fn build_expression(&self) -> Projection<Grouping<K, T>, V>;
}

impl<T, K, V, S: GroupBySelector<T, K, V> + ?Sized> GroupBySelector<T, K, V> for Arc<S> {
    fn group_by(&self) -> Projection<T, K> {
        (**self).group_by()
    }

    fn build_expression(&self) -> Projection<Grouping<K, T>, V> {
        (**self).build_expression()
    }
}

/// Group selector backed by fixed key and result projections
pub struct ExpressionGroupSelector<T, K, V> {
    key: Projection<T, K>,
    result: Projection<Grouping<K, T>, V>,
}

impl<T, K, V> ExpressionGroupSelector<T, K, V> {
    pub fn new(key: Projection<T, K>, result: Projection<Grouping<K, T>, V>) -> Self {
        Self { key, result }
    }
}

impl<T, K, V> GroupBySelector<T, K, V> for ExpressionGroupSelector<T, K, V> {
    fn group_by(&self) -> Projection<T, K> {
        self.key.clone()
    }

    fn build_expression(&self) -> Projection<Grouping<K, T>, V> {
        self.result.clone()
    }
}
