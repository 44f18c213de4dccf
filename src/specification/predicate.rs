//! Typed predicate trees.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;

use crate::error::{Result, SpecError};
use crate::expression::{CompiledLambda, Expression, Lambda, Parameter, Value};
use crate::specification::resolver::resolve_lambda;

/// How a predicate came to be, recorded when it is constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    /// Written by hand
    General,
    /// Body is the boolean literal; `Literal(true)` is ShowAll
    Literal(bool),
    /// Produced by the specification algebra
    Composed,
}

impl PredicateKind {
    fn of(lambda: &Lambda, fallback: PredicateKind) -> PredicateKind {
        match lambda.body.as_bool_literal() {
            Some(b) => PredicateKind::Literal(b),
            None => fallback,
        }
    }
}

fn check_arity(lambda: &Lambda, expected: usize) -> Result<()> {
    if lambda.arity() != expected {
        return Err(SpecError::ArityMismatch {
            expected,
            supplied: lambda.arity(),
        });
    }
    Ok(())
}

/// A one-parameter boolean tree over `T`
pub struct Predicate<T> {
    lambda: Lambda,
    kind: PredicateKind,
    _marker: PhantomData<fn(&T)>,
}

impl<T> Predicate<T> {
    /// Create a predicate from a closure over the parameter node
    pub fn new(name: &str, build: impl FnOnce(Expression) -> Expression) -> Self {
        Self::tagged(Lambda::unary(name, build), PredicateKind::General)
    }

    /// Wrap an existing lambda; it must take exactly one parameter
    pub fn from_lambda(lambda: Lambda) -> Result<Self> {
        check_arity(&lambda, 1)?;
        Ok(Self::tagged(lambda, PredicateKind::General))
    }

    /// `x => true`
    pub fn show_all() -> Self {
        Self::new("x", |_| Expression::bool(true))
    }

    /// `x => false`
    pub fn show_none() -> Self {
        Self::new("x", |_| Expression::bool(false))
    }

    pub(crate) fn composed(lambda: Lambda) -> Self {
        Self::tagged(lambda, PredicateKind::Composed)
    }

    fn tagged(lambda: Lambda, fallback: PredicateKind) -> Self {
        Self {
            kind: PredicateKind::of(&lambda, fallback),
            lambda,
            _marker: PhantomData,
        }
    }

    pub fn kind(&self) -> PredicateKind {
        self.kind
    }

    pub fn is_show_all(&self) -> bool {
        self.kind == PredicateKind::Literal(true)
    }

    pub fn is_show_none(&self) -> bool {
        self.kind == PredicateKind::Literal(false)
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

    /// Inline every embedded specification or selector
    pub fn resolve_embedded(&self) -> Result<Self> {
        let lambda = resolve_lambda(&self.lambda)?;
        let fallback = match self.kind {
            PredicateKind::Composed => PredicateKind::Composed,
            _ => PredicateKind::General,
        };
        Ok(Self::tagged(lambda, fallback))
    }

    /// Resolve embeddings and prepare the tree for evaluation
    pub fn compile(&self) -> Result<CompiledPredicate<T>> {
        let lambda = resolve_lambda(&self.lambda)?;
        Ok(CompiledPredicate {
            compiled: CompiledLambda::new(lambda)?,
            _marker: PhantomData,
        })
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            lambda: self.lambda.clone(),
            kind: self.kind,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("kind", &self.kind)
            .field("lambda", &self.lambda.to_string())
            .finish()
    }
}

impl<T> fmt::Display for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lambda)
    }
}

/// A resolved predicate ready to test entities
pub struct CompiledPredicate<T> {
    compiled: CompiledLambda,
    _marker: PhantomData<fn(&T)>,
}

impl<T> CompiledPredicate<T> {
    pub fn test_value(&self, value: Value) -> Result<bool> {
        Ok(self.compiled.test(vec![value])?)
    }
}

impl<T: Serialize> CompiledPredicate<T> {
    pub fn test(&self, item: &T) -> Result<bool> {
        self.test_value(Value::from_serialize(item)?)
    }
}

/// A two-parameter boolean tree over `(T, U)`
pub struct BinaryPredicate<T, U> {
    lambda: Lambda,
    kind: PredicateKind,
    _marker: PhantomData<fn(&T, &U)>,
}

impl<T, U> BinaryPredicate<T, U> {
    pub fn new(
        names: (&str, &str),
        build: impl FnOnce(Expression, Expression) -> Expression,
    ) -> Self {
        Self::tagged(Lambda::binary(names, build))
    }

    /// Wrap an existing lambda; it must take exactly two parameters
    pub fn from_lambda(lambda: Lambda) -> Result<Self> {
        check_arity(&lambda, 2)?;
        Ok(Self::tagged(lambda))
    }

    pub fn show_all() -> Self {
        Self::new(("x", "y"), |_, _| Expression::bool(true))
    }

    pub fn show_none() -> Self {
        Self::new(("x", "y"), |_, _| Expression::bool(false))
    }

    fn tagged(lambda: Lambda) -> Self {
        Self {
            kind: PredicateKind::of(&lambda, PredicateKind::General),
            lambda,
            _marker: PhantomData,
        }
    }

    pub fn kind(&self) -> PredicateKind {
        self.kind
    }

    pub fn is_show_all(&self) -> bool {
        self.kind == PredicateKind::Literal(true)
    }

    pub fn parameters(&self) -> (&Parameter, &Parameter) {
        (&self.lambda.parameters[0], &self.lambda.parameters[1])
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
        Ok(Self::tagged(resolve_lambda(&self.lambda)?))
    }

    pub fn compile(&self) -> Result<CompiledBinaryPredicate<T, U>> {
        let lambda = resolve_lambda(&self.lambda)?;
        Ok(CompiledBinaryPredicate {
            compiled: CompiledLambda::new(lambda)?,
            _marker: PhantomData,
        })
    }
}

impl<T, U> Clone for BinaryPredicate<T, U> {
    fn clone(&self) -> Self {
        Self {
            lambda: self.lambda.clone(),
            kind: self.kind,
            _marker: PhantomData,
        }
    }
}

impl<T, U> fmt::Debug for BinaryPredicate<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryPredicate")
            .field("kind", &self.kind)
            .field("lambda", &self.lambda.to_string())
            .finish()
    }
}

pub struct CompiledBinaryPredicate<T, U> {
    compiled: CompiledLambda,
    _marker: PhantomData<fn(&T, &U)>,
}

impl<T: Serialize, U: Serialize> CompiledBinaryPredicate<T, U> {
    pub fn test(&self, first: &T, second: &U) -> Result<bool> {
        let args = vec![Value::from_serialize(first)?, Value::from_serialize(second)?];
        Ok(self.compiled.test(args)?)
    }
}
