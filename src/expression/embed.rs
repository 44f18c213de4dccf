//! Handles carried by embed markers.
//!
//! A marker's argument is a literal holding an [`EmbedHandle`]: a shared
//! reference to something that can rebuild its expression tree on demand.

use std::fmt;
use std::sync::Arc;

use crate::expression::{Expression, Lambda, Method, Value};

/// Anything whose tree can be inlined by the embedding resolver
pub trait Embeddable: Send + Sync {
    /// Rebuild the referenced tree
    fn embedded_lambda(&self) -> Lambda;

    /// Short label used in logs and error messages
    fn describe(&self) -> String;
}

/// Shared reference to an embeddable specification or selector
#[derive(Clone)]
pub struct EmbedHandle {
    target: Arc<dyn Embeddable>,
}

impl EmbedHandle {
    pub fn new(target: Arc<dyn Embeddable>) -> Self {
        Self { target }
    }

    pub fn lambda(&self) -> Lambda {
        self.target.embedded_lambda()
    }

    pub fn describe(&self) -> String {
        self.target.describe()
    }

    /// The marker in direct-call form: `Embed(handle)`
    pub fn marker(&self) -> Expression {
        Expression::call(
            Method::Embed,
            vec![Expression::literal(Value::Embedded(self.clone()))],
        )
    }

    /// The marker invoked with arguments: `Embed(handle)(args...)`
    pub fn invoke(&self, args: Vec<Expression>) -> Expression {
        Expression::invoke(self.marker(), args)
    }
}

impl PartialEq for EmbedHandle {
    fn eq(&self, other: &Self) -> bool {
        // Compare data pointers only; vtables may be duplicated across codegen units.
        std::ptr::eq(
            Arc::as_ptr(&self.target) as *const (),
            Arc::as_ptr(&other.target) as *const (),
        )
    }
}

impl fmt::Debug for EmbedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EmbedHandle")
            .field(&self.target.describe())
            .finish()
    }
}

impl fmt::Display for EmbedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.target.describe())
    }
}
