//! Embed handles for specifications and selectors.
//!
//! Put `handle.marker()` (or `handle.invoke(args)`) inside a hand-written
//! tree; the embedding resolver replaces it with the referenced tree.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::expression::{EmbedHandle, Embeddable, Lambda};
use crate::specification::{BinarySpecification, GroupBySelector, Selector, Specification};

struct EmbeddedSpecification<T, S> {
    spec: S,
    _marker: PhantomData<fn(&T)>,
}

impl<T, S: Specification<T>> Embeddable for EmbeddedSpecification<T, S> {
    fn embedded_lambda(&self) -> Lambda {
        self.spec.build_expression().into_lambda()
    }

    fn describe(&self) -> String {
        type_name::<S>().to_string()
    }
}

struct EmbeddedBinarySpecification<T, U, S> {
    spec: S,
    _marker: PhantomData<fn(&T, &U)>,
}

impl<T, U, S: BinarySpecification<T, U>> Embeddable for EmbeddedBinarySpecification<T, U, S> {
    fn embedded_lambda(&self) -> Lambda {
        self.spec.build_expression().into_lambda()
    }

    fn describe(&self) -> String {
        type_name::<S>().to_string()
    }
}

struct EmbeddedSelector<T, U, S> {
    selector: S,
    _marker: PhantomData<fn(&T) -> U>,
}

impl<T, U, S: Selector<T, U>> Embeddable for EmbeddedSelector<T, U, S> {
    fn embedded_lambda(&self) -> Lambda {
        self.selector.build_expression().into_lambda()
    }

    fn describe(&self) -> String {
        type_name::<S>().to_string()
    }
}

struct EmbeddedGroupResult<T, K, V, S> {
    selector: S,
    _marker: PhantomData<fn(&T, &K) -> V>,
}

impl<T, K, V, S: GroupBySelector<T, K, V>> Embeddable for EmbeddedGroupResult<T, K, V, S> {
    fn embedded_lambda(&self) -> Lambda {
        self.selector.build_expression().into_lambda()
    }

    fn describe(&self) -> String {
        type_name::<S>().to_string()
    }
}

/// Handle to a specification; its marker invoked with one argument is a boolean
pub fn specification<T, S>(spec: S) -> EmbedHandle
where
    T: 'static,
    S: Specification<T> + 'static,
{
    EmbedHandle::new(Arc::new(EmbeddedSpecification {
        spec,
        _marker: PhantomData::<fn(&T)>,
    }))
}

/// Handle to a binary specification; invoke its marker with two arguments
pub fn binary_specification<T, U, S>(spec: S) -> EmbedHandle
where
    T: 'static,
    U: 'static,
    S: BinarySpecification<T, U> + 'static,
{
    EmbedHandle::new(Arc::new(EmbeddedBinarySpecification {
        spec,
        _marker: PhantomData::<fn(&T, &U)>,
    }))
}

/// Handle to a selector
pub fn selector<T, U, S>(selector: S) -> EmbedHandle
where
    T: 'static,
    U: 'static,
    S: Selector<T, U> + 'static,
{
    EmbedHandle::new(Arc::new(EmbeddedSelector {
        selector,
        _marker: PhantomData::<fn(&T) -> U>,
    }))
}

/// Handle to the result projection of a group selector
pub fn group_selector<T, K, V, S>(selector: S) -> EmbedHandle
where
    T: 'static,
    K: 'static,
    V: 'static,
    S: GroupBySelector<T, K, V> + 'static,
{
    EmbedHandle::new(Arc::new(EmbeddedGroupResult {
        selector,
        _marker: PhantomData::<fn(&T, &K) -> V>,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Expression, Method};
    use crate::specification::{ExpressionSpec, Predicate, Projection};

    struct Entity;

    #[test]
    fn test_specification_handle() {
        let spec = ExpressionSpec::new(Predicate::<Entity>::new("e", |e| e.member("active")));
        let handle = specification(spec);

        let lambda = handle.lambda();
        assert_eq!(lambda.arity(), 1);
        assert_eq!(lambda.to_string(), "e => e.active");
        assert!(handle.describe().contains("ExpressionSpec"));

        let marker = handle.marker();
        assert!(marker.is_embed_marker());
        assert!(matches!(
            handle.invoke(vec![Expression::int64(1)]),
            Expression::Invoke { .. }
        ));
    }

    #[test]
    fn test_handles_compare_by_identity() {
        let handle = selector(Projection::<Entity, Entity>::identity());
        let same = handle.clone();
        let other = selector(Projection::<Entity, Entity>::identity());
        assert_eq!(handle, same);
        assert_ne!(handle, other);
        assert!(matches!(
            handle.marker(),
            Expression::Call {
                method: Method::Embed,
                ..
            }
        ));
    }
}
