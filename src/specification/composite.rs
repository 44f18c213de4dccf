//! Specification algebra: AND, OR, NOT and their cross-type forms.
//!
//! Composites hold their operands and rebuild the combined tree on every
//! call to `build_expression`, so changes in a shared operand are always
//! picked up.

use std::sync::Arc;

use crate::expression::{substitute_parameter, Expression, Lambda};
use crate::specification::{fuse, Predicate, Selector, Specification};

/// `left && right`, with right's parameter renamed to left's
pub fn apply_and<T>(left: &Predicate<T>, right: &Predicate<T>) -> Predicate<T> {
    let rebound = rebind(right, left);
    Predicate::composed(Lambda::new(
        vec![left.parameter().clone()],
        Expression::and(left.body().clone(), rebound),
    ))
}

/// `left || right`, dropping a boolean-literal operand.
///
/// A literal left operand yields `right` unchanged, then a literal right
/// operand yields `left` unchanged.
pub fn apply_or<T>(left: &Predicate<T>, right: &Predicate<T>) -> Predicate<T> {
    if left.body().as_bool_literal().is_some() {
        return right.clone();
    }
    if right.body().as_bool_literal().is_some() {
        return left.clone();
    }
    let rebound = rebind(right, left);
    Predicate::composed(Lambda::new(
        vec![left.parameter().clone()],
        Expression::or(left.body().clone(), rebound),
    ))
}

/// `!inner`; ShowAll stays ShowAll
pub fn apply_not<T>(inner: &Predicate<T>) -> Predicate<T> {
    if inner.is_show_all() {
        return inner.clone();
    }
    Predicate::composed(Lambda::new(
        vec![inner.parameter().clone()],
        Expression::not_expr(inner.body().clone()),
    ))
}

fn rebind<T>(predicate: &Predicate<T>, onto: &Predicate<T>) -> Expression {
    substitute_parameter(
        predicate.body(),
        predicate.parameter(),
        &onto.parameter().to_expr(),
    )
}

pub struct AndSpecification<T> {
    left: Arc<dyn Specification<T>>,
    right: Arc<dyn Specification<T>>,
}

impl<T> AndSpecification<T> {
    pub fn new(left: Arc<dyn Specification<T>>, right: Arc<dyn Specification<T>>) -> Self {
        Self { left, right }
    }
}

impl<T> Specification<T> for AndSpecification<T> {
    fn build_expression(&self) -> Predicate<T> {
        apply_and(&self.left.build_expression(), &self.right.build_expression())
    }
}

pub struct OrSpecification<T> {
    left: Arc<dyn Specification<T>>,
    right: Arc<dyn Specification<T>>,
}

impl<T> OrSpecification<T> {
    pub fn new(left: Arc<dyn Specification<T>>, right: Arc<dyn Specification<T>>) -> Self {
        Self { left, right }
    }
}

impl<T> Specification<T> for OrSpecification<T> {
    fn build_expression(&self) -> Predicate<T> {
        apply_or(&self.left.build_expression(), &self.right.build_expression())
    }
}

pub struct NotSpecification<T> {
    inner: Arc<dyn Specification<T>>,
}

impl<T> NotSpecification<T> {
    pub fn new(inner: Arc<dyn Specification<T>>) -> Self {
        Self { inner }
    }
}

impl<T> Specification<T> for NotSpecification<T> {
    fn build_expression(&self) -> Predicate<T> {
        apply_not(&self.inner.build_expression())
    }
}

/// A specification over `U` applied to `T` through a selector
pub struct SelectedSpecification<T, U> {
    selector: Arc<dyn Selector<T, U>>,
    inner: Arc<dyn Specification<U>>,
}

impl<T, U> SelectedSpecification<T, U> {
    pub fn new(selector: Arc<dyn Selector<T, U>>, inner: Arc<dyn Specification<U>>) -> Self {
        Self { selector, inner }
    }
}

impl<T, U> Specification<T> for SelectedSpecification<T, U> {
    fn build_expression(&self) -> Predicate<T> {
        fuse(
            &self.selector.build_expression(),
            &self.inner.build_expression(),
        )
    }
}

/// Combinators available on every specification
pub trait SpecificationExt<T: 'static>: Specification<T> + Sized + 'static {
    fn and<S>(self, other: S) -> AndSpecification<T>
    where
        S: Specification<T> + 'static,
    {
        AndSpecification::new(Arc::new(self), Arc::new(other))
    }

    /// AND with a specification over a property reached through `selector`
    fn and_via<U, S, L>(self, other: S, selector: L) -> AndSpecification<T>
    where
        U: 'static,
        S: Specification<U> + 'static,
        L: Selector<T, U> + 'static,
    {
        let selected = SelectedSpecification::new(Arc::new(selector), Arc::new(other));
        AndSpecification::new(Arc::new(self), Arc::new(selected))
    }

    fn or<S>(self, other: S) -> OrSpecification<T>
    where
        S: Specification<T> + 'static,
    {
        OrSpecification::new(Arc::new(self), Arc::new(other))
    }

    /// OR with a specification over a property reached through `selector`
    fn or_via<U, S, L>(self, other: S, selector: L) -> OrSpecification<T>
    where
        U: 'static,
        S: Specification<U> + 'static,
        L: Selector<T, U> + 'static,
    {
        let selected = SelectedSpecification::new(Arc::new(selector), Arc::new(other));
        OrSpecification::new(Arc::new(self), Arc::new(selected))
    }

    fn not(self) -> NotSpecification<T> {
        NotSpecification::new(Arc::new(self))
    }
}

impl<T: 'static, S: Specification<T> + 'static> SpecificationExt<T> for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::{ExpressionSpec, PredicateKind, Projection};
    use serde::Serialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Serialize, Clone)]
    struct Item {
        id: String,
        sub: Sub,
    }

    #[derive(Serialize, Clone)]
    struct Sub {
        active: bool,
    }

    fn item(id: &str, active: bool) -> Item {
        Item {
            id: id.to_string(),
            sub: Sub { active },
        }
    }

    fn id_contains(needle: &str) -> ExpressionSpec<Item> {
        let needle = needle.to_string();
        ExpressionSpec::new(Predicate::new("x", move |x| {
            x.member("id").contains(Expression::string(needle))
        }))
    }

    #[test]
    fn test_and_renames_right_parameter() {
        let spec = id_contains("1").and(id_contains("2"));
        let predicate = spec.build_expression();

        let mut params = Vec::new();
        predicate.body().collect_parameters(&mut params);
        assert_eq!(params, vec![predicate.parameter().clone()]);
        assert_eq!(predicate.kind(), PredicateKind::Composed);

        assert!(spec.is_satisfied_by(&item("21", true)).unwrap());
        assert!(!spec.is_satisfied_by(&item("11", true)).unwrap());
    }

    #[test]
    fn test_and_with_show_all_is_not_simplified() {
        let spec = id_contains("1").and(ExpressionSpec::show_all());
        let predicate = spec.build_expression();
        assert!(matches!(
            predicate.body(),
            Expression::BinaryOp { .. }
        ));
        assert!(spec.is_satisfied_by(&item("1", false)).unwrap());
        assert!(!spec.is_satisfied_by(&item("2", false)).unwrap());
    }

    #[test]
    fn test_or_drops_show_all_operand() {
        let p = Arc::new(id_contains("1"));
        let p_tree = p.build_expression();

        let left_all = ExpressionSpec::<Item>::show_all().or(p.clone());
        assert_eq!(left_all.build_expression().lambda(), p_tree.lambda());

        let right_all = p.clone().or(ExpressionSpec::show_all());
        let tree = right_all.build_expression();
        assert_eq!(tree.lambda(), p_tree.lambda());
        assert_eq!(tree.kind(), PredicateKind::General);
    }

    #[test]
    fn test_or_drops_show_none_operand() {
        let spec = id_contains("1").or(ExpressionSpec::new(Predicate::show_none()));
        assert_eq!(spec.build_expression().kind(), PredicateKind::General);
        assert!(spec.is_satisfied_by(&item("1", false)).unwrap());
    }

    #[test]
    fn test_or_of_general_operands() {
        let spec = id_contains("11").or(id_contains("22"));
        assert!(spec.is_satisfied_by(&item("11", false)).unwrap());
        assert!(spec.is_satisfied_by(&item("22", false)).unwrap());
        assert!(!spec.is_satisfied_by(&item("33", false)).unwrap());
    }

    #[test]
    fn test_not_of_show_all_stays_show_all() {
        let spec = ExpressionSpec::<Item>::show_all().not();
        assert!(spec.build_expression().is_show_all());
        assert!(spec.is_satisfied_by(&item("1", false)).unwrap());
    }

    #[test]
    fn test_not() {
        let spec = id_contains("1").not();
        assert_eq!(spec.build_expression().to_string(), "x => !x.id.Contains(\"1\")");
        assert!(!spec.is_satisfied_by(&item("1", false)).unwrap());
        assert!(spec.is_satisfied_by(&item("2", false)).unwrap());
    }

    #[test]
    fn test_cross_type_composition() {
        let active = ExpressionSpec::new(Predicate::<Sub>::new("s", |s| s.member("active")));
        let selector = Projection::<Item, Sub>::new("x", |x| x.member("sub"));

        let both = id_contains("1").and_via(active, selector.clone());
        assert!(both.is_satisfied_by(&item("1", true)).unwrap());
        assert!(!both.is_satisfied_by(&item("1", false)).unwrap());
        assert!(!both.is_satisfied_by(&item("2", true)).unwrap());

        let inactive = ExpressionSpec::new(Predicate::<Sub>::new("s", |s| {
            Expression::not_expr(s.member("active"))
        }));
        let either = id_contains("1").or_via(inactive, selector);
        assert!(either.is_satisfied_by(&item("1", true)).unwrap());
        assert!(either.is_satisfied_by(&item("2", false)).unwrap());
        assert!(!either.is_satisfied_by(&item("2", true)).unwrap());
    }

    struct CountingSpec {
        builds: Arc<AtomicUsize>,
    }

    impl Specification<Item> for CountingSpec {
        fn build_expression(&self) -> Predicate<Item> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Predicate::new("x", |x| x.member("sub").member("active"))
        }
    }

    #[test]
    fn test_composites_rebuild_on_every_call() {
        let builds = Arc::new(AtomicUsize::new(0));
        let spec = id_contains("1").and(CountingSpec {
            builds: builds.clone(),
        });

        let first = spec.build_expression();
        let second = spec.build_expression();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(first.to_string(), second.to_string());
    }
}
