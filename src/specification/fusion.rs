//! Property-path fusion: a predicate over `U` seen through a projection `T -> U`.

use crate::error::{Result, SpecError};
use crate::expression::{substitute_parameter, Lambda};
use crate::specification::{Predicate, Projection};

/// Fuse `selector` and `predicate` into a predicate over `T`.
///
/// The predicate's parameter is replaced by the selector's body, and the
/// selector's parameter becomes the parameter of the result.
pub fn fuse<T, U>(selector: &Projection<T, U>, predicate: &Predicate<U>) -> Predicate<T> {
    let body = substitute_parameter(predicate.body(), predicate.parameter(), selector.body());
    Predicate::composed(Lambda::new(vec![selector.parameter().clone()], body))
}

/// [`fuse`] over inputs that may be absent
pub fn try_fuse<T, U>(
    selector: Option<&Projection<T, U>>,
    predicate: Option<&Predicate<U>>,
) -> Result<Predicate<T>> {
    let selector = selector.ok_or(SpecError::NullArgument("selector"))?;
    let predicate = predicate.ok_or(SpecError::NullArgument("predicate"))?;
    Ok(fuse(selector, predicate))
}
