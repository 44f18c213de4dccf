//! In-memory application of specifications and selectors.

use std::collections::HashMap;
use std::hash::Hash;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, SpecError};
use crate::expression::Value;
use crate::sequence::group_by_key;
use crate::specification::selector::grouping_value;
use crate::specification::{
    fuse, CompiledPredicate, GroupBySelector, KeyWithCount, Predicate, Projection, Selector,
    Specification,
};

/// Specification-driven operations over a slice of entities.
///
/// Every operation resolves embedded trees first and interprets the result
/// once, then applies it to each element.
pub trait SpecificationSliceExt<T> {
    /// Elements satisfying `spec`; an absent spec is an error
    fn where_satisfies(&self, spec: Option<&dyn Specification<T>>) -> Result<Vec<&T>>;

    /// Elements whose selected property satisfies `spec`
    fn where_satisfies_via<U>(
        &self,
        spec: Option<&dyn Specification<U>>,
        selector: Option<&Projection<T, U>>,
    ) -> Result<Vec<&T>>;

    /// Like [`where_satisfies_via`](Self::where_satisfies_via) with a plain closure as selector
    fn where_satisfies_mapped<U, F>(
        &self,
        spec: Option<&dyn Specification<U>>,
        selector: F,
    ) -> Result<Vec<&T>>
    where
        U: Serialize,
        F: Fn(&T) -> U;

    fn count_satisfying(&self, spec: &dyn Specification<T>) -> Result<usize>;

    fn count_satisfying_via<U>(
        &self,
        spec: &dyn Specification<U>,
        selector: &Projection<T, U>,
    ) -> Result<usize>;

    fn any_satisfying(&self, spec: &dyn Specification<T>) -> Result<bool>;

    fn any_satisfying_via<U>(
        &self,
        spec: &dyn Specification<U>,
        selector: &Projection<T, U>,
    ) -> Result<bool>;

    fn first_satisfying(&self, spec: &dyn Specification<T>) -> Result<Option<&T>>;

    fn first_satisfying_via<U>(
        &self,
        spec: &dyn Specification<U>,
        selector: &Projection<T, U>,
    ) -> Result<Option<&T>>;

    /// Project every element through `selector`
    fn select_with<U: DeserializeOwned>(&self, selector: &dyn Selector<T, U>) -> Result<Vec<U>>;

    /// Count elements per selected key, in first-seen key order
    fn group_and_count<K: DeserializeOwned>(
        &self,
        selector: &dyn Selector<T, K>,
    ) -> Result<Vec<KeyWithCount<K>>>;

    /// Group by the selector's key and map each key to the group's projected result
    fn group_to_dictionary<K, V>(
        &self,
        selector: &dyn GroupBySelector<T, K, V>,
    ) -> Result<HashMap<K, V>>
    where
        K: DeserializeOwned + Eq + Hash,
        V: DeserializeOwned;

    /// Map each selected key to the number of elements carrying it
    fn group_and_count_dictionary<K>(&self, selector: &dyn Selector<T, K>) -> Result<HashMap<K, usize>>
    where
        K: DeserializeOwned + Eq + Hash;
}

impl<T: Serialize> SpecificationSliceExt<T> for [T] {
    fn where_satisfies(&self, spec: Option<&dyn Specification<T>>) -> Result<Vec<&T>> {
        let spec = spec.ok_or(SpecError::NullArgument("specification"))?;
        filter_by(self, &spec.build_expression())
    }

    fn where_satisfies_via<U>(
        &self,
        spec: Option<&dyn Specification<U>>,
        selector: Option<&Projection<T, U>>,
    ) -> Result<Vec<&T>> {
        let spec = spec.ok_or(SpecError::NullArgument("specification"))?;
        let selector = selector.ok_or(SpecError::NullArgument("selector"))?;
        filter_by(self, &fuse(selector, &spec.build_expression()))
    }

    fn where_satisfies_mapped<U, F>(
        &self,
        spec: Option<&dyn Specification<U>>,
        selector: F,
    ) -> Result<Vec<&T>>
    where
        U: Serialize,
        F: Fn(&T) -> U,
    {
        let spec = spec.ok_or(SpecError::NullArgument("specification"))?;
        let predicate = spec.build_expression();
        debug!("filtering {} elements by mapped {}", self.len(), predicate);
        let compiled = predicate.compile()?;

        let mut matched = Vec::new();
        for item in self {
            if compiled.test(&selector(item))? {
                matched.push(item);
            }
        }
        Ok(matched)
    }

    fn count_satisfying(&self, spec: &dyn Specification<T>) -> Result<usize> {
        Ok(filter_by(self, &spec.build_expression())?.len())
    }

    fn count_satisfying_via<U>(
        &self,
        spec: &dyn Specification<U>,
        selector: &Projection<T, U>,
    ) -> Result<usize> {
        Ok(filter_by(self, &fuse(selector, &spec.build_expression()))?.len())
    }

    fn any_satisfying(&self, spec: &dyn Specification<T>) -> Result<bool> {
        Ok(first_by(self, &spec.build_expression())?.is_some())
    }

    fn any_satisfying_via<U>(
        &self,
        spec: &dyn Specification<U>,
        selector: &Projection<T, U>,
    ) -> Result<bool> {
        Ok(first_by(self, &fuse(selector, &spec.build_expression()))?.is_some())
    }

    fn first_satisfying(&self, spec: &dyn Specification<T>) -> Result<Option<&T>> {
        first_by(self, &spec.build_expression())
    }

    fn first_satisfying_via<U>(
        &self,
        spec: &dyn Specification<U>,
        selector: &Projection<T, U>,
    ) -> Result<Option<&T>> {
        first_by(self, &fuse(selector, &spec.build_expression()))
    }

    fn select_with<U: DeserializeOwned>(&self, selector: &dyn Selector<T, U>) -> Result<Vec<U>> {
        let projection = selector.build_expression();
        debug!("projecting {} elements with {}", self.len(), projection);
        let compiled = projection.compile()?;
        self.iter().map(|item| compiled.apply(item)).collect()
    }

    fn group_and_count<K: DeserializeOwned>(
        &self,
        selector: &dyn Selector<T, K>,
    ) -> Result<Vec<KeyWithCount<K>>> {
        let groups = group_by_selector(self, &selector.build_expression())?;
        groups
            .into_iter()
            .map(|(key, members)| {
                Ok(KeyWithCount {
                    key: key.deserialize_into()?,
                    count: members.len(),
                })
            })
            .collect()
    }

    fn group_to_dictionary<K, V>(
        &self,
        selector: &dyn GroupBySelector<T, K, V>,
    ) -> Result<HashMap<K, V>>
    where
        K: DeserializeOwned + Eq + Hash,
        V: DeserializeOwned,
    {
        let groups = group_by_selector(self, &selector.group_by())?;
        let result = selector.build_expression().compile()?;

        let mut dictionary = HashMap::with_capacity(groups.len());
        for (key, members) in groups {
            let value = result.apply_value(grouping_value(key.clone(), members))?;
            dictionary.insert(key.deserialize_into()?, value.deserialize_into()?);
        }
        Ok(dictionary)
    }

    fn group_and_count_dictionary<K>(&self, selector: &dyn Selector<T, K>) -> Result<HashMap<K, usize>>
    where
        K: DeserializeOwned + Eq + Hash,
    {
        Ok(self
            .group_and_count(selector)?
            .into_iter()
            .map(|row| (row.key, row.count))
            .collect())
    }
}

fn compile_for<T>(items: &[T], predicate: &Predicate<T>) -> Result<CompiledPredicate<T>> {
    debug!("filtering {} elements with {}", items.len(), predicate);
    predicate.compile()
}

fn filter_by<'a, T: Serialize>(items: &'a [T], predicate: &Predicate<T>) -> Result<Vec<&'a T>> {
    let compiled = compile_for(items, predicate)?;
    let mut matched = Vec::new();
    for item in items {
        if compiled.test(item)? {
            matched.push(item);
        }
    }
    Ok(matched)
}

fn first_by<'a, T: Serialize>(items: &'a [T], predicate: &Predicate<T>) -> Result<Option<&'a T>> {
    let compiled = compile_for(items, predicate)?;
    for item in items {
        if compiled.test(item)? {
            return Ok(Some(item));
        }
    }
    Ok(None)
}

fn group_by_selector<T: Serialize, K>(
    items: &[T],
    key: &Projection<T, K>,
) -> Result<Vec<(Value, Vec<Value>)>> {
    debug!("grouping {} elements by {}", items.len(), key);
    let compiled = key.compile()?;
    let rows = items
        .iter()
        .map(|item| Ok(Value::from_serialize(item)?))
        .collect::<Result<Vec<_>>>()?;
    group_by_key(rows, |row| compiled.apply_value(row.clone()))
}
