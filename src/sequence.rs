//! Applying specifications and selectors to sequences.
//!
//! Two paths are offered:
//! - [`in_memory`]: trees are resolved, interpreted once per operation and
//!   applied to each element of a slice
//! - [`query`]: trees are resolved and handed, as a [`QueryPlan`], to a
//!   [`QueryEngine`] or [`AsyncQueryEngine`] for translation

pub mod in_memory;
pub mod memory_engine;
pub mod query;

pub use in_memory::SpecificationSliceExt;
pub use memory_engine::MemoryEngine;
pub use query::{AsyncQueryEngine, Query, QueryEngine, QueryPlan, Stage, Terminal};

use crate::expression::Value;

/// Group rows by key, keeping groups in first-seen key order
pub(crate) fn group_by_key<E>(
    rows: Vec<Value>,
    mut key_of: impl FnMut(&Value) -> Result<Value, E>,
) -> Result<Vec<(Value, Vec<Value>)>, E> {
    let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
    // Linear search: `Value` holds `Float64` and so is neither `Eq` nor `Hash`
    for row in rows {
        let key = key_of(&row)?;
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    Ok(groups)
}
