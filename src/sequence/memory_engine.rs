//! In-process query engine.
//!
//! Holds named collections of values and runs plans by interpreting their
//! trees. Like any translating backend it refuses plans that still contain
//! embed markers.

use std::collections::HashMap;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::Result;
use crate::expression::{CompiledLambda, ExpressionResult, Lambda, Value};
use crate::sequence::group_by_key;
use crate::sequence::query::{AsyncQueryEngine, Query, QueryEngine, QueryPlan, Stage, Terminal};
use crate::specification::selector::grouping_value;

/// Engine over named in-memory collections
#[derive(Debug, Default)]
pub struct MemoryEngine {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a collection of entities under `name`
    pub fn insert<T: Serialize>(&self, name: impl Into<String>, items: &[T]) -> Result<()> {
        let rows = items
            .iter()
            .map(Value::from_serialize)
            .collect::<ExpressionResult<Vec<_>>>()?;
        self.insert_values(name, rows);
        Ok(())
    }

    pub fn insert_values(&self, name: impl Into<String>, rows: Vec<Value>) {
        let name = name.into();
        debug!("registering {} rows as {}", rows.len(), name);
        self.collections.write().insert(name, rows);
    }

    /// Start a query over the collection `name`
    pub fn query<T>(&self, name: impl Into<String>) -> Query<'_, Self, T> {
        Query::new(self, name)
    }

    fn rows(&self, source: &str) -> anyhow::Result<Vec<Value>> {
        self.collections
            .read()
            .get(source)
            .cloned()
            .ok_or_else(|| anyhow!("unknown source: {}", source))
    }
}

fn compile(lambda: &Lambda) -> anyhow::Result<CompiledLambda> {
    Ok(CompiledLambda::new(lambda.clone())?)
}

fn group(rows: Vec<Value>, key: &Lambda) -> anyhow::Result<Vec<(Value, Vec<Value>)>> {
    let key = compile(key)?;
    Ok(group_by_key(rows, |row| key.invoke(vec![row.clone()]))?)
}

fn apply_stage(rows: Vec<Value>, stage: &Stage) -> anyhow::Result<Vec<Value>> {
    match stage {
        Stage::Filter(lambda) => {
            let predicate = compile(lambda)?;
            let mut kept = Vec::new();
            for row in rows {
                if predicate.test(vec![row.clone()])? {
                    kept.push(row);
                }
            }
            Ok(kept)
        }
        Stage::Select(lambda) => {
            let projection = compile(lambda)?;
            Ok(rows
                .into_iter()
                .map(|row| projection.invoke(vec![row]))
                .collect::<ExpressionResult<_>>()?)
        }
        Stage::GroupBy { key, result } => {
            let result = compile(result)?;
            Ok(group(rows, key)?
                .into_iter()
                .map(|(key, members)| result.invoke(vec![grouping_value(key, members)]))
                .collect::<ExpressionResult<_>>()?)
        }
    }
}

fn entry(key: Value, field: &str, value: Value) -> Value {
    Value::Record(
        [("key".to_string(), key), (field.to_string(), value)]
            .into_iter()
            .collect(),
    )
}

fn apply_terminal(rows: Vec<Value>, terminal: &Terminal) -> anyhow::Result<Value> {
    match terminal {
        Terminal::List => Ok(Value::List(rows)),
        Terminal::Count => Ok(Value::Int64(rows.len() as i64)),
        Terminal::Any => Ok(Value::Boolean(!rows.is_empty())),
        Terminal::First => Ok(rows.into_iter().next().unwrap_or(Value::Null)),
        Terminal::Average(lambda) => {
            let projection = compile(lambda)?;
            let mut total = 0.0;
            let mut count = 0usize;
            for row in rows {
                match projection.invoke(vec![row])? {
                    Value::Null => {}
                    value => {
                        total += value
                            .as_f64()
                            .ok_or_else(|| anyhow!("cannot average non-numeric value {}", value))?;
                        count += 1;
                    }
                }
            }
            Ok(if count == 0 {
                Value::Null
            } else {
                Value::Float64(total / count as f64)
            })
        }
        Terminal::CountByKey(key) => Ok(Value::List(
            group(rows, key)?
                .into_iter()
                .map(|(key, members)| entry(key, "count", Value::Int64(members.len() as i64)))
                .collect(),
        )),
        Terminal::Dictionary { key, value } => {
            let value = compile(value)?;
            let mut entries = Vec::new();
            for (key, members) in group(rows, key)? {
                let projected = value.invoke(vec![grouping_value(key.clone(), members)])?;
                entries.push(entry(key, "value", projected));
            }
            Ok(Value::List(entries))
        }
    }
}

impl QueryEngine for MemoryEngine {
    fn execute(&self, plan: &QueryPlan) -> anyhow::Result<Value> {
        if plan.contains_embed() {
            bail!("cannot translate plan with unresolved embed marker: {}", plan);
        }
        let mut rows = self.rows(&plan.source)?;
        for stage in &plan.stages {
            rows = apply_stage(rows, stage)?;
        }
        apply_terminal(rows, &plan.terminal)
    }
}

#[async_trait]
impl AsyncQueryEngine for MemoryEngine {
    async fn execute_async(&self, plan: &QueryPlan) -> anyhow::Result<Value> {
        self.execute(plan)
    }
}
