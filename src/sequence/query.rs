//! Translated queries.
//!
//! A [`Query`] accumulates stages over a named source without running
//! anything. Terminal operations build a [`QueryPlan`], resolve every embed
//! marker in it and hand it to the engine, which is responsible for
//! translating and executing it.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Result, SpecError};
use crate::expression::{Expression, Lambda, Value};
use crate::specification::{
    fuse, resolve_lambda, GroupBySelector, KeyWithCount, Predicate, Projection, Selector,
    Specification,
};

/// One lazy step of a query
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep rows satisfying a one-parameter predicate
    Filter(Lambda),
    /// Replace each row by a one-parameter projection of it
    Select(Lambda),
    /// Group rows by `key`, then project each `{ key, items }` group with `result`
    GroupBy { key: Lambda, result: Lambda },
}

impl Stage {
    fn lambdas(&self) -> Vec<&Lambda> {
        match self {
            Stage::Filter(lambda) | Stage::Select(lambda) => vec![lambda],
            Stage::GroupBy { key, result } => vec![key, result],
        }
    }

    fn resolve(&self) -> Result<Stage> {
        Ok(match self {
            Stage::Filter(lambda) => Stage::Filter(resolve_lambda(lambda)?),
            Stage::Select(lambda) => Stage::Select(resolve_lambda(lambda)?),
            Stage::GroupBy { key, result } => Stage::GroupBy {
                key: resolve_lambda(key)?,
                result: resolve_lambda(result)?,
            },
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Filter(lambda) => write!(f, "Where({})", lambda),
            Stage::Select(lambda) => write!(f, "Select({})", lambda),
            Stage::GroupBy { key, result } => write!(f, "GroupBy({}).Select({})", key, result),
        }
    }
}

/// What a plan produces
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    /// Every row
    List,
    /// Number of rows
    Count,
    /// Whether any row exists
    Any,
    /// The first row, or NULL
    First,
    /// Mean of a numeric projection, or NULL when there are no rows
    Average(Lambda),
    /// `{ key, count }` per distinct key
    CountByKey(Lambda),
    /// `{ key, value }` per distinct key; `value` projects the `{ key, items }` group
    Dictionary { key: Lambda, value: Lambda },
}

impl Terminal {
    fn lambdas(&self) -> Vec<&Lambda> {
        match self {
            Terminal::List | Terminal::Count | Terminal::Any | Terminal::First => vec![],
            Terminal::Average(lambda) | Terminal::CountByKey(lambda) => vec![lambda],
            Terminal::Dictionary { key, value } => vec![key, value],
        }
    }

    fn resolve(&self) -> Result<Terminal> {
        Ok(match self {
            Terminal::Average(lambda) => Terminal::Average(resolve_lambda(lambda)?),
            Terminal::CountByKey(lambda) => Terminal::CountByKey(resolve_lambda(lambda)?),
            Terminal::Dictionary { key, value } => Terminal::Dictionary {
                key: resolve_lambda(key)?,
                value: resolve_lambda(value)?,
            },
            other => other.clone(),
        })
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::List => write!(f, "ToList()"),
            Terminal::Count => write!(f, "Count()"),
            Terminal::Any => write!(f, "Any()"),
            Terminal::First => write!(f, "FirstOrDefault()"),
            Terminal::Average(lambda) => write!(f, "Average({})", lambda),
            Terminal::CountByKey(lambda) => write!(f, "CountBy({})", lambda),
            Terminal::Dictionary { key, value } => write!(f, "ToDictionary({}, {})", key, value),
        }
    }
}

/// Everything an engine needs to run a query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub source: String,
    pub stages: Vec<Stage>,
    pub terminal: Terminal,
}

impl QueryPlan {
    /// Whether any lambda of the plan still holds an embed marker
    pub fn contains_embed(&self) -> bool {
        self.stages
            .iter()
            .flat_map(Stage::lambdas)
            .chain(self.terminal.lambdas())
            .any(|lambda| lambda.body.contains_embed())
    }

    /// Copy of this plan with every embed marker resolved
    pub fn resolve(&self) -> Result<QueryPlan> {
        Ok(QueryPlan {
            source: self.source.clone(),
            stages: self
                .stages
                .iter()
                .map(Stage::resolve)
                .collect::<Result<_>>()?,
            terminal: self.terminal.resolve()?,
        })
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        for stage in &self.stages {
            write!(f, ".{}", stage)?;
        }
        write!(f, ".{}", self.terminal)
    }
}

/// Backend that translates and runs plans synchronously
pub trait QueryEngine {
    fn execute(&self, plan: &QueryPlan) -> anyhow::Result<Value>;
}

/// Backend that translates and runs plans asynchronously
#[async_trait]
pub trait AsyncQueryEngine: Send + Sync {
    async fn execute_async(&self, plan: &QueryPlan) -> anyhow::Result<Value>;
}

/// A lazy query over rows of type `T` from one engine source
pub struct Query<'e, E: ?Sized, T> {
    engine: &'e E,
    source: String,
    stages: Vec<Stage>,
    _marker: PhantomData<fn() -> T>,
}

impl<'e, E: ?Sized, T> Clone for Query<'e, E, T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine,
            source: self.source.clone(),
            stages: self.stages.clone(),
            _marker: PhantomData,
        }
    }
}

impl<'e, E: ?Sized, T> Query<'e, E, T> {
    pub fn new(engine: &'e E, source: impl Into<String>) -> Self {
        Self {
            engine,
            source: source.into(),
            stages: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn push<U>(self, stage: Stage) -> Query<'e, E, U> {
        let mut stages = self.stages;
        stages.push(stage);
        Query {
            engine: self.engine,
            source: self.source,
            stages,
            _marker: PhantomData,
        }
    }

    /// Filter by a hand-written predicate, which may embed specifications
    pub fn filter(self, predicate: Predicate<T>) -> Self {
        self.push(Stage::Filter(predicate.into_lambda()))
    }

    /// Filter by a specification; an absent one leaves the query unchanged
    pub fn where_spec(self, spec: Option<&dyn Specification<T>>) -> Self {
        match spec {
            Some(spec) => self.filter(spec.build_expression()),
            None => self,
        }
    }

    /// Filter by a specification over a selected property; either input
    /// absent leaves the query unchanged
    pub fn where_via<U>(
        self,
        spec: Option<&dyn Specification<U>>,
        selector: Option<&Projection<T, U>>,
    ) -> Self {
        match (spec, selector) {
            (Some(spec), Some(selector)) => self.filter(fuse(selector, &spec.build_expression())),
            _ => self,
        }
    }

    /// Project by a hand-written projection, which may embed selectors
    pub fn map<U>(self, projection: Projection<T, U>) -> Query<'e, E, U> {
        self.push(Stage::Select(projection.into_lambda()))
    }

    pub fn select<U>(self, selector: &dyn Selector<T, U>) -> Query<'e, E, U> {
        self.map(selector.build_expression())
    }

    /// Project through `additional` first, then through `selector`
    pub fn select_via<U, V>(
        self,
        selector: &dyn Selector<U, V>,
        additional: &dyn Selector<T, U>,
    ) -> Query<'e, E, V> {
        self.select(additional).select(selector)
    }

    pub fn group_and_select<K, V>(self, selector: &dyn GroupBySelector<T, K, V>) -> Query<'e, E, V> {
        self.push(Stage::GroupBy {
            key: selector.group_by().into_lambda(),
            result: selector.build_expression().into_lambda(),
        })
    }

    pub fn group_and_count<K>(self, selector: &dyn Selector<T, K>) -> Query<'e, E, KeyWithCount<K>> {
        let result = Lambda::unary("g", |g| {
            Expression::record(vec![
                ("key", g.clone().member("key")),
                ("count", g.member("items").count()),
            ])
        });
        self.push(Stage::GroupBy {
            key: selector.build_expression().into_lambda(),
            result,
        })
    }

    /// The resolved plan a terminal operation would hand to the engine
    pub fn plan(&self, terminal: Terminal) -> Result<QueryPlan> {
        QueryPlan {
            source: self.source.clone(),
            stages: self.stages.clone(),
            terminal,
        }
        .resolve()
    }

    fn filtered_via<U>(&self, spec: &dyn Specification<U>, selector: &Projection<T, U>) -> Self {
        self.clone().filter(fuse(selector, &spec.build_expression()))
    }
}

#[derive(Deserialize)]
struct Entry<K, V> {
    key: K,
    value: V,
}

fn decode<R: DeserializeOwned>(value: Value) -> Result<R> {
    Ok(value.deserialize_into()?)
}

fn decode_dictionary<K, V>(value: Value) -> Result<HashMap<K, V>>
where
    K: DeserializeOwned + Eq + Hash,
    V: DeserializeOwned,
{
    let entries: Vec<Entry<K, V>> = decode(value)?;
    Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
}

fn decode_counts<K>(value: Value) -> Result<HashMap<K, usize>>
where
    K: DeserializeOwned + Eq + Hash,
{
    let rows: Vec<KeyWithCount<K>> = decode(value)?;
    Ok(rows.into_iter().map(|row| (row.key, row.count)).collect())
}

fn dictionary_terminal<T, K, V>(selector: &dyn GroupBySelector<T, K, V>) -> Terminal {
    Terminal::Dictionary {
        key: selector.group_by().into_lambda(),
        value: selector.build_expression().into_lambda(),
    }
}

impl<'e, E: QueryEngine + ?Sized, T> Query<'e, E, T> {
    fn run(&self, terminal: Terminal) -> Result<Value> {
        let plan = self.plan(terminal)?;
        debug!("executing {}", plan);
        self.engine.execute(&plan).map_err(SpecError::Engine)
    }

    pub fn to_list(&self) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        decode(self.run(Terminal::List)?)
    }

    pub fn count(&self) -> Result<usize> {
        decode(self.run(Terminal::Count)?)
    }

    pub fn count_via<U>(&self, spec: &dyn Specification<U>, selector: &Projection<T, U>) -> Result<usize> {
        self.filtered_via(spec, selector).count()
    }

    pub fn any(&self) -> Result<bool> {
        decode(self.run(Terminal::Any)?)
    }

    pub fn any_via<U>(&self, spec: &dyn Specification<U>, selector: &Projection<T, U>) -> Result<bool> {
        self.filtered_via(spec, selector).any()
    }

    pub fn first(&self) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        decode(self.run(Terminal::First)?)
    }

    pub fn first_via<U>(
        &self,
        spec: &dyn Specification<U>,
        selector: &Projection<T, U>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.filtered_via(spec, selector).first()
    }

    /// Mean of a numeric projection; `None` when there are no rows
    pub fn average(&self, selector: &Projection<T, f64>) -> Result<Option<f64>> {
        decode(self.run(Terminal::Average(selector.lambda().clone()))?)
    }

    pub fn group_to_dictionary<K, V>(
        &self,
        selector: &dyn GroupBySelector<T, K, V>,
    ) -> Result<HashMap<K, V>>
    where
        K: DeserializeOwned + Eq + Hash,
        V: DeserializeOwned,
    {
        decode_dictionary(self.run(dictionary_terminal(selector))?)
    }

    pub fn group_and_count_dictionary<K>(&self, selector: &dyn Selector<T, K>) -> Result<HashMap<K, usize>>
    where
        K: DeserializeOwned + Eq + Hash,
    {
        let key = selector.build_expression().into_lambda();
        decode_counts(self.run(Terminal::CountByKey(key))?)
    }
}

impl<'e, E: AsyncQueryEngine + ?Sized, T> Query<'e, E, T> {
    async fn run_async(&self, terminal: Terminal) -> Result<Value> {
        let plan = self.plan(terminal)?;
        debug!("executing {} asynchronously", plan);
        self.engine
            .execute_async(&plan)
            .await
            .map_err(SpecError::Engine)
    }

    pub async fn to_list_async(&self) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        decode(self.run_async(Terminal::List).await?)
    }

    pub async fn count_async(&self) -> Result<usize> {
        decode(self.run_async(Terminal::Count).await?)
    }

    pub async fn any_async(&self) -> Result<bool> {
        decode(self.run_async(Terminal::Any).await?)
    }

    pub async fn first_async(&self) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        decode(self.run_async(Terminal::First).await?)
    }

    pub async fn average_async(&self, selector: &Projection<T, f64>) -> Result<Option<f64>> {
        decode(
            self.run_async(Terminal::Average(selector.lambda().clone()))
                .await?,
        )
    }

    pub async fn group_to_dictionary_async<K, V>(
        &self,
        selector: &dyn GroupBySelector<T, K, V>,
    ) -> Result<HashMap<K, V>>
    where
        K: DeserializeOwned + Eq + Hash,
        V: DeserializeOwned,
    {
        let terminal = dictionary_terminal(selector);
        decode_dictionary(self.run_async(terminal).await?)
    }

    pub async fn group_and_count_dictionary_async<K>(
        &self,
        selector: &dyn Selector<T, K>,
    ) -> Result<HashMap<K, usize>>
    where
        K: DeserializeOwned + Eq + Hash,
    {
        let key = selector.build_expression().into_lambda();
        decode_counts(self.run_async(Terminal::CountByKey(key)).await?)
    }
}
