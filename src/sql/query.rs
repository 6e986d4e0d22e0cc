//! # Table Queries
//!
//! `TableQuery<T>` accumulates a predicate, orderings and paging for one
//! mapped record type and turns them into a single `select` when a terminal
//! method runs.
//!
//! ## Generated SQL
//!
//! ```text
//! select <columns> from "<table>"
//!     [ where <predicate>]
//!     [ order by "<col>"[ desc], ...]
//!     [ limit <n>]
//!     [ offset <m>]                 (offset alone: limit -1 offset <m>)
//! ```
//!
//! ## Builder Semantics
//!
//! | Method | Effect |
//! |--------|--------|
//! | `filter` | conjoins with the current predicate using `and` |
//! | `order_by` / `then_by` (+ `_desc`) | appends an ordering |
//! | `take` / `skip` | sets limit / offset |
//! | `next_take` | advances the offset by one page of `limit` rows |
//! | `deferred` | `rows()` streams instead of materializing |
//! | `select` | client-side projection after materialization |
//! | `join` | recorded, but never compiles |
//!
//! Every builder method consumes and returns the query; `Clone` gives an
//! independent copy that shares only the connection and mapping.

use std::marker::PhantomData;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::database::{Command, Connection, DeferredQuery, DeferredRows};
use crate::error::{OrmError, Result};
use crate::schema::{Record, TableMapping};
use crate::sql::compiler::ExpressionCompiler;
use crate::sql::expr::Expr;
use crate::sql::quote_identifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub column_name: String,
    pub ascending: bool,
}

/// Join recorded by `TableQuery::join`.
#[derive(Debug, Clone)]
pub struct JoinDescriptor {
    pub outer: QueryState,
    pub inner: QueryState,
    pub outer_key: Expr,
    pub inner_key: Expr,
}

#[derive(Debug, Clone, Default)]
pub struct QueryState {
    pub predicate: Option<Expr>,
    pub orderings: Option<SmallVec<[Ordering; 4]>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub join: Option<Box<JoinDescriptor>>,
    pub deferred: bool,
}

pub struct TableQuery<'conn, T> {
    conn: &'conn Connection,
    mapping: Arc<TableMapping>,
    state: QueryState,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TableQuery<'_, T> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn,
            mapping: Arc::clone(&self.mapping),
            state: self.state.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for TableQuery<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableQuery")
            .field("table", &self.mapping.table_name())
            .field("state", &self.state)
            .finish()
    }
}

impl<'conn, T: Record> TableQuery<'conn, T> {
    pub(crate) fn new(conn: &'conn Connection, mapping: Arc<TableMapping>) -> Self {
        Self {
            conn,
            mapping,
            state: QueryState::default(),
            _marker: PhantomData,
        }
    }

    pub fn mapping(&self) -> &TableMapping {
        &self.mapping
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.state.predicate = Some(match self.state.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn order_by(self, selector: Expr) -> Result<Self> {
        self.add_ordering(selector, true)
    }

    pub fn order_by_desc(self, selector: Expr) -> Result<Self> {
        self.add_ordering(selector, false)
    }

    pub fn then_by(self, selector: Expr) -> Result<Self> {
        self.add_ordering(selector, true)
    }

    pub fn then_by_desc(self, selector: Expr) -> Result<Self> {
        self.add_ordering(selector, false)
    }

    fn add_ordering(mut self, selector: Expr, ascending: bool) -> Result<Self> {
        let column_name = ExpressionCompiler::new(&self.mapping).resolve_ordering(&selector)?;
        self.state
            .orderings
            .get_or_insert_with(SmallVec::new)
            .push(Ordering {
                column_name,
                ascending,
            });
        Ok(self)
    }

    pub fn take(mut self, n: usize) -> Self {
        self.state.limit = Some(n);
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.state.offset = Some(n);
        self
    }

    /// Moves to the next page: the first call skips `limit` rows, later calls
    /// skip `limit` more.
    pub fn next_take(mut self) -> Self {
        if let Some(limit) = self.state.limit {
            self.state.offset = Some(self.state.offset.map_or(limit, |offset| offset.saturating_add(limit)));
        }
        self
    }

    pub fn deferred(mut self) -> Self {
        self.state.deferred = true;
        self
    }

    /// Projects each materialized record through `projection`.
    pub fn select<R, F>(self, projection: F) -> Selected<'conn, T, R>
    where
        F: Fn(T) -> R + 'conn,
    {
        Selected {
            query: self,
            projection: Box::new(projection),
        }
    }

    /// Records an inner join with `inner` on `outer_key = inner_key`.
    pub fn join<U: Record>(self, inner: TableQuery<'conn, U>, outer_key: Expr, inner_key: Expr) -> Joined<'conn, T, U> {
        let mut query = self;
        let outer = query.state.clone();
        query.state.join = Some(Box::new(JoinDescriptor {
            outer,
            inner: inner.state,
            outer_key,
            inner_key,
        }));
        Joined {
            query,
            _inner: PhantomData,
        }
    }

    /// Builds the select command with `select_list` as its column list.
    pub fn generate_command(&self, select_list: &str) -> Result<Command<'conn>> {
        if self.state.join.is_some() {
            return Err(OrmError::UnsupportedExpression("joins are not supported".into()));
        }

        let mut sql = format!(
            "select {} from {}",
            select_list,
            quote_identifier(self.mapping.table_name())
        );
        let mut args = Vec::new();

        if let Some(predicate) = &self.state.predicate {
            let compiled = ExpressionCompiler::new(&self.mapping).compile_predicate(predicate, &mut args)?;
            sql.push_str(" where ");
            sql.push_str(&compiled);
        }

        if let Some(orderings) = self.state.orderings.as_ref().filter(|o| !o.is_empty()) {
            let terms: Vec<String> = orderings
                .iter()
                .map(|o| {
                    let column = quote_identifier(&o.column_name);
                    if o.ascending {
                        column
                    } else {
                        format!("{} desc", column)
                    }
                })
                .collect();
            sql.push_str(" order by ");
            sql.push_str(&terms.join(", "));
        }

        match (self.state.limit, self.state.offset) {
            (Some(limit), offset) => {
                sql.push_str(&format!(" limit {}", limit));
                if let Some(offset) = offset {
                    sql.push_str(&format!(" offset {}", offset));
                }
            }
            (None, Some(offset)) => sql.push_str(&format!(" limit -1 offset {}", offset)),
            (None, None) => {}
        }

        let mut command = self.conn.create_command(sql);
        for arg in args {
            command = command.bind_value(arg);
        }
        Ok(command)
    }

    pub fn to_list(&self) -> Result<Vec<T>> {
        self.generate_command("*")?.execute_query()
    }

    /// Results as an iterator; streamed from the engine when `deferred`.
    pub fn rows(&self) -> Result<QueryRows<'conn, T>> {
        let command = self.generate_command("*")?;
        if self.state.deferred {
            Ok(QueryRows::Deferred(command.execute_deferred_query()?))
        } else {
            let mut command = command;
            Ok(QueryRows::Eager(command.execute_query()?.into_iter()))
        }
    }

    pub fn count(&self) -> Result<i64> {
        self.generate_command("count(*)")?.execute_scalar()
    }

    pub fn count_where(&self, predicate: Expr) -> Result<i64> {
        self.clone().filter(predicate).count()
    }

    pub fn element_at(&self, index: usize) -> Result<T> {
        self.clone().skip(index).take(1).first()
    }

    pub fn first(&self) -> Result<T> {
        self.first_or_default()?.ok_or_else(|| {
            OrmError::NotFound(format!("query on {} returned no rows", self.mapping.table_name()))
        })
    }

    pub fn first_or_default(&self) -> Result<Option<T>> {
        Ok(self.clone().take(1).to_list()?.into_iter().next())
    }

    pub fn first_where(&self, predicate: Expr) -> Result<T> {
        self.clone().filter(predicate).first()
    }

    pub fn first_or_default_where(&self, predicate: Expr) -> Result<Option<T>> {
        self.clone().filter(predicate).first_or_default()
    }

    /// Deletes the rows matching the predicate.
    pub fn delete(&self) -> Result<usize> {
        if self.state.limit.is_some() || self.state.offset.is_some() {
            return Err(OrmError::UnsupportedExpression(
                "cannot delete with limits or offsets".into(),
            ));
        }
        let predicate = self
            .state
            .predicate
            .as_ref()
            .ok_or_else(|| OrmError::UnsupportedExpression("no condition specified for delete".into()))?;

        let mut args = Vec::new();
        let compiled = ExpressionCompiler::new(&self.mapping).compile_predicate(predicate, &mut args)?;
        let sql = format!(
            "delete from {} where {}",
            quote_identifier(self.mapping.table_name()),
            compiled
        );
        let mut command = self.conn.create_command(sql);
        for arg in args {
            command = command.bind_value(arg);
        }
        command.execute_non_query()
    }

    pub fn delete_where(&self, predicate: Expr) -> Result<usize> {
        self.clone().filter(predicate).delete()
    }
}

/// Results of `TableQuery::rows`: materialized records, or a live statement
/// that is stepped as [`iter`](Self::iter) advances.
pub enum QueryRows<'conn, T> {
    Eager(std::vec::IntoIter<T>),
    Deferred(DeferredQuery<'conn, T>),
}

impl<T: Record> QueryRows<'_, T> {
    /// Eager results are handed out once; deferred ones rerun the query on
    /// every call.
    pub fn iter(&mut self) -> QueryRowsIter<'_, T> {
        match self {
            QueryRows::Eager(records) => QueryRowsIter::Eager(records),
            QueryRows::Deferred(query) => QueryRowsIter::Deferred(query.iter()),
        }
    }
}

impl<'q, T: Record> IntoIterator for &'q mut QueryRows<'_, T> {
    type Item = Result<T>;
    type IntoIter = QueryRowsIter<'q, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub enum QueryRowsIter<'q, T> {
    Eager(&'q mut std::vec::IntoIter<T>),
    Deferred(DeferredRows<'q, T>),
}

impl<T: Record> Iterator for QueryRowsIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            QueryRowsIter::Eager(records) => records.next().map(Ok),
            QueryRowsIter::Deferred(rows) => rows.next(),
        }
    }
}

/// A query whose records are projected client-side.
pub struct Selected<'conn, T, R> {
    query: TableQuery<'conn, T>,
    projection: Box<dyn Fn(T) -> R + 'conn>,
}

impl<T: Record, R> Selected<'_, T, R> {
    pub fn to_list(&self) -> Result<Vec<R>> {
        Ok(self
            .query
            .to_list()?
            .into_iter()
            .map(|record| (self.projection)(record))
            .collect())
    }

    pub fn first(&self) -> Result<R> {
        self.query.first().map(|record| (self.projection)(record))
    }

    pub fn first_or_default(&self) -> Result<Option<R>> {
        Ok(self.query.first_or_default()?.map(|record| (self.projection)(record)))
    }

    pub fn count(&self) -> Result<i64> {
        self.query.count()
    }
}

/// A join of two table queries. Generation always fails.
pub struct Joined<'conn, T, U> {
    query: TableQuery<'conn, T>,
    _inner: PhantomData<fn() -> U>,
}

impl<'conn, T: Record, U: Record> Joined<'conn, T, U> {
    pub fn join_descriptor(&self) -> Option<&JoinDescriptor> {
        self.query.state.join.as_deref()
    }

    pub fn generate_command(&self, select_list: &str) -> Result<Command<'conn>> {
        self.query.generate_command(select_list)
    }

    pub fn to_list(&self) -> Result<Vec<T>> {
        self.query.to_list()
    }

    pub fn count(&self) -> Result<i64> {
        self.query.count()
    }
}
