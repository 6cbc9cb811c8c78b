//! INSERT, UPDATE and DELETE query builders.

use super::binding::Binding;
use super::{parse_row, run, FromRow};
use crate::column::ColumnName;
use crate::context::Context;
use crate::executor::{LifeError, LifeExecutor};
use crate::filter::Where;
use crate::selector::{Filterable, RenderOptions, Selector};
use crate::value::FilterValue;
use may_postgres::Row;
use sea_query::{
    Condition, ConditionalStatement, DeleteStatement, Expr, InsertStatement, IntoCondition,
    IntoTableRef, PostgresQueryBuilder, Query, UpdateStatement, Values,
};

fn value_expr(value: impl Into<FilterValue>) -> Expr {
    Expr::val(value.into().to_sea_value())
}

/// Query builder for inserting rows
///
/// ```no_run
/// use lifeguard_scope::{Context, Querier};
///
/// # fn run(querier: &Querier) -> Result<(), lifeguard_scope::LifeError> {
/// let ctx = Context::background();
/// let row = querier
///     .new_insert_query(&ctx)
///     .into_table("users")
///     .columns(["name", "email"])
///     .values(["Alice", "alice@example.com"])?
///     .returning(["id"])
///     .returning_one()?;
/// let id: i64 = row.get(0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InsertQuery {
    statement: InsertStatement,
    binding: Binding,
    ctx: Context,
    has_returning: bool,
}

impl InsertQuery {
    pub(crate) fn new(binding: Binding, ctx: Context) -> Self {
        Self {
            statement: Query::insert(),
            binding,
            ctx,
            has_returning: false,
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn into_table<T: IntoTableRef>(mut self, table: T) -> Self {
        self.statement.into_table(table);
        self
    }

    pub fn columns<C: Into<ColumnName>>(mut self, columns: impl IntoIterator<Item = C>) -> Self {
        self.statement
            .columns(columns.into_iter().map(|c| c.into().iden()));
        self
    }

    /// Append one row of values, in column order.
    ///
    /// # Errors
    ///
    /// Returns `LifeError::QueryError` if the row length differs from the column list.
    pub fn values<V: Into<FilterValue>>(
        mut self,
        row: impl IntoIterator<Item = V>,
    ) -> Result<Self, LifeError> {
        self.statement
            .values(row.into_iter().map(value_expr))
            .map_err(|e| LifeError::QueryError(e.to_string()))?;
        Ok(self)
    }

    /// Columns to return from [`returning_one`](Self::returning_one).
    pub fn returning<C: Into<ColumnName>>(mut self, columns: impl IntoIterator<Item = C>) -> Self {
        for column in columns {
            self.statement.returning_col(column.into().iden());
        }
        self.has_returning = true;
        self
    }

    pub fn statement(&self) -> &InsertStatement {
        &self.statement
    }

    pub fn statement_mut(&mut self) -> &mut InsertStatement {
        &mut self.statement
    }

    pub fn build(&self) -> (String, Values) {
        self.statement.build(PostgresQueryBuilder)
    }

    /// Execute and return the number of rows inserted.
    pub fn exec(self) -> Result<u64, LifeError> {
        let (sql, values) = self.build();
        run(&self.ctx, &values, |params| self.binding.execute(&sql, params))
    }

    /// Execute and return the inserted row. Returns every column unless
    /// [`returning`](Self::returning) chose some.
    pub fn returning_one(mut self) -> Result<Row, LifeError> {
        if !self.has_returning {
            self.statement.returning_all();
        }
        let (sql, values) = self.build();
        run(&self.ctx, &values, |params| self.binding.query_one(&sql, params))
    }

    pub fn returning_one_as<T: FromRow>(self) -> Result<T, LifeError> {
        parse_row(&self.returning_one()?)
    }
}

/// Query builder for updating rows
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    statement: UpdateStatement,
    binding: Binding,
    ctx: Context,
    options: RenderOptions,
}

impl UpdateQuery {
    pub(crate) fn new(binding: Binding, ctx: Context, options: RenderOptions) -> Self {
        Self {
            statement: Query::update(),
            binding,
            ctx,
            options,
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn table<T: IntoTableRef>(mut self, table: T) -> Self {
        self.statement.table(table);
        self
    }

    /// `SET column = value`
    pub fn value(mut self, column: impl Into<ColumnName>, value: impl Into<FilterValue>) -> Self {
        self.statement.value(column.into().iden(), value_expr(value));
        self
    }

    pub fn filter<F: IntoCondition>(mut self, condition: F) -> Self {
        self.statement.cond_where(condition.into_condition());
        self
    }

    pub fn apply(mut self, selector: &Selector) -> Self {
        selector.apply_to(&mut self);
        self
    }

    /// Apply the filter's conditions. Projection, paging and ordering do not
    /// apply to an UPDATE.
    pub fn apply_where(mut self, filter: &Where) -> Self {
        filter.apply_where(&mut self);
        self
    }

    pub fn statement(&self) -> &UpdateStatement {
        &self.statement
    }

    pub fn statement_mut(&mut self) -> &mut UpdateStatement {
        &mut self.statement
    }

    pub fn build(&self) -> (String, Values) {
        self.statement.build(PostgresQueryBuilder)
    }

    /// Execute and return the number of rows updated.
    pub fn exec(self) -> Result<u64, LifeError> {
        let (sql, values) = self.build();
        run(&self.ctx, &values, |params| self.binding.execute(&sql, params))
    }
}

impl Filterable for UpdateQuery {
    fn add_condition(&mut self, condition: Condition) {
        self.statement.cond_where(condition);
    }

    fn render_options(&self) -> RenderOptions {
        self.options
    }
}

/// Query builder for deleting rows
#[derive(Debug, Clone)]
pub struct DeleteQuery {
    statement: DeleteStatement,
    binding: Binding,
    ctx: Context,
    options: RenderOptions,
}

impl DeleteQuery {
    pub(crate) fn new(binding: Binding, ctx: Context, options: RenderOptions) -> Self {
        Self {
            statement: Query::delete(),
            binding,
            ctx,
            options,
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn from_table<T: IntoTableRef>(mut self, table: T) -> Self {
        self.statement.from_table(table);
        self
    }

    pub fn filter<F: IntoCondition>(mut self, condition: F) -> Self {
        self.statement.cond_where(condition.into_condition());
        self
    }

    pub fn apply(mut self, selector: &Selector) -> Self {
        selector.apply_to(&mut self);
        self
    }

    pub fn apply_where(mut self, filter: &Where) -> Self {
        filter.apply_where(&mut self);
        self
    }

    pub fn statement(&self) -> &DeleteStatement {
        &self.statement
    }

    pub fn statement_mut(&mut self) -> &mut DeleteStatement {
        &mut self.statement
    }

    pub fn build(&self) -> (String, Values) {
        self.statement.build(PostgresQueryBuilder)
    }

    /// Execute and return the number of rows deleted.
    pub fn exec(self) -> Result<u64, LifeError> {
        let (sql, values) = self.build();
        run(&self.ctx, &values, |params| self.binding.execute(&sql, params))
    }
}

impl Filterable for DeleteQuery {
    fn add_condition(&mut self, condition: Condition) {
        self.statement.cond_where(condition);
    }

    fn render_options(&self) -> RenderOptions {
        self.options
    }
}
