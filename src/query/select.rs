//! SELECT query builder.
//!
//! Building methods (filter, order_by, limit, ...) consume and return the
//! query so they chain; execution methods run it on the query's binding.

use super::binding::Binding;
use super::{parse_row, run, FromRow};
use crate::column::ColumnName;
use crate::context::Context;
use crate::executor::{LifeError, LifeExecutor};
use crate::filter::Where;
use crate::selector::{Filterable, RenderOptions, Selector};
use may_postgres::Row;
use sea_query::{
    Asterisk, Condition, ConditionalStatement, Expr, IntoColumnRef, IntoCondition, IntoTableRef,
    Order, PostgresQueryBuilder, Query, SelectStatement, Values,
};

/// Query builder for selecting rows
///
/// Returned by [`Querier::new_select_query`](crate::Querier::new_select_query).
/// Selects `*` until columns are chosen.
///
/// # Example
///
/// ```no_run
/// use lifeguard_scope::selector::{where_equal, where_in};
/// use lifeguard_scope::{Context, Querier};
/// use sea_query::Order;
///
/// # fn run(querier: &Querier) -> Result<(), lifeguard_scope::LifeError> {
/// let ctx = Context::background();
/// let rows = querier
///     .new_select_query(&ctx)
///     .from("users")
///     .apply(&where_equal("active", true))
///     .apply(&where_in("role", ["admin", "owner"]))
///     .order_by("id", Order::Asc)
///     .limit(10)
///     .all()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SelectQuery {
    statement: SelectStatement,
    binding: Binding,
    ctx: Context,
    options: RenderOptions,
    default_projection: bool,
}

impl SelectQuery {
    pub(crate) fn new(binding: Binding, ctx: Context, options: RenderOptions) -> Self {
        let mut statement = Query::select();
        statement.column(Asterisk);
        Self {
            statement,
            binding,
            ctx,
            options,
            default_projection: true,
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn from<T: IntoTableRef>(mut self, table: T) -> Self {
        self.statement.from(table);
        self
    }

    /// Select `columns` instead of `*`. Repeated calls append.
    pub fn columns<C: Into<ColumnName>>(mut self, columns: impl IntoIterator<Item = C>) -> Self {
        self.take_projection();
        self.statement
            .columns(columns.into_iter().map(|c| c.into().to_column_ref()));
        self
    }

    /// Add a raw SeaQuery condition, ANDed with the rest.
    pub fn filter<F: IntoCondition>(mut self, condition: F) -> Self {
        self.statement.cond_where(condition.into_condition());
        self
    }

    pub fn apply(mut self, selector: &Selector) -> Self {
        selector.apply_to(&mut self);
        self
    }

    /// Apply the filter's conditions, projection, paging and ordering.
    pub fn apply_where(mut self, filter: &Where) -> Self {
        filter.apply_where(&mut self);
        if !filter.projection().is_empty() {
            self.default_projection = false;
        }
        filter.apply_select(&mut self.statement);
        self
    }

    pub fn order_by<C: IntoColumnRef>(mut self, column: C, order: Order) -> Self {
        self.statement.order_by(column, order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.statement.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.statement.offset(offset);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.statement.distinct();
        self
    }

    pub fn statement(&self) -> &SelectStatement {
        &self.statement
    }

    pub fn statement_mut(&mut self) -> &mut SelectStatement {
        &mut self.statement
    }

    /// Render as PostgreSQL with bound parameters.
    pub fn build(&self) -> (String, Values) {
        self.statement.build(PostgresQueryBuilder)
    }

    fn take_projection(&mut self) {
        if self.default_projection {
            self.statement.clear_selects();
            self.default_projection = false;
        }
    }

    /// Execute the query and return all rows
    pub fn all(self) -> Result<Vec<Row>, LifeError> {
        let (sql, values) = self.build();
        run(&self.ctx, &values, |params| self.binding.query_all(&sql, params))
    }

    /// Execute the query and decode every row as `T`
    pub fn all_as<T: FromRow>(self) -> Result<Vec<T>, LifeError> {
        self.all()?.iter().map(parse_row::<T>).collect()
    }

    /// Execute the query and return the first row
    ///
    /// # Errors
    ///
    /// Returns `LifeError::NotFound` if the query returns no rows.
    pub fn one(self) -> Result<Row, LifeError> {
        self.all()?.into_iter().next().ok_or(LifeError::NotFound)
    }

    pub fn one_as<T: FromRow>(self) -> Result<T, LifeError> {
        parse_row(&self.one()?)
    }

    /// Like [`one`](Self::one), but zero rows is `Ok(None)`.
    pub fn find_one(self) -> Result<Option<Row>, LifeError> {
        match self.one() {
            Ok(row) => Ok(Some(row)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Count the rows the query matches, ignoring ORDER BY, LIMIT and OFFSET.
    pub fn count(&self) -> Result<u64, LifeError> {
        let mut inner = self.statement.clone();
        inner.clear_order_by().reset_limit().reset_offset();

        let (sql, values) = Query::select()
            .expr(Expr::cust("COUNT(*)"))
            .from_subquery(inner, "count_subquery")
            .build(PostgresQueryBuilder);

        run(&self.ctx, &values, |params| {
            let row = self.binding.query_one(&sql, params)?;
            let count: i64 = row
                .try_get(0)
                .map_err(|e| LifeError::ParseError(format!("Failed to read count: {e}")))?;
            u64::try_from(count)
                .map_err(|_| LifeError::Other(format!("Count cannot be negative: {count}")))
        })
    }
}

impl Filterable for SelectQuery {
    fn add_condition(&mut self, condition: Condition) {
        self.statement.cond_where(condition);
    }

    fn add_distinct_on(&mut self, columns: &[ColumnName]) {
        self.statement.add_distinct_on(columns);
    }

    fn render_options(&self) -> RenderOptions {
        self.options
    }
}
