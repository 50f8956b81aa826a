//! Dynamic search statements for the catalog and orders.
//!
//! A [`SearchBuilder`] assembles one positional-parameter statement through a
//! fixed step sequence (`open_json_wrapper`, `init_select` or `init_count`,
//! `where_clause`, `sort`, `paginate`, `close_json_wrapper`). The free
//! functions [`list_statement`] and [`count_statement`] drive those steps in
//! order. [`SearchBuilder::finish`] hands back the statement and resets the
//! builder, so the COUNT sibling reuses the same filters.
//!
//! Sort columns are never bound: they are looked up in a per-search whitelist
//! and only the whitelisted identifier is written into the SQL.

use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::QueryScalar;
use sqlx::types::Json;

use super::{RepositoryError, with_deadline};
use crate::models::PageRequest;

/// Placeholder in predicate fragments, replaced by the next `$n`.
const SLOT: &str = "{k}";

/// A bound parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    Text(String),
    BigInt(i64),
    Date(NaiveDate),
}

/// One optional filter: a SQL fragment with a single [`SLOT`], and its value.
///
/// A fragment may mention the slot more than once; every mention shares the
/// same parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub fragment: &'static str,
    pub value: BindValue,
}

/// Lowercased `LIKE` pattern matching `needle` anywhere in a column.
///
/// `\`, `%` and `_` are escaped, so the fragment must say `ESCAPE '\'`.
#[must_use]
pub fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Uppercase and validate a client value.
    fn resolve(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }

    const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// What a searchable resource contributes to the builder.
pub trait SearchSpec {
    /// Inner row projection, ending in a `WHERE` that later fragments extend.
    const SELECT: &'static str;
    /// Row count over the same `FROM`, ending in the same `WHERE`.
    const COUNT: &'static str;
    /// Client `order_by` key to column identifier.
    const ORDER_BY: &'static [(&'static str, &'static str)];
    /// Key into [`Self::ORDER_BY`] used when the client value is unknown.
    const DEFAULT_ORDER_BY: &'static str;
    const DEFAULT_SORT: SortDirection;

    /// Active filters, in binding order.
    fn predicates(&self) -> Vec<Predicate>;

    /// Paging and sorting input.
    fn page(&self) -> &PageRequest;

    /// Resolve the client `order_by` against the whitelist.
    fn order_column(&self) -> &'static str {
        let wanted = self.page().order_by.trim().to_lowercase();
        lookup(Self::ORDER_BY, &wanted)
            .or_else(|| lookup(Self::ORDER_BY, Self::DEFAULT_ORDER_BY))
            .unwrap_or("1")
    }

    /// Resolve the client `sort` against `{ASC, DESC}`.
    fn sort_direction(&self) -> SortDirection {
        SortDirection::resolve(&self.page().sort).unwrap_or(Self::DEFAULT_SORT)
    }
}

fn lookup(map: &[(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    map.iter().find(|(k, _)| *k == key).map(|(_, column)| *column)
}

/// An assembled statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub values: Vec<BindValue>,
}

impl Statement {
    /// Bind every value, in order, onto a scalar query over this SQL.
    fn scalar<O>(&self) -> QueryScalar<'_, Postgres, O, PgArguments>
    where
        O: Send + Unpin,
        (O,): for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>,
    {
        let mut query = sqlx::query_scalar::<_, O>(&self.sql);
        for value in &self.values {
            query = match value {
                BindValue::Text(text) => query.bind(text.as_str()),
                BindValue::BigInt(n) => query.bind(*n),
                BindValue::Date(date) => query.bind(*date),
            };
        }
        query
    }

    /// Execute a JSON-wrapped list statement and decode the array.
    ///
    /// `array_agg` over zero rows yields NULL, which decodes as an empty list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` on query failure or timeout.
    pub async fn fetch_list<T>(&self, pool: &PgPool) -> Result<Vec<T>, RepositoryError>
    where
        T: DeserializeOwned + Send + Unpin + 'static,
    {
        tracing::debug!(sql = %self.sql, values = ?self.values, "search statement");
        let rows: Option<Json<Vec<T>>> =
            with_deadline("search", self.scalar::<Option<Json<Vec<T>>>>().fetch_one(pool)).await?;
        Ok(rows.map(|Json(rows)| rows).unwrap_or_default())
    }

    /// Execute a COUNT statement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` on query failure or timeout.
    pub async fn fetch_count(&self, pool: &PgPool) -> Result<i64, RepositoryError> {
        tracing::debug!(sql = %self.sql, values = ?self.values, "count statement");
        with_deadline("count", self.scalar::<i64>().fetch_one(pool)).await
    }
}

/// Step-wise statement assembler for one [`SearchSpec`].
pub struct SearchBuilder<'a, S: SearchSpec> {
    spec: &'a S,
    sql: String,
    values: Vec<BindValue>,
}

impl<'a, S: SearchSpec> SearchBuilder<'a, S> {
    #[must_use]
    pub const fn new(spec: &'a S) -> Self {
        Self {
            spec,
            sql: String::new(),
            values: Vec::new(),
        }
    }

    pub fn open_json_wrapper(&mut self) -> &mut Self {
        self.sql.push_str("SELECT array_to_json(array_agg(\"t\")) FROM (");
        self
    }

    pub fn init_select(&mut self) -> &mut Self {
        self.sql.push_str(S::SELECT);
        self
    }

    pub fn init_count(&mut self) -> &mut Self {
        self.sql.push_str(S::COUNT);
        self
    }

    /// Append every active predicate, numbering parameters after those
    /// already bound.
    pub fn where_clause(&mut self) -> &mut Self {
        for predicate in self.spec.predicates() {
            self.values.push(predicate.value);
            let placeholder = format!("${}", self.values.len());
            self.sql.push_str(&predicate.fragment.replace(SLOT, &placeholder));
        }
        self
    }

    pub fn sort(&mut self) -> &mut Self {
        let _ = write!(
            self.sql,
            " ORDER BY {} {}",
            self.spec.order_column(),
            self.spec.sort_direction().as_sql()
        );
        self
    }

    /// `OFFSET (page-1)*limit LIMIT limit` as the two trailing parameters.
    pub fn paginate(&mut self) -> &mut Self {
        let page = self.spec.page();
        self.values.push(BindValue::BigInt(page.offset()));
        self.values.push(BindValue::BigInt(page.limit));
        let next = self.values.len();
        let _ = write!(self.sql, " OFFSET ${} LIMIT ${}", next - 1, next);
        self
    }

    pub fn close_json_wrapper(&mut self) -> &mut Self {
        self.sql.push_str(") AS \"t\"");
        self
    }

    /// Take the assembled statement and reset the builder.
    pub fn finish(&mut self) -> Statement {
        Statement {
            sql: std::mem::take(&mut self.sql),
            values: std::mem::take(&mut self.values),
        }
    }
}

/// Compose the JSON-wrapped, filtered, sorted and paginated list statement.
pub fn list_statement<S: SearchSpec>(builder: &mut SearchBuilder<'_, S>) -> Statement {
    builder
        .open_json_wrapper()
        .init_select()
        .where_clause()
        .sort()
        .paginate()
        .close_json_wrapper()
        .finish()
}

/// Compose the COUNT sibling with the same filters.
pub fn count_statement<S: SearchSpec>(builder: &mut SearchBuilder<'_, S>) -> Statement {
    builder.init_count().where_clause().finish()
}
