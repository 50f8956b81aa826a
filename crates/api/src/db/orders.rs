//! Order repository and order search.
//!
//! An order document nests its lines, each carrying the product snapshot
//! stored at insert time. `total_paid` is derived on read from those
//! snapshots and is never stored.

use chrono::NaiveDate;
use sqlx::PgPool;
use sqlx::types::Json;
use thiserror::Error;

use ri_shop_core::{OrderId, OrderStatus};

use super::order_writer::{InsertOrderBuilder, insert_order};
use super::query::{
    BindValue, Predicate, SearchBuilder, SearchSpec, SortDirection, contains_pattern,
    count_statement, list_statement,
};
use super::{RepositoryError, with_deadline};
use crate::models::{NewOrder, Order, OrderFilter, PageRequest, Paginated, TransferSlip};

/// Columns of one order document, aliased from `"o"`.
macro_rules! order_projection {
    () => {
        r#""o"."id", "o"."user_id", "o"."transfer_slip", "o"."address", "o"."contact",
        "o"."status",
        (
            SELECT COALESCE(array_to_json(array_agg("pt")), '[]'::json)
            FROM (
                SELECT "po"."id", "po"."qty", "po"."product"
                FROM "products_orders" "po"
                WHERE "po"."order_id" = "o"."id"
                ORDER BY "po"."created_at", "po"."id"
            ) AS "pt"
        ) AS "products",
        (
            SELECT COALESCE(SUM(COALESCE(
                ("po"."product"->>'price')::FLOAT * ("po"."qty")::FLOAT, 0
            )), 0)
            FROM "products_orders" "po"
            WHERE "po"."order_id" = "o"."id"
        ) AS "total_paid",
        "o"."created_at", "o"."updated_at"
        FROM "orders" "o""#
    };
}

const FIND_ONE: &str = concat!(
    r#"SELECT to_jsonb("t") FROM (SELECT "#,
    order_projection!(),
    r#" WHERE "o"."id" = $1 LIMIT 1) AS "t""#
);

/// Date format accepted for `start_date` and `end_date`.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Rejected order search input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderFilterError {
    #[error("{0}")]
    Status(#[from] ri_shop_core::OrderStatusError),

    #[error("invalid {field}: {value}, expected YYYY-MM-DD")]
    Date { field: &'static str, value: String },
}

/// Order search input, validated from [`OrderFilter`].
#[derive(Debug, Clone)]
pub struct OrderSearch {
    search: Option<String>,
    status: Option<OrderStatus>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    page: PageRequest,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<NaiveDate>, OrderFilterError> {
    non_empty(value)
        .map(|v| {
            NaiveDate::parse_from_str(v, DATE_FORMAT).map_err(|_| OrderFilterError::Date {
                field,
                value: v.to_owned(),
            })
        })
        .transpose()
}

impl TryFrom<&OrderFilter> for OrderSearch {
    type Error = OrderFilterError;

    fn try_from(filter: &OrderFilter) -> Result<Self, Self::Error> {
        Ok(Self {
            search: non_empty(filter.search.as_deref()).map(str::to_lowercase),
            status: non_empty(filter.status.as_deref())
                .map(str::parse::<OrderStatus>)
                .transpose()?,
            start_date: parse_date("start_date", filter.start_date.as_deref())?,
            end_date: parse_date("end_date", filter.end_date.as_deref())?,
            page: filter.page_request(),
        })
    }
}

impl SearchSpec for OrderSearch {
    const SELECT: &'static str = concat!("SELECT ", order_projection!(), " WHERE 1 = 1");
    const COUNT: &'static str = r#"SELECT COUNT(*) FROM "orders" "o" WHERE 1 = 1"#;
    const ORDER_BY: &'static [(&'static str, &'static str)] =
        &[("id", r#""o"."id""#), ("created_at", r#""o"."created_at""#)];
    const DEFAULT_ORDER_BY: &'static str = "id";
    const DEFAULT_SORT: SortDirection = SortDirection::Desc;

    fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if let Some(search) = &self.search {
            predicates.push(Predicate {
                fragment: concat!(
                    r#" AND (LOWER("o"."user_id") LIKE {k} ESCAPE '\'"#,
                    r#" OR LOWER("o"."address") LIKE {k} ESCAPE '\'"#,
                    r#" OR LOWER("o"."contact") LIKE {k} ESCAPE '\')"#,
                ),
                value: BindValue::Text(contains_pattern(search)),
            });
        }
        if let Some(status) = self.status {
            predicates.push(Predicate {
                fragment: r#" AND "o"."status" = {k}"#,
                value: BindValue::Text(status.as_str().to_owned()),
            });
        }
        if let Some(start) = self.start_date {
            predicates.push(Predicate {
                fragment: r#" AND "o"."created_at"::date >= {k}"#,
                value: BindValue::Date(start),
            });
        }
        if let Some(end) = self.end_date {
            predicates.push(Predicate {
                fragment: r#" AND "o"."created_at"::date <= {k}"#,
                value: BindValue::Date(end),
            });
        }
        predicates
    }

    fn page(&self) -> &PageRequest {
        &self.page
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch one order document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order has this id.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_one(&self, id: &OrderId) -> Result<Order, RepositoryError> {
        let row: Option<Json<Order>> = with_deadline(
            "find order",
            sqlx::query_scalar::<_, Json<Order>>(FIND_ONE)
                .bind(id)
                .fetch_optional(self.pool),
        )
        .await?;
        row.map(|Json(order)| order).ok_or(RepositoryError::NotFound)
    }

    /// Search orders, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either statement fails.
    pub async fn find(&self, search: &OrderSearch) -> Result<Paginated<Order>, RepositoryError> {
        let mut builder = SearchBuilder::new(search);
        let list = list_statement(&mut builder);
        let count = count_statement(&mut builder);

        let data = list.fetch_list::<Order>(self.pool).await?;
        let total = count.fetch_count(self.pool).await?;
        Ok(Paginated::new(data, search.page(), total))
    }

    /// Write the order and its lines atomically, then read it back.
    ///
    /// # Errors
    ///
    /// Returns the failing step's `RepositoryError`; nothing is kept.
    pub async fn insert(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut builder = InsertOrderBuilder::new(self.pool, order);
        let id = insert_order(&mut builder).await?;
        self.find_one(&id).await
    }

    /// Set the status and/or transfer slip, then read the order back.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order has this id.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: &OrderId,
        status: Option<OrderStatus>,
        transfer_slip: Option<&TransferSlip>,
    ) -> Result<Order, RepositoryError> {
        let result = with_deadline(
            "update order",
            sqlx::query(
                r#"
                UPDATE "orders"
                SET "status" = COALESCE($2, "status"),
                    "transfer_slip" = COALESCE($3, "transfer_slip")
                WHERE "id" = $1
                "#,
            )
            .bind(id)
            .bind(status.map(OrderStatus::as_str))
            .bind(transfer_slip.map(Json))
            .execute(self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.find_one(id).await
    }
}
