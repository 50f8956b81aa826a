//! Transactional order insert.
//!
//! The header row and every line are written inside one transaction. Each
//! step runs under its own [`QUERY_TIMEOUT`](super::QUERY_TIMEOUT); the first
//! failure rolls the whole order back, so a header never outlives its lines.

use std::fmt::Write as _;

use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use ri_shop_core::OrderId;

use super::{RepositoryError, with_deadline};
use crate::models::NewOrder;

/// Step-wise writer for one order header and its lines.
pub struct InsertOrderBuilder<'a> {
    pool: &'a PgPool,
    order: &'a NewOrder,
    tx: Option<Transaction<'static, Postgres>>,
    order_id: Option<OrderId>,
}

impl<'a> InsertOrderBuilder<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, order: &'a NewOrder) -> Self {
        Self {
            pool,
            order,
            tx: None,
            order_id: None,
        }
    }

    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, RepositoryError> {
        self.tx
            .as_mut()
            .ok_or(RepositoryError::TransactionState("no open transaction"))
    }

    /// Server-generated id, once the header is inserted.
    #[must_use]
    pub const fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    pub async fn begin_tx(&mut self) -> Result<(), RepositoryError> {
        self.tx = Some(with_deadline("begin order tx", self.pool.begin()).await?);
        Ok(())
    }

    /// Insert the `orders` row and keep its id.
    pub async fn insert_header(&mut self) -> Result<(), RepositoryError> {
        let order = self.order;
        let tx = self.tx()?;
        let id = with_deadline(
            "insert order header",
            sqlx::query_scalar::<_, OrderId>(
                r#"
                INSERT INTO "orders" ("user_id", "contact", "address", "transfer_slip", "status")
                VALUES ($1, $2, $3, $4, $5)
                RETURNING "id"
                "#,
            )
            .bind(&order.user_id)
            .bind(&order.contact)
            .bind(&order.address)
            .bind(order.transfer_slip.as_ref().map(Json))
            .bind(order.status)
            .fetch_one(&mut **tx),
        )
        .await?;
        self.order_id = Some(id);
        Ok(())
    }

    /// Insert every line in one statement: `(order_id, qty, product)` per
    /// line, `3N` parameters in total.
    pub async fn insert_lines(&mut self) -> Result<(), RepositoryError> {
        let order = self.order;
        let order_id = self
            .order_id
            .clone()
            .ok_or(RepositoryError::TransactionState("order header not inserted"))?;
        if order.lines.is_empty() {
            return Err(RepositoryError::TransactionState("order has no lines"));
        }

        let mut sql =
            String::from(r#"INSERT INTO "products_orders" ("order_id", "qty", "product") VALUES "#);
        for i in 0..order.lines.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            let base = i * 3;
            let _ = write!(sql, "(${}, ${}, ${})", base + 1, base + 2, base + 3);
        }

        let mut query = sqlx::query(&sql);
        for line in &order.lines {
            query = query
                .bind(&order_id)
                .bind(line.qty)
                .bind(Json(&line.product));
        }

        let tx = self.tx()?;
        with_deadline("insert order lines", query.execute(&mut **tx)).await?;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<(), RepositoryError> {
        let tx = self
            .tx
            .take()
            .ok_or(RepositoryError::TransactionState("no open transaction"))?;
        with_deadline("commit order tx", tx.commit()).await
    }

    pub async fn rollback(&mut self) {
        if let Some(tx) = self.tx.take()
            && let Err(e) = tx.rollback().await
        {
            tracing::error!(error = %e, "rollback order tx failed");
        }
    }
}

/// Run `begin_tx`, `insert_header`, `insert_lines` and `commit` in order.
///
/// # Errors
///
/// Returns the first failing step's error after rolling back.
pub async fn insert_order(
    builder: &mut InsertOrderBuilder<'_>,
) -> Result<OrderId, RepositoryError> {
    let result: Result<(), RepositoryError> = async {
        builder.begin_tx().await?;
        builder.insert_header().await?;
        builder.insert_lines().await?;
        builder.commit().await
    }
    .await;

    if let Err(e) = result {
        tracing::warn!(error = %e, "order insert failed, rolling back");
        builder.rollback().await;
        return Err(e);
    }

    let id = builder
        .order_id()
        .cloned()
        .ok_or(RepositoryError::TransactionState("order header not inserted"))?;
    tracing::info!(
        order_id = %id,
        lines = builder.order.lines.len(),
        total_paid = builder.order.total_paid(),
        "order inserted"
    );
    Ok(id)
}
