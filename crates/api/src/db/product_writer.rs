//! Transactional product insert.
//!
//! [`InsertProductBuilder`] owns the statements and the transaction;
//! [`insert_product`] runs the steps in order and rolls back on failure.

use std::fmt::Write as _;

use sqlx::{PgPool, Postgres, Transaction};

use ri_shop_core::ProductId;

use super::{RepositoryError, with_deadline};
use crate::models::NewProduct;

/// Step-wise writer for one product, its category link and its images.
pub struct InsertProductBuilder<'a> {
    pool: &'a PgPool,
    product: &'a NewProduct,
    tx: Option<Transaction<'static, Postgres>>,
    product_id: Option<ProductId>,
}

impl<'a> InsertProductBuilder<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, product: &'a NewProduct) -> Self {
        Self {
            pool,
            product,
            tx: None,
            product_id: None,
        }
    }

    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, RepositoryError> {
        self.tx
            .as_mut()
            .ok_or(RepositoryError::TransactionState("no open transaction"))
    }

    fn product_id(&self) -> Result<ProductId, RepositoryError> {
        self.product_id
            .clone()
            .ok_or(RepositoryError::TransactionState("product row not inserted"))
    }

    pub async fn begin_tx(&mut self) -> Result<(), RepositoryError> {
        self.tx = Some(with_deadline("begin product tx", self.pool.begin()).await?);
        Ok(())
    }

    pub async fn insert_product(&mut self) -> Result<(), RepositoryError> {
        let product = self.product;
        let tx = self.tx()?;
        let id = with_deadline(
            "insert product",
            sqlx::query_scalar::<_, ProductId>(
                r#"
                INSERT INTO "products" ("title", "description", "price")
                VALUES ($1, $2, $3)
                RETURNING "id"
                "#,
            )
            .bind(product.title.trim())
            .bind(&product.description)
            .bind(product.price)
            .fetch_one(&mut **tx),
        )
        .await?;
        self.product_id = Some(id);
        Ok(())
    }

    pub async fn insert_category(&mut self) -> Result<(), RepositoryError> {
        let product_id = self.product_id()?;
        let category_id = self.product.category.id;
        let tx = self.tx()?;
        with_deadline(
            "insert product category",
            sqlx::query(
                r#"
                INSERT INTO "products_categories" ("product_id", "category_id")
                VALUES ($1, $2)
                "#,
            )
            .bind(&product_id)
            .bind(category_id)
            .execute(&mut **tx),
        )
        .await?;
        Ok(())
    }

    /// One multi-row insert with `3N` parameters.
    pub async fn insert_images(&mut self) -> Result<(), RepositoryError> {
        let product = self.product;
        let images = &product.images;
        if images.is_empty() {
            return Ok(());
        }
        let product_id = self.product_id()?;

        let mut sql =
            String::from(r#"INSERT INTO "images" ("filename", "url", "product_id") VALUES "#);
        for i in 0..images.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            let base = i * 3;
            let _ = write!(sql, "(${}, ${}, ${})", base + 1, base + 2, base + 3);
        }

        let mut query = sqlx::query(&sql);
        for image in images {
            query = query.bind(&image.filename).bind(&image.url).bind(&product_id);
        }

        let tx = self.tx()?;
        with_deadline("insert product images", query.execute(&mut **tx)).await?;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<(), RepositoryError> {
        let tx = self
            .tx
            .take()
            .ok_or(RepositoryError::TransactionState("no open transaction"))?;
        with_deadline("commit product tx", tx.commit()).await
    }

    pub async fn rollback(&mut self) {
        if let Some(tx) = self.tx.take()
            && let Err(e) = tx.rollback().await
        {
            tracing::error!(error = %e, "rollback product tx failed");
        }
    }
}

/// Run the product insert steps in order.
///
/// # Errors
///
/// Returns the first failing step's error after rolling back.
pub async fn insert_product(
    builder: &mut InsertProductBuilder<'_>,
) -> Result<ProductId, RepositoryError> {
    let result: Result<ProductId, RepositoryError> = async {
        builder.begin_tx().await?;
        builder.insert_product().await?;
        builder.insert_category().await?;
        builder.insert_images().await?;
        let id = builder.product_id()?;
        builder.commit().await?;
        Ok(id)
    }
    .await;

    match result {
        Ok(id) => {
            tracing::info!(product_id = %id, "product inserted");
            Ok(id)
        }
        Err(e) => {
            tracing::warn!(error = %e, "product insert failed, rolling back");
            builder.rollback().await;
            Err(e)
        }
    }
}
