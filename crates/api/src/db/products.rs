//! Product repository and catalog search.
//!
//! Products are read as JSON documents assembled by `PostgreSQL`: the category
//! and the image list are nested in the row, so one round-trip yields the
//! whole tree.

use std::future::Future;

use sqlx::PgPool;
use sqlx::types::Json;

use ri_shop_core::ProductId;

use super::product_writer::{InsertProductBuilder, insert_product};
use super::query::{
    BindValue, Predicate, SearchBuilder, SearchSpec, SortDirection, contains_pattern,
    count_statement, list_statement,
};
use super::{RepositoryError, with_deadline};
use crate::models::{
    Image, NewProduct, PageRequest, Paginated, Product, ProductFilter, ProductUpdate,
};

/// Columns of one product document, aliased from `"p"`.
macro_rules! product_projection {
    () => {
        r#""p"."id", "p"."title", "p"."description",
        (
            SELECT to_jsonb("ct")
            FROM (
                SELECT "c"."id", "c"."title"
                FROM "products_categories" "pc"
                JOIN "categories" "c" ON "c"."id" = "pc"."category_id"
                WHERE "pc"."product_id" = "p"."id"
                LIMIT 1
            ) AS "ct"
        ) AS "category",
        "p"."created_at", "p"."updated_at", "p"."price",
        (
            SELECT COALESCE(array_to_json(array_agg("it")), '[]'::json)
            FROM (
                SELECT "i"."id", "i"."filename", "i"."url"
                FROM "images" "i"
                WHERE "i"."product_id" = "p"."id"
                ORDER BY "i"."created_at", "i"."id"
            ) AS "it"
        ) AS "images"
        FROM "products" "p""#
    };
}

const FIND_ONE: &str = concat!(
    r#"SELECT to_jsonb("t") FROM (SELECT "#,
    product_projection!(),
    r#" WHERE "p"."id" = $1 LIMIT 1) AS "t""#
);

/// Catalog search input, validated from [`ProductFilter`].
#[derive(Debug, Clone)]
pub struct ProductSearch {
    id: Option<String>,
    search: Option<String>,
    page: PageRequest,
}

impl From<&ProductFilter> for ProductSearch {
    fn from(filter: &ProductFilter) -> Self {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        Self {
            id: non_empty(&filter.id),
            search: non_empty(&filter.search),
            page: filter.page_request(),
        }
    }
}

impl SearchSpec for ProductSearch {
    const SELECT: &'static str = concat!("SELECT ", product_projection!(), " WHERE 1 = 1");
    const COUNT: &'static str = r#"SELECT COUNT(*) FROM "products" "p" WHERE 1 = 1"#;
    const ORDER_BY: &'static [(&'static str, &'static str)] = &[
        ("id", r#""p"."id""#),
        ("title", r#""p"."title""#),
        ("price", r#""p"."price""#),
    ];
    const DEFAULT_ORDER_BY: &'static str = "title";
    const DEFAULT_SORT: SortDirection = SortDirection::Asc;

    fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if let Some(id) = &self.id {
            predicates.push(Predicate {
                fragment: r#" AND "p"."id" = {k}"#,
                value: BindValue::Text(id.clone()),
            });
        }
        if let Some(search) = &self.search {
            predicates.push(Predicate {
                fragment: concat!(
                    r#" AND (LOWER("p"."title") LIKE {k} ESCAPE '\'"#,
                    r#" OR LOWER("p"."description") LIKE {k} ESCAPE '\')"#,
                ),
                value: BindValue::Text(contains_pattern(search)),
            });
        }
        predicates
    }

    fn page(&self) -> &PageRequest {
        &self.page
    }
}

/// Source of authoritative product snapshots.
///
/// Order placement depends on this rather than on the repository so that the
/// snapshot step can be exercised without a database.
pub trait ProductLookup {
    /// Fetch one product with its category and images.
    fn find_one(
        &self,
        id: &ProductId,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;
}

/// Result of a product update.
#[derive(Debug, Clone)]
pub struct UpdatedProduct {
    pub product: Product,
    /// Images detached by an image-list replacement; their stored objects
    /// are now orphaned.
    pub removed_images: Vec<Image>,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch one product document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this id.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_one(&self, id: &ProductId) -> Result<Product, RepositoryError> {
        let row: Option<Json<Product>> = with_deadline(
            "find product",
            sqlx::query_scalar::<_, Json<Product>>(FIND_ONE)
                .bind(id)
                .fetch_optional(self.pool),
        )
        .await?;
        row.map(|Json(product)| product)
            .ok_or(RepositoryError::NotFound)
    }

    /// Search the catalog, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either statement fails.
    pub async fn find(
        &self,
        search: &ProductSearch,
    ) -> Result<Paginated<Product>, RepositoryError> {
        let mut builder = SearchBuilder::new(search);
        let list = list_statement(&mut builder);
        let count = count_statement(&mut builder);

        let data = list.fetch_list::<Product>(self.pool).await?;
        let total = count.fetch_count(self.pool).await?;
        Ok(Paginated::new(data, search.page(), total))
    }

    /// Insert a product with its category link and images, then read it back.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any step fails; nothing is kept.
    pub async fn insert(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut builder = InsertProductBuilder::new(self.pool, product);
        let id = insert_product(&mut builder).await?;
        self.find_one(&id).await
    }

    /// Apply a partial update in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this id.
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn update(
        &self,
        id: &ProductId,
        update: &ProductUpdate,
    ) -> Result<UpdatedProduct, RepositoryError> {
        let mut tx = with_deadline("begin product update tx", self.pool.begin()).await?;

        let touched = with_deadline(
            "update product",
            sqlx::query(
                r#"
                UPDATE "products"
                SET "title" = COALESCE($2, "title"),
                    "description" = COALESCE($3, "description"),
                    "price" = COALESCE($4, "price")
                WHERE "id" = $1
                "#,
            )
            .bind(id)
            .bind(update.title.as_deref())
            .bind(update.description.as_deref())
            .bind(update.price)
            .execute(&mut *tx),
        )
        .await?;
        if touched.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if let Some(category) = &update.category {
            with_deadline(
                "relink product category",
                sqlx::query(
                    r#"
                    INSERT INTO "products_categories" ("product_id", "category_id")
                    VALUES ($1, $2)
                    ON CONFLICT ("product_id") DO UPDATE SET "category_id" = EXCLUDED."category_id"
                    "#,
                )
                .bind(id)
                .bind(category.id)
                .execute(&mut *tx),
            )
            .await?;
        }

        let mut removed_images = Vec::new();
        if let Some(images) = &update.images {
            removed_images = with_deadline(
                "detach product images",
                sqlx::query_as::<_, (String, String, String)>(
                    r#"
                    DELETE FROM "images" WHERE "product_id" = $1
                    RETURNING "id", "filename", "url"
                    "#,
                )
                .bind(id)
                .fetch_all(&mut *tx),
            )
            .await?
            .into_iter()
            .map(|(id, filename, url)| Image {
                id: id.into(),
                filename,
                url,
            })
            .collect();

            for image in images {
                with_deadline(
                    "attach product image",
                    sqlx::query(
                        r#"
                        INSERT INTO "images" ("filename", "url", "product_id")
                        VALUES ($1, $2, $3)
                        "#,
                    )
                    .bind(&image.filename)
                    .bind(&image.url)
                    .bind(id)
                    .execute(&mut *tx),
                )
                .await?;
            }
        }

        with_deadline("commit product update tx", tx.commit()).await?;

        let product = self.find_one(id).await?;
        Ok(UpdatedProduct {
            product,
            removed_images,
        })
    }

    /// Delete a product. Images and the category link go with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row was affected.
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: &ProductId) -> Result<(), RepositoryError> {
        let result = with_deadline(
            "delete product",
            sqlx::query(r#"DELETE FROM "products" WHERE "id" = $1"#)
                .bind(id)
                .execute(self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

impl ProductLookup for ProductRepository<'_> {
    async fn find_one(&self, id: &ProductId) -> Result<Product, RepositoryError> {
        Self::find_one(self, id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn search(filter: ProductFilter) -> ProductSearch {
        ProductSearch::from(&filter)
    }

    #[test]
    fn test_blank_filters_add_no_predicates() {
        let spec = search(ProductFilter {
            id: Some("  ".to_owned()),
            search: Some(String::new()),
            ..ProductFilter::default()
        });
        assert!(spec.predicates().is_empty());
    }

    #[test]
    fn test_search_is_lowercased_and_bracketed() {
        let spec = search(ProductFilter {
            search: Some("CoFFee".to_owned()),
            ..ProductFilter::default()
        });
        let predicates = spec.predicates();
        assert_eq!(predicates.len(), 1);
        assert_eq!(predicates[0].value, BindValue::Text("%coffee%".to_owned()));
    }

    #[test]
    fn test_search_wildcards_match_literally() {
        let spec = search(ProductFilter {
            search: Some("100%_Arabica".to_owned()),
            ..ProductFilter::default()
        });
        assert_eq!(
            spec.predicates()[0].value,
            BindValue::Text(r"%100\%\_arabica%".to_owned())
        );
    }

    #[test]
    fn test_default_sort_is_title_ascending() {
        let spec = search(ProductFilter {
            order_by: Some("; DROP TABLE".to_owned()),
            sort: Some("sideways".to_owned()),
            ..ProductFilter::default()
        });
        let stmt = list_statement(&mut SearchBuilder::new(&spec));

        assert!(stmt.sql.contains(r#"ORDER BY "p"."title" ASC"#));
        assert!(!stmt.sql.contains("DROP"));
    }

    #[test]
    fn test_id_and_search_numbered_in_order() {
        let spec = search(ProductFilter {
            id: Some("P000001".to_owned()),
            search: Some("coffee".to_owned()),
            order_by: Some("price".to_owned()),
            sort: Some("desc".to_owned()),
            page: Some(0),
            limit: Some(1),
        });
        let stmt = list_statement(&mut SearchBuilder::new(&spec));

        assert!(stmt.sql.contains(r#""p"."id" = $1"#));
        assert!(stmt.sql.contains(r#"LOWER("p"."title") LIKE $2 ESCAPE '\'"#));
        assert!(stmt.sql.contains(r#"OR LOWER("p"."description") LIKE $2 ESCAPE '\')"#));
        assert!(stmt.sql.contains(r#"ORDER BY "p"."price" DESC OFFSET $3 LIMIT $4"#));
        assert_eq!(stmt.values[2], BindValue::BigInt(0));
        assert_eq!(stmt.values[3], BindValue::BigInt(3));
    }

    #[test]
    fn test_image_list_is_coalesced() {
        assert!(FIND_ONE.contains(r#"COALESCE(array_to_json(array_agg("it")), '[]'::json)"#));
        assert!(ProductSearch::SELECT.contains(r#"'[]'::json"#));
    }
}
