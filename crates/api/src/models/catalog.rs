//! Catalog types: categories, products and their images.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use ri_shop_core::{CategoryId, ImageId, ProductId};

use super::pagination::PageRequest;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
}

/// A stored product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub filename: String,
    pub url: String,
}

/// A product with its category and images, as assembled by the database.
///
/// The same shape is embedded as the snapshot on each order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub price: f64,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Query parameters for `GET /products`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub id: Option<String>,
    /// Case-insensitive substring over title and description.
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub order_by: Option<String>,
    pub sort: Option<String>,
}

impl ProductFilter {
    /// Paging input with clamping applied.
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        PageRequest::clamped(
            self.page,
            self.limit,
            self.order_by.as_deref(),
            self.sort.as_deref(),
        )
    }
}

/// Reference to an existing category by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
}

/// A category to insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub title: String,
}

/// An image already uploaded to object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewImage {
    pub filename: String,
    pub url: String,
}

/// `POST /products` body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category: CategoryRef,
    #[serde(default)]
    pub images: Vec<NewImage>,
}

/// `PATCH /products/:product_id` body. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<CategoryRef>,
    /// Replaces the full image list when present.
    pub images: Option<Vec<NewImage>>,
}

impl ProductUpdate {
    /// Whether the payload changes anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.category.is_none()
            && self.images.is_none()
    }
}
