//! Catalog routes.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};

use ri_shop_core::ProductId;

use crate::db::products::ProductSearch;
use crate::db::{ProductRepository, RepositoryError};
use crate::error::{ApiError, ApiResult, Success};
use crate::middleware::{AdminOnly, ApiKey, Authorized};
use crate::models::{
    CategoryRef, Image, NewProduct, Paginated, Product, ProductFilter, ProductUpdate,
};
use crate::services::{LocalStorage, ObjectStorage, StorageError};
use crate::state::AppState;

use super::{json_body, path_params, query_params};

const FIND_ONE_CODE: &str = "products-001";
const FIND_CODE: &str = "products-002";
const INSERT_CODE: &str = "products-003";
const UPDATE_CODE: &str = "products-004";
const DELETE_CODE: &str = "products-005";

fn validate_price(price: f64) -> Result<(), &'static str> {
    if price.is_finite() && price >= 0.0 {
        Ok(())
    } else {
        Err("price must be a non-negative number")
    }
}

fn validate_category(category: CategoryRef) -> Result<(), &'static str> {
    if category.id.as_i32() > 0 {
        Ok(())
    } else {
        Err("category id must be greater than 0")
    }
}

fn validate_new(product: &NewProduct) -> Result<(), &'static str> {
    if product.title.trim().is_empty() {
        return Err("title is required");
    }
    validate_price(product.price)?;
    validate_category(product.category)
}

fn validate_update(update: &ProductUpdate) -> Result<(), &'static str> {
    if update.is_empty() {
        return Err("nothing to update");
    }
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err("title must not be blank");
    }
    if let Some(price) = update.price {
        validate_price(price)?;
    }
    if let Some(category) = update.category {
        validate_category(category)?;
    }
    Ok(())
}

/// Write failures caused by a dangling category reference are the client's.
fn write_failure(error_code: &'static str, e: &RepositoryError) -> ApiError {
    match e {
        RepositoryError::Database(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
            ApiError::bad_request(error_code, "category not found")
        }
        RepositoryError::NotFound => ApiError::not_found(error_code, e.to_string()),
        other => ApiError::internal(error_code, other.to_string()),
    }
}

/// Remove the stored objects behind `images`. Objects already gone, or not
/// issued by this storage, are skipped.
async fn discard_objects(storage: &LocalStorage, images: &[Image]) -> Result<(), StorageError> {
    for image in images {
        let Some(destination) = storage.destination_of(&image.url) else {
            tracing::debug!(url = %image.url, "image not in local storage, skipped");
            continue;
        };
        match storage.delete(&destination).await {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

pub async fn find_one(
    State(state): State<AppState>,
    _key: ApiKey,
    path: Result<Path<ProductId>, PathRejection>,
) -> ApiResult<Product> {
    let id = path_params(path, FIND_ONE_CODE)?;
    let product = ProductRepository::new(state.pool())
        .find_one(&id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => {
                ApiError::not_found(FIND_ONE_CODE, format!("get product failed: {e}"))
            }
            other => ApiError::internal(FIND_ONE_CODE, format!("get product failed: {other}")),
        })?;
    Ok(Success::ok(product))
}

pub async fn find(
    State(state): State<AppState>,
    _key: ApiKey,
    query: Result<Query<ProductFilter>, QueryRejection>,
) -> ApiResult<Paginated<Product>> {
    let filter = query_params(query, FIND_CODE)?;
    let search = ProductSearch::from(&filter);
    let page = ProductRepository::new(state.pool())
        .find(&search)
        .await
        .map_err(|e| ApiError::internal(FIND_CODE, e.to_string()))?;
    Ok(Success::ok(page))
}

pub async fn insert(
    State(state): State<AppState>,
    Authorized(caller): AdminOnly,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> ApiResult<Product> {
    let request = json_body(payload, INSERT_CODE)?;
    validate_new(&request).map_err(|m| ApiError::bad_request(INSERT_CODE, m))?;

    let product = ProductRepository::new(state.pool())
        .insert(&request)
        .await
        .map_err(|e| write_failure(INSERT_CODE, &e))?;

    tracing::info!(product_id = %product.id, created_by = %caller.id, "product inserted");
    Ok(Success::created(product))
}

/// Partial update. When the image list is replaced, the objects of the
/// dropped images are removed from storage after the commit.
pub async fn update(
    State(state): State<AppState>,
    _admin: AdminOnly,
    path: Result<Path<ProductId>, PathRejection>,
    payload: Result<Json<ProductUpdate>, JsonRejection>,
) -> ApiResult<Product> {
    let id = path_params(path, UPDATE_CODE)?;
    let request = json_body(payload, UPDATE_CODE)?;
    validate_update(&request).map_err(|m| ApiError::bad_request(UPDATE_CODE, m))?;

    let updated = ProductRepository::new(state.pool())
        .update(&id, &request)
        .await
        .map_err(|e| write_failure(UPDATE_CODE, &e))?;

    let kept: Vec<&str> = updated.product.images.iter().map(|i| i.url.as_str()).collect();
    let dropped: Vec<Image> = updated
        .removed_images
        .into_iter()
        .filter(|image| !kept.contains(&image.url.as_str()))
        .collect();
    if let Err(e) = discard_objects(state.storage(), &dropped).await {
        tracing::warn!(product_id = %id, error = %e, "stale product images left in storage");
    }

    Ok(Success::ok(updated.product))
}

/// Delete the product's stored images, then the product itself.
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminOnly,
    path: Result<Path<ProductId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_params(path, DELETE_CODE)?;
    let repository = ProductRepository::new(state.pool());

    let product = repository.find_one(&id).await.map_err(|e| match e {
        RepositoryError::NotFound => ApiError::not_found(DELETE_CODE, e.to_string()),
        other => ApiError::internal(DELETE_CODE, other.to_string()),
    })?;

    discard_objects(state.storage(), &product.images)
        .await
        .map_err(|e| ApiError::internal(DELETE_CODE, e.to_string()))?;

    repository.delete(&id).await.map_err(|e| match e {
        RepositoryError::NotFound => ApiError::not_found(DELETE_CODE, e.to_string()),
        other => ApiError::internal(DELETE_CODE, other.to_string()),
    })?;

    tracing::info!(product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ri_shop_core::CategoryId;

    use super::*;

    fn new_product(title: &str, price: f64, category: i32) -> NewProduct {
        NewProduct {
            title: title.to_owned(),
            description: String::new(),
            price,
            category: CategoryRef {
                id: CategoryId::new(category),
            },
            images: Vec::new(),
        }
    }

    #[test]
    fn test_new_product_validation() {
        assert!(validate_new(&new_product("Coffee", 150.0, 1)).is_ok());
        assert!(validate_new(&new_product("Free sample", 0.0, 1)).is_ok());
        assert_eq!(validate_new(&new_product("  ", 150.0, 1)), Err("title is required"));
        assert!(validate_new(&new_product("Coffee", -1.0, 1)).is_err());
        assert!(validate_new(&new_product("Coffee", f64::NAN, 1)).is_err());
        assert!(validate_new(&new_product("Coffee", 150.0, 0)).is_err());
    }

    #[test]
    fn test_update_validation() {
        assert_eq!(validate_update(&ProductUpdate::default()), Err("nothing to update"));

        let blank_title = ProductUpdate {
            title: Some(String::new()),
            ..ProductUpdate::default()
        };
        assert!(validate_update(&blank_title).is_err());

        let price_only = ProductUpdate {
            price: Some(99.5),
            ..ProductUpdate::default()
        };
        assert!(validate_update(&price_only).is_ok());

        let clear_images = ProductUpdate {
            images: Some(Vec::new()),
            ..ProductUpdate::default()
        };
        assert!(validate_update(&clear_images).is_ok());
    }

    #[tokio::test]
    async fn test_discard_objects_skips_missing_and_foreign() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "rishop", "http://localhost:3000");
        let url = storage.upload("products/a.png", b"png").await.unwrap();

        let images = [
            Image {
                id: "i1".to_owned().into(),
                filename: "a.png".to_owned(),
                url,
            },
            Image {
                id: "i2".to_owned().into(),
                filename: "b.png".to_owned(),
                url: storage.public_url("products/gone.png"),
            },
            Image {
                id: "i3".to_owned().into(),
                filename: "c.png".to_owned(),
                url: "https://cdn.example.com/c.png".to_owned(),
            },
        ];

        discard_objects(&storage, &images).await.unwrap();
        assert!(!storage.bucket_dir().join("products/a.png").exists());
    }
}
