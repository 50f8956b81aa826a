//! API key minting and category administration.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use serde::{Deserialize, Serialize};

use ri_shop_core::CategoryId;

use crate::db::{CategoryRepository, RepositoryError};
use crate::error::{ApiError, ApiResult, Success};
use crate::middleware::{AdminOnly, ApiKey};
use crate::models::{Category, NewCategory};
use crate::services::AuthService;
use crate::state::AppState;

use super::{json_body, path_params, query_params};

const API_KEY_CODE: &str = "appinfo-001";
const FIND_CATEGORIES_CODE: &str = "appinfo-002";
const INSERT_CATEGORIES_CODE: &str = "appinfo-003";
const DELETE_CATEGORY_CODE: &str = "appinfo-004";

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub key: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryFilter {
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedCategory {
    pub category_id: CategoryId,
}

/// Mint a long-lived API key.
pub async fn api_key(
    State(state): State<AppState>,
    _admin: AdminOnly,
) -> ApiResult<ApiKeyResponse> {
    let signed = AuthService::new(state.pool(), state.tokens())
        .api_key()
        .map_err(|e| ApiError::internal(API_KEY_CODE, e.to_string()))?;
    Ok(Success::ok(ApiKeyResponse { key: signed.token }))
}

pub async fn find_categories(
    State(state): State<AppState>,
    _key: ApiKey,
    query: Result<Query<CategoryFilter>, QueryRejection>,
) -> ApiResult<Vec<Category>> {
    let filter = query_params(query, FIND_CATEGORIES_CODE)?;
    let categories = CategoryRepository::new(state.pool())
        .find(filter.title.as_deref())
        .await
        .map_err(|e| ApiError::internal(FIND_CATEGORIES_CODE, e.to_string()))?;
    Ok(Success::ok(categories))
}

/// Insert a non-empty batch of categories atomically.
pub async fn insert_categories(
    State(state): State<AppState>,
    _admin: AdminOnly,
    payload: Result<Json<Vec<NewCategory>>, JsonRejection>,
) -> ApiResult<Vec<Category>> {
    let batch = json_body(payload, INSERT_CATEGORIES_CODE)?;
    if batch.is_empty() {
        return Err(ApiError::bad_request(
            INSERT_CATEGORIES_CODE,
            "categories are empty",
        ));
    }
    if batch.iter().any(|c| c.title.trim().is_empty()) {
        return Err(ApiError::bad_request(
            INSERT_CATEGORIES_CODE,
            "category title is required",
        ));
    }

    let ids = CategoryRepository::new(state.pool())
        .insert_batch(&batch)
        .await
        .map_err(|e| ApiError::internal(INSERT_CATEGORIES_CODE, e.to_string()))?;

    let categories = ids
        .into_iter()
        .zip(batch)
        .map(|(id, category)| Category {
            id,
            title: category.title.trim().to_owned(),
        })
        .collect();
    Ok(Success::created(categories))
}

pub async fn delete_category(
    State(state): State<AppState>,
    _admin: AdminOnly,
    path: Result<Path<i32>, PathRejection>,
) -> ApiResult<DeletedCategory> {
    let id = path_params(path, DELETE_CATEGORY_CODE)?;
    if id <= 0 {
        return Err(ApiError::bad_request(
            DELETE_CATEGORY_CODE,
            "category id must be greater than 0",
        ));
    }
    let category_id = CategoryId::new(id);

    // A missing row is reported as a server error, not a 404.
    CategoryRepository::new(state.pool())
        .delete(category_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => {
                ApiError::internal(DELETE_CATEGORY_CODE, format!("category id not found: {id}"))
            }
            other => ApiError::internal(DELETE_CATEGORY_CODE, other.to_string()),
        })?;

    tracing::info!(%category_id, "category deleted");
    Ok(Success::ok(DeletedCategory { category_id }))
}
