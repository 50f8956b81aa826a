//! Order routes.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use chrono::Utc;

use ri_shop_core::{OrderId, UserId};

use crate::db::orders::OrderSearch;
use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::error::{ApiError, ApiResult, Success};
use crate::middleware::{AdminOnly, Authenticated, OwnPath};
use crate::models::{Order, OrderFilter, OrderUpdate, Paginated, PlaceOrderRequest};
use crate::services::OrderError;
use crate::services::orders::{may_access, prepare_order, prepare_update};
use crate::state::AppState;

use super::{json_body, path_params, query_params};

const INSERT_CODE: &str = "orders-001";
const FIND_CODE: &str = "orders-002";
const FIND_ONE_CODE: &str = "orders-003";
const UPDATE_CODE: &str = "orders-004";

fn order_failure(error_code: &'static str, e: &OrderError) -> ApiError {
    if e.is_client_error() {
        ApiError::bad_request(error_code, e.to_string())
    } else {
        ApiError::internal(error_code, e.to_string())
    }
}

fn lookup_failure(error_code: &'static str, e: RepositoryError) -> ApiError {
    match e {
        RepositoryError::NotFound => ApiError::not_found(error_code, e.to_string()),
        other => ApiError::internal(error_code, other.to_string()),
    }
}

/// Place an order. Line snapshots are read from the catalog.
pub async fn insert(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let request = json_body(payload, INSERT_CODE)?;
    let now = Utc::now().naive_utc();

    let catalog = ProductRepository::new(state.pool());
    let order = prepare_order(&catalog, &caller, request, now)
        .await
        .map_err(|e| order_failure(INSERT_CODE, &e))?;

    let order = OrderRepository::new(state.pool())
        .insert(&order)
        .await
        .map_err(|e| ApiError::internal(INSERT_CODE, e.to_string()))?;

    tracing::info!(
        order_id = %order.id,
        user_id = %order.user_id,
        placed_by = %caller.id,
        "order placed"
    );
    Ok(Success::created(order))
}

pub async fn find(
    State(state): State<AppState>,
    _admin: AdminOnly,
    query: Result<Query<OrderFilter>, QueryRejection>,
) -> ApiResult<Paginated<Order>> {
    let filter = query_params(query, FIND_CODE)?;
    let search = OrderSearch::try_from(&filter)
        .map_err(|e| ApiError::bad_request(FIND_CODE, e.to_string()))?;

    let page = OrderRepository::new(state.pool())
        .find(&search)
        .await
        .map_err(|e| ApiError::internal(FIND_CODE, e.to_string()))?;
    Ok(Success::ok(page))
}

/// One order of the caller. An order owned by someone else reads as missing.
pub async fn find_one(
    State(state): State<AppState>,
    OwnPath(caller): OwnPath,
    path: Result<Path<(UserId, OrderId)>, PathRejection>,
) -> ApiResult<Order> {
    let (user_id, order_id) = path_params(path, FIND_ONE_CODE)?;

    let order = OrderRepository::new(state.pool())
        .find_one(&order_id)
        .await
        .map_err(|e| lookup_failure(FIND_ONE_CODE, e))?;

    if order.user_id != user_id || order.user_id != caller.id {
        return Err(ApiError::not_found(
            FIND_ONE_CODE,
            RepositoryError::NotFound.to_string(),
        ));
    }
    Ok(Success::ok(order))
}

/// Change the status and/or the transfer slip. Owners may only cancel;
/// admins may do anything.
pub async fn update(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    path: Result<Path<(UserId, OrderId)>, PathRejection>,
    payload: Result<Json<OrderUpdate>, JsonRejection>,
) -> ApiResult<Order> {
    let (user_id, order_id) = path_params(path, UPDATE_CODE)?;
    let request = json_body(payload, UPDATE_CODE)?;

    if !may_access(&caller, &user_id) {
        return Err(ApiError::unauthorized(UPDATE_CODE, "no permission to access"));
    }

    let repository = OrderRepository::new(state.pool());
    let current = repository
        .find_one(&order_id)
        .await
        .map_err(|e| lookup_failure(UPDATE_CODE, e))?;
    if current.user_id != user_id {
        return Err(ApiError::not_found(
            UPDATE_CODE,
            RepositoryError::NotFound.to_string(),
        ));
    }

    let change = prepare_update(&caller, request, Utc::now().naive_utc())
        .map_err(|e| order_failure(UPDATE_CODE, &e))?;

    let order = repository
        .update(&order_id, change.status, change.transfer_slip.as_ref())
        .await
        .map_err(|e| lookup_failure(UPDATE_CODE, e))?;

    tracing::info!(
        order_id = %order.id,
        status = %order.status,
        updated_by = %caller.id,
        "order updated"
    );
    Ok(Success::ok(order))
}
