//! Order placement and update rules.
//!
//! Line snapshots come from the catalog, never from the request body, and a
//! customer can only act on their own orders.

use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use ri_shop_core::{OrderStatus, OrderStatusError, Role, UserId};

use crate::db::{ProductLookup, RepositoryError};
use crate::models::{
    NewOrder, NewOrderLine, OrderUpdate, PlaceOrderRequest, TransferSlip, UserClaims,
};

/// Format of `transfer_slip.created_at`.
pub const SLIP_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Order rule violations and snapshot failures.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("products are empty")]
    EmptyProducts,

    #[error("qty of product {0} must be greater than 0")]
    InvalidQty(String),

    #[error("address and contact are required")]
    MissingDelivery,

    #[error("product {0} not found")]
    ProductNotFound(String),

    #[error("find one product failed : {0}")]
    Snapshot(RepositoryError),

    #[error(transparent)]
    Status(#[from] OrderStatusError),

    #[error("customer can only cancel an order")]
    StatusNotAllowed,

    #[error("nothing to update")]
    EmptyUpdate,
}

impl OrderError {
    /// Whether the failure is the client's doing rather than the server's.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Snapshot(_))
    }
}

/// Fill in a server id and timestamp where the client left them blank.
#[must_use]
pub fn normalize_slip(mut slip: TransferSlip, now: NaiveDateTime) -> TransferSlip {
    if slip.id.trim().is_empty() {
        slip.id = Uuid::new_v4().to_string();
    }
    if slip.created_at.trim().is_empty() {
        slip.created_at = now.format(SLIP_TIME_FORMAT).to_string();
    }
    slip
}

/// Turn a placement request into a persistable order.
///
/// Customers always order for themselves; admins may name a `user_id`.
/// Every line gets a fresh catalog snapshot.
///
/// # Errors
///
/// Returns `OrderError::EmptyProducts`, `OrderError::InvalidQty` or
/// `OrderError::MissingDelivery` on invalid input,
/// `OrderError::ProductNotFound` for an unknown product and
/// `OrderError::Snapshot` if the catalog lookup fails.
pub async fn prepare_order<L: ProductLookup>(
    catalog: &L,
    caller: &UserClaims,
    request: PlaceOrderRequest,
    now: NaiveDateTime,
) -> Result<NewOrder, OrderError> {
    if request.products.is_empty() {
        return Err(OrderError::EmptyProducts);
    }
    if request.address.trim().is_empty() || request.contact.trim().is_empty() {
        return Err(OrderError::MissingDelivery);
    }
    if let Some(line) = request.products.iter().find(|line| line.qty <= 0) {
        return Err(OrderError::InvalidQty(line.product.id.to_string()));
    }

    let user_id = match request.user_id {
        Some(user_id) if caller.role.contains(Role::Admin) && !user_id.is_empty() => user_id,
        _ => caller.id.clone(),
    };

    let mut lines = Vec::with_capacity(request.products.len());
    for line in request.products {
        let product = catalog
            .find_one(&line.product.id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    OrderError::ProductNotFound(line.product.id.to_string())
                }
                other => OrderError::Snapshot(other),
            })?;
        lines.push(NewOrderLine {
            qty: line.qty,
            product,
        });
    }

    Ok(NewOrder {
        user_id,
        address: request.address,
        contact: request.contact,
        transfer_slip: request.transfer_slip.map(|slip| normalize_slip(slip, now)),
        status: OrderStatus::Waiting,
        lines,
    })
}

/// A validated order update.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderChange {
    pub status: Option<OrderStatus>,
    pub transfer_slip: Option<TransferSlip>,
}

/// Validate an update against the caller's role.
///
/// Admins may set any status; everyone else may only cancel.
///
/// # Errors
///
/// Returns `OrderError::Status` for an unknown status,
/// `OrderError::StatusNotAllowed` when a customer sets anything but
/// `canceled`, and `OrderError::EmptyUpdate` when nothing changes.
pub fn prepare_update(
    caller: &UserClaims,
    update: OrderUpdate,
    now: NaiveDateTime,
) -> Result<OrderChange, OrderError> {
    let status = update
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()?;

    if let Some(status) = status
        && status != OrderStatus::Canceled
        && !caller.role.contains(Role::Admin)
    {
        return Err(OrderError::StatusNotAllowed);
    }

    let transfer_slip = update.transfer_slip.map(|slip| normalize_slip(slip, now));
    if status.is_none() && transfer_slip.is_none() {
        return Err(OrderError::EmptyUpdate);
    }

    Ok(OrderChange {
        status,
        transfer_slip,
    })
}

/// Whether `caller` may act on orders that belong to `owner`.
#[must_use]
pub fn may_access(caller: &UserClaims, owner: &UserId) -> bool {
    caller.role.contains(Role::Admin) || caller.id == *owner
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use ri_shop_core::{ProductId, RoleMask};

    use super::*;
    use crate::models::{OrderLineRequest, Product, ProductRef};

    struct Catalog(HashMap<String, Product>);

    impl ProductLookup for Catalog {
        async fn find_one(&self, id: &ProductId) -> Result<Product, RepositoryError> {
            self.0
                .get(id.as_str())
                .cloned()
                .ok_or(RepositoryError::NotFound)
        }
    }

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn coffee() -> Product {
        serde_json::from_value(serde_json::json!({
            "id": "P000001",
            "title": "Coffee",
            "description": "Arabica",
            "category": {"id": 1, "title": "food & beverage"},
            "created_at": "2024-01-01T00:00:00",
            "updated_at": "2024-01-01T00:00:00",
            "price": 150.0,
            "images": []
        }))
        .unwrap()
    }

    fn catalog() -> Catalog {
        Catalog(HashMap::from([("P000001".to_owned(), coffee())]))
    }

    fn caller(role: RoleMask) -> UserClaims {
        UserClaims {
            id: UserId::new("U000001"),
            role,
        }
    }

    fn request(user_id: Option<&str>, qty: i32, product: &str) -> PlaceOrderRequest {
        PlaceOrderRequest {
            user_id: user_id.map(UserId::new),
            address: "X".to_owned(),
            contact: "Y".to_owned(),
            transfer_slip: None,
            products: vec![OrderLineRequest {
                qty,
                product: ProductRef {
                    id: ProductId::new(product),
                },
            }],
        }
    }

    #[tokio::test]
    async fn test_snapshot_comes_from_catalog() {
        let order = prepare_order(
            &catalog(),
            &caller(RoleMask::CUSTOMER),
            request(None, 2, "P000001"),
            now(),
        )
        .await
        .unwrap();

        assert_eq!(order.status, OrderStatus::Waiting);
        assert_eq!(order.lines[0].product, coffee());
        assert!((order.total_paid() - 300.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_customer_cannot_order_for_someone_else() {
        let order = prepare_order(
            &catalog(),
            &caller(RoleMask::CUSTOMER),
            request(Some("U000099"), 1, "P000001"),
            now(),
        )
        .await
        .unwrap();
        assert_eq!(order.user_id, UserId::new("U000001"));

        let order = prepare_order(
            &catalog(),
            &caller(RoleMask::ADMIN),
            request(Some("U000099"), 1, "P000001"),
            now(),
        )
        .await
        .unwrap();
        assert_eq!(order.user_id, UserId::new("U000099"));
    }

    #[tokio::test]
    async fn test_rejected_requests() {
        let mut empty = request(None, 1, "P000001");
        empty.products.clear();
        assert!(matches!(
            prepare_order(&catalog(), &caller(RoleMask::CUSTOMER), empty, now()).await,
            Err(OrderError::EmptyProducts)
        ));

        let customer = caller(RoleMask::CUSTOMER);
        assert!(matches!(
            prepare_order(&catalog(), &customer, request(None, 0, "P000001"), now()).await,
            Err(OrderError::InvalidQty(_))
        ));

        assert!(matches!(
            prepare_order(&catalog(), &customer, request(None, 1, "P0000999"), now()).await,
            Err(OrderError::ProductNotFound(_))
        ));
    }

    #[test]
    fn test_slip_defaults_filled() {
        let slip = normalize_slip(
            TransferSlip {
                id: String::new(),
                filename: "slip.png".to_owned(),
                url: "http://localhost/slip.png".to_owned(),
                created_at: String::new(),
            },
            now(),
        );
        assert!(Uuid::parse_str(&slip.id).is_ok());
        assert_eq!(slip.created_at, "2024-05-01 09:30:00");
    }

    #[test]
    fn test_customer_may_only_cancel() {
        let customer = caller(RoleMask::CUSTOMER);
        let update = |status: &str| OrderUpdate {
            status: Some(status.to_owned()),
            transfer_slip: None,
        };

        assert_eq!(
            prepare_update(&customer, update("canceled"), now()).unwrap().status,
            Some(OrderStatus::Canceled)
        );
        assert!(matches!(
            prepare_update(&customer, update("completed"), now()),
            Err(OrderError::StatusNotAllowed)
        ));
        assert_eq!(
            prepare_update(&caller(RoleMask::ADMIN), update("Shipping"), now())
                .unwrap()
                .status,
            Some(OrderStatus::Shipping)
        );
        assert!(matches!(
            prepare_update(&customer, OrderUpdate::default(), now()),
            Err(OrderError::EmptyUpdate)
        ));
    }

    #[test]
    fn test_may_access() {
        let customer = caller(RoleMask::CUSTOMER);
        assert!(may_access(&customer, &UserId::new("U000001")));
        assert!(!may_access(&customer, &UserId::new("U000002")));
        assert!(may_access(&caller(RoleMask::ADMIN), &UserId::new("U000002")));
    }
}
