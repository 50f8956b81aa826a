//! Order types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use ri_shop_core::{OrderId, OrderLineId, OrderStatus, ProductId, UserId};

use super::catalog::Product;
use super::pagination::PageRequest;

/// Evidence of payment attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSlip {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "file_name")]
    pub filename: String,
    pub url: String,
    /// `YYYY-MM-DD HH:MM:SS`; filled in by the server when absent.
    #[serde(default)]
    pub created_at: String,
}

/// One line of an order with its product snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub qty: i32,
    pub product: Product,
}

/// An order as assembled by the database, with derived `total_paid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub transfer_slip: Option<TransferSlip>,
    #[serde(default)]
    pub products: Vec<OrderLine>,
    pub address: String,
    pub contact: String,
    pub status: OrderStatus,
    pub total_paid: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Query parameters for `GET /orders`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    /// Substring over user id, address and contact.
    pub search: Option<String>,
    pub status: Option<String>,
    /// Inclusive, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Inclusive, `YYYY-MM-DD`.
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub order_by: Option<String>,
    pub sort: Option<String>,
}

impl OrderFilter {
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

/// Product reference in an order request; only the id is trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: ProductId,
}

/// One requested line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub qty: i32,
    pub product: ProductRef,
}

/// `POST /orders` body.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    /// Honored only for admins placing an order on behalf of a customer.
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub address: String,
    pub contact: String,
    #[serde(default)]
    pub transfer_slip: Option<TransferSlip>,
    #[serde(default)]
    pub products: Vec<OrderLineRequest>,
}

/// A line ready to persist: the snapshot comes from the catalog, not the client.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub qty: i32,
    pub product: Product,
}

/// An order ready to persist.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub address: String,
    pub contact: String,
    pub transfer_slip: Option<TransferSlip>,
    pub status: OrderStatus,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    /// `Σ price × qty` over the snapshots.
    #[must_use]
    pub fn total_paid(&self) -> f64 {
        self.lines
            .iter()
            .map(|line| line.product.price * f64::from(line.qty))
            .sum()
    }
}

/// `PATCH /orders/:user_id/:order_id` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderUpdate {
    pub status: Option<String>,
    pub transfer_slip: Option<TransferSlip>,
}
