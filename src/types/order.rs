//! Order types and the order status state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, OrderId, ProductId};

/// Fulfilment status of an order
///
/// ```text
/// PENDING ──> SHIPPED ──> DELIVERED
///    │
///    └──────> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether an administrator may move an order from `self` to `next`
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Shipped)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// Requested quantity of one product, as submitted at checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl LineItemRequest {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Purchased quantity of one product with its price snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,

    /// Product price at the moment the purchase committed; never updated
    pub price_at_purchase: u64,
}

impl LineItem {
    /// `quantity × price_at_purchase`, `None` on overflow
    pub fn subtotal(&self) -> Option<u64> {
        self.price_at_purchase.checked_mul(u64::from(self.quantity))
    }
}

/// A settled purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub items: Vec<LineItem>,
    pub total_points: u64,
    pub destination: String,
    pub status: OrderStatus,

    /// Set once a compensating refund has been committed
    pub refunded: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a pending order
    pub fn pending(
        id: OrderId,
        account_id: AccountId,
        items: Vec<LineItem>,
        total_points: u64,
        destination: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Order {
            id,
            account_id,
            items,
            total_points,
            destination: destination.into(),
            status: OrderStatus::Pending,
            refunded: false,
            created_at: now,
            updated_at: now,
        }
    }
}
