//! Order records (`purchases` collection).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use digitalhub_core::{OrderId, OrderStatus, PaymentMethod, PurchaseId, UserId};

/// Synthetic account credentials revealed after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDetails {
    pub email: String,
    pub password: String,
}

/// One completed checkout, written exactly once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub user_id: UserId,
    pub product_id: String,
    pub product_name: String,
    pub price: Decimal,
    pub original_price: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_address: String,
    pub account_details: AccountDetails,
}

impl OrderRecord {
    /// Amount saved against the reference price, never negative.
    #[must_use]
    pub fn savings(&self) -> Decimal {
        (self.original_price - self.price).max(Decimal::ZERO)
    }
}

/// An order record read back with its document key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    #[serde(flatten)]
    pub record: OrderRecord,
}
