use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use err_derive::Error;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use infra::ids::{Entity, Id};

use crate::catalog::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Unprocessed,
    Processing,
    Delivering,
    Delivered,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(display = "unknown order status: {:?}", _0)]
pub struct UnknownStatus(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error(display = "price of {:?} must not be negative, got {}", _0, _1)]
    Negative(Id<Product>, Decimal),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: Id<Order>,
    pub firstname: String,
    pub lastname: String,
    pub phonenumber: String,
    pub address: String,
    pub comment: String,
    pub manager_comment: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItem {
    pub id: Id<OrderItem>,
    pub order: Id<Order>,
    pub product: Id<Product>,
    pub quantity: i32,
    pub price: Decimal,
}

/// Customer-supplied fields of an order about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub firstname: String,
    pub lastname: String,
    pub phonenumber: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub order: Id<Order>,
    pub product: Id<Product>,
    pub quantity: i32,
    pub price: Decimal,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Unprocessed => "unprocessed",
            OrderStatus::Processing => "processing",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl PartialOrd for OrderStatus {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderStatus {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Unprocessed
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, UnknownStatus> {
        match s {
            "unprocessed" => Ok(OrderStatus::Unprocessed),
            "processing" => Ok(OrderStatus::Processing),
            "delivering" => Ok(OrderStatus::Delivering),
            "delivered" => Ok(OrderStatus::Delivered),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl NewOrderItem {
    /// An unset or zero `price` falls back to the product's current price.
    pub fn priced(
        order: Id<Order>,
        product: &Product,
        quantity: i32,
        price: Option<Decimal>,
    ) -> Result<Self, PriceError> {
        let price = match price {
            Some(price) if !price.is_zero() => price,
            _ => product.price,
        };
        if price < Decimal::ZERO {
            return Err(PriceError::Negative(product.id, price));
        }
        Ok(NewOrderItem {
            order,
            product: product.id,
            quantity,
            price,
        })
    }
}

impl Entity for Order {
    const TABLE: &'static str = "orders";
}

impl Entity for OrderItem {
    const TABLE: &'static str = "order_items";
}
