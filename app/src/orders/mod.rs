//! Order intake.
//!
//! A call to [`Orders::register_order`] moves through
//! `validating -> rejected | persisting -> committed | rolled back`.
//! Validation failures never touch the database. Persistence runs in a
//! single transaction: the order is written together with an item for every
//! product that exists, or not at all. Once committed, the delivery address
//! is handed to the location cache; problems there are logged and otherwise
//! ignored.

use anyhow::{Context, Result};
use log::*;
use r2d2::Pool;
use rust_decimal::Decimal;
use serde::Serialize;

use infra::ids::Id;
use infra::persistence::{Storage, Transaction};

use crate::catalog::{CatalogStore, Product};
use crate::locations::{LocationStore, Locations};
use crate::services::{Commandable, Queryable, Request};

mod models;
mod resources;
mod validation;

pub use self::models::{
    Customer, NewOrderItem, Order, OrderItem, OrderStatus, PriceError, UnknownStatus,
};
pub use self::validation::{validate, OrderLine, OrderPayload, ValidOrder, ValidationErrors};

pub trait OrderStore {
    fn insert_order(&mut self, customer: &Customer) -> Result<Id<Order>>;
    fn insert_order_item(&mut self, item: &NewOrderItem) -> Result<Id<OrderItem>>;
    fn load_order(&mut self, id: Id<Order>) -> Result<Option<Order>>;
    /// Items in insertion order.
    fn load_order_items(&mut self, id: Id<Order>) -> Result<Vec<OrderItem>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Success,
    PartialSuccess,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddedProduct {
    pub product_id: Id<Product>,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub order_id: Id<Order>,
    pub customer: Customer,
    pub added_products: Vec<AddedProduct>,
    pub missing_products: Vec<Id<Product>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Registered(OrderReceipt),
    Rejected(ValidationErrors),
}

#[derive(Debug, Clone)]
pub struct RegisterOrder(pub OrderPayload);

#[derive(Debug, Clone, Copy)]
pub struct ShowOrder(pub Id<Order>);

pub struct Orders<M: r2d2::ManageConnection> {
    db: Pool<M>,
    locations: Locations<M>,
}

impl OrderReceipt {
    pub fn status(&self) -> RegistrationStatus {
        if self.missing_products.is_empty() {
            RegistrationStatus::Success
        } else {
            RegistrationStatus::PartialSuccess
        }
    }
}

impl<M, D> Orders<M>
where
    M: r2d2::ManageConnection<Connection = D>,
    D: Storage + CatalogStore + OrderStore + LocationStore + Send + 'static,
{
    pub fn new(db: Pool<M>, locations: Locations<M>) -> Self {
        Orders { db, locations }
    }

    pub fn register_order(&self, payload: &OrderPayload) -> Result<OrderOutcome> {
        let order = match validate(payload) {
            Ok(order) => order,
            Err(errors) => {
                info!("Rejected order: {}", errors);
                return Ok(OrderOutcome::Rejected(errors));
            }
        };

        let outcome = {
            let mut conn = self.db.get().context("order connection")?;
            persist(&mut *conn, &order)?
        };

        if let OrderOutcome::Registered(ref receipt) = outcome {
            info!(
                "Registered order {} ({:?}, {} missing products)",
                receipt.order_id,
                receipt.status(),
                receipt.missing_products.len()
            );
            if let Err(e) = self.locations.resolve(&receipt.customer.address) {
                warn!(
                    "Could not cache location for order {}: {:?}",
                    receipt.order_id, e
                );
            }
        }
        Ok(outcome)
    }

    pub fn show_order(&self, id: Id<Order>) -> Result<Option<(Order, Vec<OrderItem>)>> {
        let mut conn = self.db.get().context("order connection")?;
        let order = match conn.load_order(id).context("load order")? {
            Some(order) => order,
            None => return Ok(None),
        };
        let items = conn.load_order_items(id).context("load order items")?;
        debug!("Load {} -> {:?} with {} items", id, order, items.len());
        Ok(Some((order, items)))
    }
}

fn persist<D>(conn: &mut D, order: &ValidOrder) -> Result<OrderOutcome>
where
    D: Storage + CatalogStore + OrderStore + ?Sized,
{
    let mut t = Transaction::begin(conn)?;
    let order_id = t.insert_order(&order.customer).context("insert order")?;

    let mut added_products = Vec::with_capacity(order.lines.len());
    let mut missing_products = Vec::new();
    for line in order.lines.iter() {
        let product = match t.find_product(line.product).context("find product")? {
            Some(product) => product,
            None => {
                warn!("Order {} references missing product {}", order_id, line.product);
                missing_products.push(line.product);
                continue;
            }
        };
        let item = NewOrderItem::priced(order_id, &product, line.quantity, None)?;
        t.insert_order_item(&item).context("insert order item")?;
        trace!("Added {:?} to order {}", item, order_id);
        added_products.push(AddedProduct {
            product_id: product.id,
            name: product.name,
            quantity: item.quantity,
            price: item.price,
        });
    }

    if added_products.is_empty() {
        t.rollback()?;
        info!("Dropped order: none of {:?} exist", missing_products);
        return Ok(OrderOutcome::Rejected(ValidationErrors::single(
            "products: none of the requested products exist",
        )));
    }

    t.commit()?;
    Ok(OrderOutcome::Registered(OrderReceipt {
        order_id,
        customer: order.customer.clone(),
        added_products,
        missing_products,
    }))
}

impl<M: r2d2::ManageConnection> Clone for Orders<M> {
    fn clone(&self) -> Self {
        let db = self.db.clone();
        let locations = self.locations.clone();
        Orders { db, locations }
    }
}

impl Request for RegisterOrder {
    type Resp = OrderOutcome;
}

impl Request for ShowOrder {
    type Resp = Option<(Order, Vec<OrderItem>)>;
}

impl<M, D> Commandable<RegisterOrder> for Orders<M>
where
    M: r2d2::ManageConnection<Connection = D>,
    D: Storage + CatalogStore + OrderStore + LocationStore + Send + 'static,
{
    fn execute(&self, req: RegisterOrder) -> Result<OrderOutcome> {
        self.register_order(&req.0)
    }
}

impl<M, D> Queryable<ShowOrder> for Orders<M>
where
    M: r2d2::ManageConnection<Connection = D>,
    D: Storage + CatalogStore + OrderStore + LocationStore + Send + 'static,
{
    fn query(&self, req: ShowOrder) -> Result<Option<(Order, Vec<OrderItem>)>> {
        self.show_order(req.0)
    }
}
