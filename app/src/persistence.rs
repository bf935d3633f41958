//! Postgres implementations of the store traits.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::*;
use postgres::Row;

use infra::ids::Id;
use infra::persistence::Database;

use crate::catalog::{CatalogCounts, CatalogStore, CategoryRef, Product, ProductView, RestaurantRef};
use crate::locations::{Coordinates, Location, LocationStore};
use crate::orders::{Customer, NewOrderItem, Order, OrderItem, OrderStore};

const SETUP_SQL: &str = include_str!("schema.sql");

const PRODUCT_COLUMNS: &str =
    "id, name, category_id, price, available, description, image, special_status";
const LOCATION_COLUMNS: &str =
    "id, address, latitude, longitude, created_at, updated_at, last_geocode_attempt";
const ORDER_COLUMNS: &str = "id, firstname, lastname, phonenumber, address, comment, \
                             manager_comment, status, created_at, called_at, delivered_at";

const AVAILABLE_PRODUCTS_SQL: &str = "SELECT p.id, p.name, p.price, p.special_status, \
            p.description, p.image, \
            c.id AS category_id, c.name AS category_name, \
            r.id AS restaurant_id, r.name AS restaurant_name \
     FROM products p \
     LEFT JOIN product_categories c ON c.id = p.category_id \
     LEFT JOIN LATERAL ( \
         SELECT r.id, r.name FROM restaurant_menu_items m \
         JOIN restaurants r ON r.id = m.restaurant_id \
         WHERE m.product_id = p.id AND m.availability \
         ORDER BY r.id LIMIT 1 \
     ) r ON TRUE \
     WHERE p.available \
     ORDER BY p.id";

const COUNTS_SQL: &str = "SELECT \
        (SELECT count(*) FROM products) AS total_products, \
        (SELECT count(*) FROM products WHERE available) AS available_products, \
        (SELECT count(*) FROM restaurants) AS total_restaurants, \
        (SELECT count(DISTINCT restaurant_id) FROM restaurant_menu_items \
            WHERE availability) AS restaurants_with_menu";

pub fn setup(db: &mut Database) -> Result<()> {
    debug!("Init schema");
    db.batch_execute(SETUP_SQL).context("run schema script")?;
    Ok(())
}

fn product_from_row(row: &Row) -> Product {
    Product {
        id: Id::new(row.get("id")),
        name: row.get("name"),
        category: row.get::<_, Option<i64>>("category_id").map(Id::new),
        price: row.get("price"),
        available: row.get("available"),
        description: row.get("description"),
        image: row.get("image"),
        special_status: row.get("special_status"),
    }
}

fn product_view_from_row(row: &Row) -> ProductView {
    let category = row
        .get::<_, Option<i64>>("category_id")
        .map(|id| CategoryRef {
            id: Id::new(id),
            name: row.get("category_name"),
        });
    let restaurant = row
        .get::<_, Option<i64>>("restaurant_id")
        .map(|id| RestaurantRef {
            id: Id::new(id),
            name: row.get("restaurant_name"),
        });
    ProductView {
        id: Id::new(row.get("id")),
        name: row.get("name"),
        price: row.get("price"),
        special_status: row.get("special_status"),
        description: row.get("description"),
        category,
        image: row.get("image"),
        restaurant,
    }
}

fn order_from_row(row: &Row) -> Result<Order> {
    let status: String = row.get("status");
    Ok(Order {
        id: Id::new(row.get("id")),
        firstname: row.get("firstname"),
        lastname: row.get("lastname"),
        phonenumber: row.get("phonenumber"),
        address: row.get("address"),
        comment: row.get("comment"),
        manager_comment: row.get("manager_comment"),
        status: status.parse()?,
        created_at: row.get("created_at"),
        called_at: row.get("called_at"),
        delivered_at: row.get("delivered_at"),
    })
}

fn location_from_row(row: &Row) -> Location {
    Location {
        id: Id::new(row.get("id")),
        address: row.get("address"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        last_geocode_attempt: row.get("last_geocode_attempt"),
    }
}

impl CatalogStore for Database {
    fn available_products(&mut self) -> Result<Vec<ProductView>> {
        let rows = self.client().query(AVAILABLE_PRODUCTS_SQL, &[])?;
        Ok(rows.iter().map(product_view_from_row).collect())
    }

    fn find_product(&mut self, id: Id<Product>) -> Result<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
        let row = self.client().query_opt(sql.as_str(), &[&id.value()])?;
        Ok(row.as_ref().map(product_from_row))
    }

    fn catalog_counts(&mut self) -> Result<CatalogCounts> {
        let row = self.client().query_one(COUNTS_SQL, &[])?;
        Ok(CatalogCounts {
            total_products: row.get("total_products"),
            available_products: row.get("available_products"),
            total_restaurants: row.get("total_restaurants"),
            restaurants_with_menu: row.get("restaurants_with_menu"),
        })
    }
}

impl OrderStore for Database {
    fn insert_order(&mut self, customer: &Customer) -> Result<Id<Order>> {
        let row = self.client().query_one(
            "INSERT INTO orders (firstname, lastname, phonenumber, address) \
             VALUES ($1, $2, $3, $4) RETURNING id",
            &[
                &customer.firstname,
                &customer.lastname,
                &customer.phonenumber,
                &customer.address,
            ],
        )?;
        Ok(Id::new(row.get(0)))
    }

    fn insert_order_item(&mut self, item: &NewOrderItem) -> Result<Id<OrderItem>> {
        let row = self.client().query_one(
            "INSERT INTO order_items (order_id, product_id, quantity, price) \
             VALUES ($1, $2, $3, $4) RETURNING id",
            &[
                &item.order.value(),
                &item.product.value(),
                &item.quantity,
                &item.price,
            ],
        )?;
        Ok(Id::new(row.get(0)))
    }

    fn load_order(&mut self, id: Id<Order>) -> Result<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        match self.client().query_opt(sql.as_str(), &[&id.value()])? {
            Some(row) => Ok(Some(order_from_row(&row)?)),
            None => Ok(None),
        }
    }

    fn load_order_items(&mut self, id: Id<Order>) -> Result<Vec<OrderItem>> {
        let rows = self.client().query(
            "SELECT id, order_id, product_id, quantity, price FROM order_items \
             WHERE order_id = $1 ORDER BY id",
            &[&id.value()],
        )?;
        Ok(rows
            .iter()
            .map(|row| OrderItem {
                id: Id::new(row.get("id")),
                order: Id::new(row.get("order_id")),
                product: Id::new(row.get("product_id")),
                quantity: row.get("quantity"),
                price: row.get("price"),
            })
            .collect())
    }
}

impl LocationStore for Database {
    fn get_or_create_location(&mut self, address: &str) -> Result<(Location, bool)> {
        let insert = format!(
            "INSERT INTO locations (address) VALUES ($1) \
             ON CONFLICT (address) DO NOTHING RETURNING {}",
            LOCATION_COLUMNS
        );
        if let Some(row) = self.client().query_opt(insert.as_str(), &[&address])? {
            return Ok((location_from_row(&row), true));
        }

        let select = format!(
            "SELECT {} FROM locations WHERE address = $1",
            LOCATION_COLUMNS
        );
        let row = self
            .client()
            .query_one(select.as_str(), &[&address])
            .with_context(|| format!("location {:?} vanished after conflict", address))?;
        Ok((location_from_row(&row), false))
    }

    fn record_geocode_attempt(
        &mut self,
        id: Id<Location>,
        coordinates: Option<Coordinates>,
        attempted_at: DateTime<Utc>,
    ) -> Result<Location> {
        let sql = format!(
            "UPDATE locations SET latitude = $2, longitude = $3, \
             last_geocode_attempt = $4, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            LOCATION_COLUMNS
        );
        let row = self.client().query_one(
            sql.as_str(),
            &[
                &id.value(),
                &coordinates.map(|c| c.lat),
                &coordinates.map(|c| c.lon),
                &attempted_at,
            ],
        )?;
        Ok(location_from_row(&row))
    }
}
