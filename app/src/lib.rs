//! Food-cart backend: catalog browsing, order intake and a geocoding cache
//! over a shared Postgres schema.

use std::sync::Arc;

use actix_web::web;
use anyhow::{Context, Result};
use r2d2::Pool;

use infra::persistence::{DatabaseConnectionManager, Storage};

pub mod banners;
pub mod catalog;
pub mod config;
pub mod locations;
pub mod orders;
mod persistence;
mod responses;
pub mod services;
#[cfg(test)]
mod test;

use crate::catalog::{Catalog, CatalogStore};
use crate::locations::{Geocoder, LocationStore, Locations};
use crate::orders::{OrderStore, Orders};

pub struct FoodCart<M: r2d2::ManageConnection> {
    db: Pool<M>,
    catalog: Catalog<M>,
    orders: Orders<M>,
    locations: Locations<M>,
}

impl FoodCart<DatabaseConnectionManager> {
    pub fn new(config: &config::Config) -> Result<Self> {
        let db = config.postgres.build().context("postgres pool")?;
        let geocoder = config.geocoder.build().context("geocoder")?;
        Ok(FoodCart::from_parts(db, geocoder))
    }

    /// Creates any missing tables.
    pub fn setup(&self) -> Result<()> {
        let mut conn = self.db.get().context("setup connection")?;
        persistence::setup(&mut conn)
    }
}

impl<M, D> FoodCart<M>
where
    M: r2d2::ManageConnection<Connection = D>,
    D: Storage + CatalogStore + OrderStore + LocationStore + Send + 'static,
{
    pub fn from_parts(db: Pool<M>, geocoder: Arc<dyn Geocoder>) -> Self {
        let catalog = Catalog::new(db.clone());
        let locations = Locations::new(db.clone(), geocoder);
        let orders = Orders::new(db.clone(), locations.clone());
        FoodCart {
            db,
            catalog,
            orders,
            locations,
        }
    }

    pub fn catalog(&self) -> &Catalog<M> {
        &self.catalog
    }

    pub fn orders(&self) -> &Orders<M> {
        &self.orders
    }

    pub fn locations(&self) -> &Locations<M> {
        &self.locations
    }

    /// Called once per server worker.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(responses::json_config()).service(
            web::scope("/api")
                .service(self.catalog.products_resource())
                .service(
                    web::resource("/order/")
                        .route(self.catalog.readiness_route())
                        .route(self.orders.register_route()),
                )
                .service(banners::resource()),
        );
    }
}

impl<M: r2d2::ManageConnection> Clone for FoodCart<M> {
    fn clone(&self) -> Self {
        FoodCart {
            db: self.db.clone(),
            catalog: self.catalog.clone(),
            orders: self.orders.clone(),
            locations: self.locations.clone(),
        }
    }
}
