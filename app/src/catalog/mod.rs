//! Read side of the catalog: what can be ordered right now, and whether
//! there is enough data to take orders at all.

use anyhow::{Context, Result};
use log::*;
use r2d2::Pool;

use infra::ids::Id;

use crate::services::{Queryable, Request};

mod models;
mod resources;

pub use self::models::{
    CatalogCounts, CategoryRef, Product, ProductCategory, ProductView, Readiness, Restaurant,
    RestaurantMenuItem, RestaurantRef,
};

pub trait CatalogStore {
    /// Available products, ordered by id.
    fn available_products(&mut self) -> Result<Vec<ProductView>>;
    fn find_product(&mut self, id: Id<Product>) -> Result<Option<Product>>;
    fn catalog_counts(&mut self) -> Result<CatalogCounts>;
}

#[derive(Debug, Clone, Copy)]
pub struct ListAvailableProducts;

#[derive(Debug, Clone, Copy)]
pub struct CheckReadiness;

#[derive(Debug)]
pub struct Catalog<M: r2d2::ManageConnection> {
    db: Pool<M>,
}

impl<M: r2d2::ManageConnection<Connection = D>, D: CatalogStore + Send + 'static> Catalog<M> {
    pub fn new(db: Pool<M>) -> Self {
        Catalog { db }
    }

    pub fn list_available_products(&self) -> Result<Vec<ProductView>> {
        let mut conn = self.db.get().context("catalog connection")?;
        let products = conn.available_products().context("load available products")?;
        debug!("Loaded {} available products", products.len());
        Ok(products)
    }

    pub fn check_readiness(&self) -> Result<Readiness> {
        let mut conn = self.db.get().context("catalog connection")?;
        let counts = conn.catalog_counts().context("count catalog")?;
        let readiness = Readiness::from_counts(counts);
        if !readiness.ready {
            info!("Catalog not ready: {:?}", readiness.errors);
        }
        Ok(readiness)
    }
}

impl<M: r2d2::ManageConnection> Clone for Catalog<M> {
    fn clone(&self) -> Self {
        let db = self.db.clone();
        Catalog { db }
    }
}

impl Request for ListAvailableProducts {
    type Resp = Vec<ProductView>;
}

impl Request for CheckReadiness {
    type Resp = Readiness;
}

impl<M: r2d2::ManageConnection<Connection = D>, D: CatalogStore + Send + 'static>
    Queryable<ListAvailableProducts> for Catalog<M>
{
    fn query(&self, _: ListAvailableProducts) -> Result<Vec<ProductView>> {
        self.list_available_products()
    }
}

impl<M: r2d2::ManageConnection<Connection = D>, D: CatalogStore + Send + 'static>
    Queryable<CheckReadiness> for Catalog<M>
{
    fn query(&self, _: CheckReadiness) -> Result<Readiness> {
        self.check_readiness()
    }
}
