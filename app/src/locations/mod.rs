//! Geocoding cache keyed by normalized address.
//!
//! A row is created the first time an address is seen, and only the caller
//! that created it talks to the geocoder. Failed lookups are remembered as a
//! row with empty coordinates and an attempt timestamp; nothing retries them.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::*;
use r2d2::Pool;

use infra::ids::Id;

use crate::services::{Commandable, Request};

mod geocoder;
mod models;

pub use self::geocoder::{GeocodeError, Geocoder, NoGeocoder, YandexGeocoder};
pub use self::models::{Coordinates, Location};

pub trait LocationStore {
    /// Returns the row for `address`, and whether this call inserted it.
    /// Concurrent callers racing on the same address get the same row, and
    /// exactly one of them sees `true`.
    fn get_or_create_location(&mut self, address: &str) -> Result<(Location, bool)>;
    fn record_geocode_attempt(
        &mut self,
        id: Id<Location>,
        coordinates: Option<Coordinates>,
        attempted_at: DateTime<Utc>,
    ) -> Result<Location>;
}

/// Resolve each address, skipping blanks.
#[derive(Debug, Clone)]
pub struct ResolveAddresses(pub Vec<String>);

pub struct Locations<M: r2d2::ManageConnection> {
    db: Pool<M>,
    geocoder: Arc<dyn Geocoder>,
}

impl<M: r2d2::ManageConnection<Connection = D>, D: LocationStore + Send + 'static> Locations<M> {
    pub fn new(db: Pool<M>, geocoder: Arc<dyn Geocoder>) -> Self {
        Locations { db, geocoder }
    }

    pub fn resolve(&self, address: &str) -> Result<Option<Location>> {
        let address = address.trim();
        if address.is_empty() {
            trace!("Ignoring blank address");
            return Ok(None);
        }

        let (location, created) = self
            .db
            .get()
            .context("location connection")?
            .get_or_create_location(address)
            .context("get or create location")?;
        if !created {
            debug!("Cached location for {:?}: {:?}", address, location.id);
            return Ok(Some(location));
        }

        let coordinates = match self.geocoder.fetch_coordinates(address) {
            Ok(Some(coordinates)) => Some(coordinates),
            Ok(None) => {
                info!("Geocoder knows nothing about {:?}", address);
                None
            }
            Err(e) => {
                warn!("Geocoding failed for {:?}: {}", address, e);
                None
            }
        };

        let location = self
            .db
            .get()
            .context("location connection")?
            .record_geocode_attempt(location.id, coordinates, Utc::now())
            .context("record geocode attempt")?;
        debug!("Geocoded {:?} -> {:?}", address, location.coordinates());
        Ok(Some(location))
    }

    pub fn resolve_all<I, S>(&self, addresses: I) -> Result<Vec<Location>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut locations = Vec::new();
        for address in addresses {
            if let Some(location) = self.resolve(address.as_ref())? {
                locations.push(location);
            }
        }
        Ok(locations)
    }
}

impl<M: r2d2::ManageConnection> Clone for Locations<M> {
    fn clone(&self) -> Self {
        let db = self.db.clone();
        let geocoder = self.geocoder.clone();
        Locations { db, geocoder }
    }
}

impl Request for ResolveAddresses {
    type Resp = Vec<Location>;
}

impl<M: r2d2::ManageConnection<Connection = D>, D: LocationStore + Send + 'static>
    Commandable<ResolveAddresses> for Locations<M>
{
    fn execute(&self, req: ResolveAddresses) -> Result<Vec<Location>> {
        self.resolve_all(req.0)
    }
}
