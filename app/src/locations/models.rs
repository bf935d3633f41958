use chrono::{DateTime, Utc};
use serde::Serialize;

use infra::ids::{Entity, Id};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Cached geocoding result for one normalized address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub id: Id<Location>,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_geocode_attempt: Option<DateTime<Utc>>,
}

impl Location {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
            _ => None,
        }
    }
}

impl Entity for Location {
    const TABLE: &'static str = "locations";
}
