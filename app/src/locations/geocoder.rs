use std::time::Duration;

use err_derive::Error;
use log::*;
use serde::Deserialize;
use url::Url;

use super::Coordinates;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error(display = "geocoding is not configured")]
    NotConfigured,
    #[error(display = "geocoder unreachable: {}", _0)]
    Transport(String),
    #[error(display = "geocoder responded with HTTP {}", _0)]
    Status(u16),
    #[error(display = "malformed geocoder response: {}", _0)]
    Malformed(String),
}

pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the provider knows no such place.
    fn fetch_coordinates(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

/// Stand-in used when no API key is configured.
#[derive(Debug, Clone, Copy)]
pub struct NoGeocoder;

impl Geocoder for NoGeocoder {
    fn fetch_coordinates(&self, _: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Err(GeocodeError::NotConfigured)
    }
}

pub struct YandexGeocoder {
    client: reqwest::blocking::Client,
    endpoint: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct YandexReply {
    response: YandexResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct YandexResponse {
    geo_object_collection: GeoObjectCollection,
}

#[derive(Debug, Deserialize)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember")]
    feature_member: Vec<FeatureMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FeatureMember {
    geo_object: GeoObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GeoObject {
    point: Point,
}

#[derive(Debug, Deserialize)]
struct Point {
    pos: String,
}

impl YandexGeocoder {
    /// Builds its own blocking client; call outside of any async runtime.
    pub fn new(endpoint: Url, api_key: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(YandexGeocoder {
            client,
            endpoint,
            api_key: api_key.to_string(),
        })
    }
}

impl Geocoder for YandexGeocoder {
    fn fetch_coordinates(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        debug!("Geocoding {:?} via {}", address, self.endpoint);
        let resp = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("geocode", address),
                ("apikey", self.api_key.as_str()),
                ("format", "json"),
            ])
            .send()
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }
        let reply: YandexReply = resp
            .json()
            .map_err(|e| GeocodeError::Malformed(e.to_string()))?;

        match reply
            .response
            .geo_object_collection
            .feature_member
            .first()
        {
            Some(most_relevant) => parse_pos(&most_relevant.geo_object.point.pos).map(Some),
            None => Ok(None),
        }
    }
}

/// `Point.pos` is `"<longitude> <latitude>"`.
fn parse_pos(pos: &str) -> Result<Coordinates, GeocodeError> {
    let mut parts = pos.split_whitespace().map(str::parse::<f64>);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(lon)), Some(Ok(lat)), None) => Ok(Coordinates { lat, lon }),
        _ => Err(GeocodeError::Malformed(format!("bad position {:?}", pos))),
    }
}
