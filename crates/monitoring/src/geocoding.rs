//! City/state/country to coordinate lookup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::errors::AppError;
use crate::models::Coordinates;

pub const DEFAULT_NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org";

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn coordinates(
        &self,
        city: &str,
        state: &str,
        country: &str,
    ) -> Result<Coordinates, AppError>;
}

/// One hit from Nominatim's `/search?format=json`. Coordinates come back as strings.
#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

/// Geocoder backed by a Nominatim-compatible `/search` endpoint.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    cache_dir: Option<PathBuf>,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir: None,
            endpoint: DEFAULT_NOMINATIM_ENDPOINT.to_string(),
        }
    }

    /// Enables file-based caching of lookups, one JSON file per query.
    pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&path).ok();
        self.cache_dir = Some(path);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn cache_path(&self, key: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", Self::hash_query(key))))
    }

    fn check_cache(&self, key: &str) -> Result<Option<Coordinates>, AppError> {
        let Some(path) = self.cache_path(key) else {
            return Ok(None);
        };

        if !path.exists() {
            return Ok(None);
        }

        let data = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<Coordinates>(&data) {
            Ok(coordinates) => {
                tracing::debug!("Geocode cache hit for {key}");
                Ok(Some(coordinates))
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable geocode cache {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    fn save_cache(&self, key: &str, coordinates: &Coordinates) -> Result<(), AppError> {
        let Some(path) = self.cache_path(key) else {
            return Ok(());
        };

        std::fs::write(path, serde_json::to_string(coordinates)?)?;
        Ok(())
    }

    fn parse_hit(key: &str, hits: Vec<SearchHit>) -> Result<Coordinates, AppError> {
        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Geocoding(key.to_string()))?;

        let lat = hit
            .lat
            .parse::<f64>()
            .map_err(|e| AppError::Geocoding(format!("{key}: bad latitude: {e}")))?;
        let lng = hit
            .lon
            .parse::<f64>()
            .map_err(|e| AppError::Geocoding(format!("{key}: bad longitude: {e}")))?;

        Ok(Coordinates::new(lat, lng))
    }

    fn hash_query(query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn coordinates(
        &self,
        city: &str,
        state: &str,
        country: &str,
    ) -> Result<Coordinates, AppError> {
        let key = format!("{city}, {state}, {country}");

        if let Some(cached) = self.check_cache(&key)? {
            return Ok(cached);
        }

        let hits: Vec<SearchHit> = self
            .client
            .get(format!("{}/search", self.endpoint))
            .header(reqwest::header::USER_AGENT, "iot-monitoring-seed/0.1")
            .query(&[
                ("city", city),
                ("state", state),
                ("country", country),
                ("format", "json"),
                ("limit", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let coordinates = Self::parse_hit(&key, hits)?;
        tracing::debug!("Geocoded {key} to ({}, {})", coordinates.lat, coordinates.lng);

        self.save_cache(&key, &coordinates)?;
        Ok(coordinates)
    }
}

/// Geocoder answering from a fixed table keyed on `(city, state, country)`.
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    entries: HashMap<(String, String, String), Coordinates>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(
        mut self,
        city: impl Into<String>,
        state: impl Into<String>,
        country: impl Into<String>,
        coordinates: Coordinates,
    ) -> Self {
        self.entries
            .insert((city.into(), state.into(), country.into()), coordinates);
        self
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn coordinates(
        &self,
        city: &str,
        state: &str,
        country: &str,
    ) -> Result<Coordinates, AppError> {
        self.entries
            .get(&(city.to_string(), state.to_string(), country.to_string()))
            .copied()
            .ok_or_else(|| AppError::Geocoding(format!("{city}, {state}, {country}")))
    }
}
