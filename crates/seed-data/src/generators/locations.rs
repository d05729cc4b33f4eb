//! Measurement kinds and catalog locations that mock readings hang off.

use monitoring::geocoding::Geocoder;
use monitoring::models::{Location, MeasurementKind};
use monitoring::{AppError, RecordStore};
use tracing::{debug, warn};

use crate::config::{CatalogCity, MOCK_MEASUREMENTS};

/// Makes sure the temperature and humidity kinds exist.
pub async fn ensure_measurements<S>(store: &S) -> Result<Vec<MeasurementKind>, AppError>
where
    S: RecordStore + ?Sized,
{
    let mut kinds = Vec::with_capacity(MOCK_MEASUREMENTS.len());
    for (name, unit) in MOCK_MEASUREMENTS {
        let (kind, created) = store.get_or_create_measurement(name, unit).await?;
        if created {
            debug!("Created measurement {name} ({unit})");
        }
        kinds.push(kind);
    }
    Ok(kinds)
}

/// Resolves the full city/state/country hierarchy and a geocoded location for every catalog entry.
///
/// Entries that cannot be geocoded are logged and left out.
pub async fn catalog_locations<S, G>(
    store: &S,
    geocoder: &G,
    catalog: &[CatalogCity],
) -> Result<Vec<Location>, AppError>
where
    S: RecordStore + ?Sized,
    G: Geocoder + ?Sized,
{
    let mut locations = Vec::with_capacity(catalog.len());

    for entry in catalog {
        let (city, _) = store.get_or_create_city(entry.city).await?;
        let (state, _) = store.get_or_create_state(entry.state).await?;
        let (country, _) = store.get_or_create_country(entry.country).await?;

        let coordinates = match geocoder
            .coordinates(entry.city, entry.state, entry.country)
            .await
        {
            Ok(coordinates) => coordinates,
            Err(e) => {
                warn!("Skipping {}: {e}", entry.city);
                continue;
            }
        };

        let (location, created) = store
            .get_or_create_location(&city, &state, &country, coordinates)
            .await?;
        if created {
            debug!(
                "Created location {}, {}, {} at ({}, {})",
                entry.city, entry.state, entry.country, coordinates.lat, coordinates.lng
            );
        }
        locations.push(location);
    }

    Ok(locations)
}
