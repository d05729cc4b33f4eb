use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Domain used when an email is derived from a login name.
pub const DERIVED_EMAIL_DOMAIN: &str = "mail.com";

/// Builds the synthesized address `<login>@mail.com`.
pub fn derived_email(login: &str) -> String {
    format!("{login}@{DERIVED_EMAIL_DOMAIN}")
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: OffsetDateTime,
}

impl UserAccount {
    pub fn new(name: String, email: String, password_hash: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// A named place in the location hierarchy (country, state or city).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Place {
    pub id: Uuid,
    pub name: String,
}

impl Place {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

pub type Country = Place;
pub type State = Place;
pub type City = Place;

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A site that stations are installed at.
///
/// City-only locations (as created by the CSV importer) carry no state,
/// country or coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub city_id: Uuid,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl Location {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Station {
    pub id: Uuid,
    pub user_id: Uuid,
    pub location_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MeasurementKind {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reading {
    pub id: Uuid,
    pub station_id: Uuid,
    pub measurement_id: Uuid,
    pub value: f64,
    /// Number of samples this row accounts for.
    pub length: i32,
    pub measured_at: OffsetDateTime,
}

/// A reading about to be written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewReading {
    pub station_id: Uuid,
    pub measurement_id: Uuid,
    pub value: f64,
    pub measured_at: OffsetDateTime,
}

impl NewReading {
    pub fn into_reading(self) -> Reading {
        Reading {
            id: Uuid::new_v4(),
            station_id: self.station_id,
            measurement_id: self.measurement_id,
            value: self.value,
            length: 1,
            measured_at: self.measured_at,
        }
    }
}

/// Filter for [`crate::repository::RecordStore::list_readings`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingFilter {
    pub station_id: Option<Uuid>,
    pub measurement_id: Option<Uuid>,
    pub since: Option<OffsetDateTime>,
}

impl ReadingFilter {
    pub fn for_station(station_id: Uuid) -> Self {
        Self {
            station_id: Some(station_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        self.station_id.is_none_or(|id| reading.station_id == id)
            && self.measurement_id.is_none_or(|id| reading.measurement_id == id)
            && self.since.is_none_or(|since| reading.measured_at >= since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_derived_email() {
        assert_eq!(derived_email("alice"), "alice@mail.com");
    }

    #[test]
    fn test_new_reading_has_unit_length() {
        let reading = NewReading {
            station_id: Uuid::new_v4(),
            measurement_id: Uuid::new_v4(),
            value: 21.5,
            measured_at: datetime!(2024-01-01 10:00 UTC),
        }
        .into_reading();

        assert_eq!(reading.length, 1);
        assert_eq!(reading.value, 21.5);
    }

    #[test]
    fn test_filter_matches() {
        let station = Uuid::new_v4();
        let reading = NewReading {
            station_id: station,
            measurement_id: Uuid::new_v4(),
            value: 1.0,
            measured_at: datetime!(2024-01-02 00:00 UTC),
        }
        .into_reading();

        assert!(ReadingFilter::default().matches(&reading));
        assert!(ReadingFilter::for_station(station).matches(&reading));
        assert!(!ReadingFilter::for_station(Uuid::new_v4()).matches(&reading));

        let later = ReadingFilter {
            since: Some(datetime!(2024-01-03 00:00 UTC)),
            ..Default::default()
        };
        assert!(!later.matches(&reading));
    }

    #[test]
    fn test_location_coordinates() {
        let mut location = Location {
            id: Uuid::new_v4(),
            city_id: Uuid::new_v4(),
            state_id: None,
            country_id: None,
            lat: None,
            lng: None,
        };
        assert_eq!(location.coordinates(), None);

        location.lat = Some(4.6);
        location.lng = Some(-74.1);
        assert_eq!(location.coordinates(), Some(Coordinates::new(4.6, -74.1)));
    }
}
