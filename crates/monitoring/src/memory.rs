//! In-process [`RecordStore`]/[`IdentityStore`] used by tests and dry runs.
//!
//! Natural-key semantics match [`crate::database::Database`]: lookups are
//! exact, and attributes outside the key are only set on insert.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::errors::AppError;
use crate::models::{
    City, Coordinates, Country, Location, MeasurementKind, NewReading, Place, Reading,
    ReadingFilter, State, Station, UserAccount, derived_email,
};
use crate::repository::{IdentityStore, RecordStore};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<UserAccount>,
    countries: Vec<Place>,
    states: Vec<Place>,
    cities: Vec<Place>,
    locations: Vec<Location>,
    stations: Vec<Station>,
    measurements: Vec<MeasurementKind>,
    readings: Vec<Reading>,
}

fn get_or_insert_place(places: &mut Vec<Place>, name: &str) -> (Place, bool) {
    if let Some(place) = places.iter().find(|p| p.name == name) {
        return (place.clone(), false);
    }
    let place = Place::new(name);
    places.push(place.clone());
    (place, true)
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    fn upsert_location(
        &self,
        city_id: Uuid,
        state_id: Option<Uuid>,
        country_id: Option<Uuid>,
        coordinates: Option<Coordinates>,
    ) -> (Location, bool) {
        let mut tables = self.write();
        if let Some(location) = tables.locations.iter().find(|l| {
            l.city_id == city_id && l.state_id == state_id && l.country_id == country_id
        }) {
            return (location.clone(), false);
        }

        let location = Location {
            id: Uuid::new_v4(),
            city_id,
            state_id,
            country_id,
            lat: coordinates.map(|c| c.lat),
            lng: coordinates.map(|c| c.lng),
        };
        tables.locations.push(location.clone());
        (location, true)
    }

    /// Number of location rows, regardless of kind.
    pub fn location_count(&self) -> usize {
        self.read().locations.len()
    }

    /// Number of reading rows; differs from the volume when rows carry `length > 1`.
    pub fn reading_count(&self) -> usize {
        self.read().readings.len()
    }

    /// Inserts a pre-built reading as-is, bypassing referential checks.
    pub fn insert_raw_reading(&self, reading: Reading) {
        self.write().readings.push(reading);
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_user_by_name(&self, name: &str) -> Result<Option<UserAccount>, AppError> {
        Ok(self.read().users.iter().find(|u| u.name == name).cloned())
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserAccount, AppError> {
        let password_hash = hash_password(password)?;

        let mut tables = self.write();
        if tables.users.iter().any(|u| u.name == name) {
            return Err(AppError::Conflict(format!("user {name}")));
        }

        let user = UserAccount::new(name.to_string(), email.to_string(), Some(password_hash));
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn set_initial_password(&self, user_id: Uuid, password: &str) -> Result<bool, AppError> {
        let password_hash = hash_password(password)?;

        let mut tables = self.write();
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(AppError::NotFound)?;
        if user.password_hash.is_some() {
            return Ok(false);
        }
        user.password_hash = Some(password_hash);
        Ok(true)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_or_create_user(&self, name: &str) -> Result<(UserAccount, bool), AppError> {
        let mut tables = self.write();
        if let Some(user) = tables.users.iter().find(|u| u.name == name) {
            return Ok((user.clone(), false));
        }

        let user = UserAccount::new(name.to_string(), derived_email(name), None);
        tables.users.push(user.clone());
        Ok((user, true))
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>, AppError> {
        Ok(self.read().users.clone())
    }

    async fn get_or_create_country(&self, name: &str) -> Result<(Country, bool), AppError> {
        Ok(get_or_insert_place(&mut self.write().countries, name))
    }

    async fn get_or_create_state(&self, name: &str) -> Result<(State, bool), AppError> {
        Ok(get_or_insert_place(&mut self.write().states, name))
    }

    async fn get_or_create_city(&self, name: &str) -> Result<(City, bool), AppError> {
        Ok(get_or_insert_place(&mut self.write().cities, name))
    }

    async fn get_or_create_location(
        &self,
        city: &City,
        state: &State,
        country: &Country,
        coordinates: Coordinates,
    ) -> Result<(Location, bool), AppError> {
        Ok(self.upsert_location(city.id, Some(state.id), Some(country.id), Some(coordinates)))
    }

    async fn get_or_create_city_location(&self, city: &City) -> Result<(Location, bool), AppError> {
        Ok(self.upsert_location(city.id, None, None, None))
    }

    async fn get_or_create_station(
        &self,
        user_id: Uuid,
        location_id: Uuid,
    ) -> Result<(Station, bool), AppError> {
        let mut tables = self.write();
        if let Some(station) = tables
            .stations
            .iter()
            .find(|s| s.user_id == user_id && s.location_id == location_id)
        {
            return Ok((station.clone(), false));
        }

        if !tables.users.iter().any(|u| u.id == user_id)
            || !tables.locations.iter().any(|l| l.id == location_id)
        {
            return Err(AppError::NotFound);
        }

        let station = Station {
            id: Uuid::new_v4(),
            user_id,
            location_id,
        };
        tables.stations.push(station.clone());
        Ok((station, true))
    }

    async fn list_stations(&self) -> Result<Vec<Station>, AppError> {
        Ok(self.read().stations.clone())
    }

    async fn get_or_create_measurement(
        &self,
        name: &str,
        unit: &str,
    ) -> Result<(MeasurementKind, bool), AppError> {
        let mut tables = self.write();
        if let Some(kind) = tables.measurements.iter().find(|m| m.name == name) {
            return Ok((kind.clone(), false));
        }

        let kind = MeasurementKind {
            id: Uuid::new_v4(),
            name: name.to_string(),
            unit: unit.to_string(),
        };
        tables.measurements.push(kind.clone());
        Ok((kind, true))
    }

    async fn list_measurements(&self) -> Result<Vec<MeasurementKind>, AppError> {
        Ok(self.read().measurements.clone())
    }

    async fn create_reading(&self, reading: NewReading) -> Result<Reading, AppError> {
        let mut tables = self.write();
        if !tables.stations.iter().any(|s| s.id == reading.station_id)
            || !tables
                .measurements
                .iter()
                .any(|m| m.id == reading.measurement_id)
        {
            return Err(AppError::NotFound);
        }

        let reading = reading.into_reading();
        tables.readings.push(reading.clone());
        Ok(reading)
    }

    async fn reading_volume(&self) -> Result<i64, AppError> {
        Ok(self
            .read()
            .readings
            .iter()
            .map(|r| i64::from(r.length))
            .sum())
    }

    async fn latest_reading_time(&self) -> Result<Option<OffsetDateTime>, AppError> {
        Ok(self.read().readings.iter().map(|r| r.measured_at).max())
    }

    async fn list_readings(&self, filter: ReadingFilter) -> Result<Vec<Reading>, AppError> {
        let mut readings: Vec<Reading> = self
            .read()
            .readings
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        readings.sort_by_key(|r| r.measured_at);
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = InMemoryStore::new();

        let (first, created) = store.get_or_create_city("Cali").await.unwrap();
        assert!(created);
        let (second, created) = store.get_or_create_city("Cali").await.unwrap();
        assert!(!created);
        assert_eq!(first, second);

        // Same name in a different table is a different entity
        let (state, created) = store.get_or_create_state("Cali").await.unwrap();
        assert!(created);
        assert_ne!(state.id, first.id);
    }

    #[tokio::test]
    async fn test_location_keys() {
        let store = InMemoryStore::new();
        let (city, _) = store.get_or_create_city("Cali").await.unwrap();
        let (state, _) = store.get_or_create_state("Valle").await.unwrap();
        let (country, _) = store.get_or_create_country("Colombia").await.unwrap();

        let coords = Coordinates::new(3.45, -76.53);
        let (full, created) = store
            .get_or_create_location(&city, &state, &country, coords)
            .await
            .unwrap();
        assert!(created);

        // Coordinates are not part of the key
        let (again, created) = store
            .get_or_create_location(&city, &state, &country, Coordinates::new(0.0, 0.0))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(again.coordinates(), Some(coords));

        let (city_only, created) = store.get_or_create_city_location(&city).await.unwrap();
        assert!(created);
        assert_ne!(city_only.id, full.id);
        assert_eq!(city_only.coordinates(), None);
        assert_eq!(store.location_count(), 2);
    }

    #[tokio::test]
    async fn test_create_user_conflict() {
        let store = InMemoryStore::new();
        store
            .create_user("alice", "alice@mail.com", "pw1")
            .await
            .unwrap();

        let err = store
            .create_user("alice", "alice@mail.com", "other")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let user = store.find_user_by_name("alice").await.unwrap().unwrap();
        let hash = user.password_hash.unwrap();
        assert!(crate::auth::verify_password("pw1", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_set_initial_password_only_once() {
        let store = InMemoryStore::new();
        let (user, _) = store.get_or_create_user("bob").await.unwrap();
        assert!(user.password_hash.is_none());

        assert!(store.set_initial_password(user.id, "pw2").await.unwrap());
        assert!(!store.set_initial_password(user.id, "other").await.unwrap());

        let bob = store.find_user_by_name("bob").await.unwrap().unwrap();
        let hash = bob.password_hash.unwrap();
        assert!(crate::auth::verify_password("pw2", &hash).unwrap());

        let err = store
            .set_initial_password(Uuid::new_v4(), "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn test_readings_require_existing_references() {
        let store = InMemoryStore::new();
        let err = store
            .create_reading(NewReading {
                station_id: Uuid::new_v4(),
                measurement_id: Uuid::new_v4(),
                value: 1.0,
                measured_at: datetime!(2024-01-01 00:00 UTC),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
        assert_eq!(store.reading_count(), 0);
    }

    #[tokio::test]
    async fn test_volume_sums_length() {
        let store = InMemoryStore::new();
        assert_eq!(store.reading_volume().await.unwrap(), 0);
        assert_eq!(store.latest_reading_time().await.unwrap(), None);

        let mut reading = NewReading {
            station_id: Uuid::new_v4(),
            measurement_id: Uuid::new_v4(),
            value: 1.0,
            measured_at: datetime!(2024-01-01 00:00 UTC),
        }
        .into_reading();
        reading.length = 60;
        store.insert_raw_reading(reading);

        assert_eq!(store.reading_volume().await.unwrap(), 60);
        assert_eq!(store.reading_count(), 1);
        assert_eq!(
            store.latest_reading_time().await.unwrap(),
            Some(datetime!(2024-01-01 00:00 UTC))
        );
    }
}
