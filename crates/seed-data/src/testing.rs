//! Test doubles shared by the unit test modules.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use monitoring::memory::InMemoryStore;
use monitoring::models::{
    City, Coordinates, Country, Location, MeasurementKind, NewReading, Reading, ReadingFilter,
    State, Station, UserAccount,
};
use monitoring::{AppError, RecordStore};
use time::OffsetDateTime;
use uuid::Uuid;

/// An [`InMemoryStore`] whose `create_reading` fails on chosen calls (0-based).
pub struct FailingReadingStore {
    pub inner: InMemoryStore,
    failing_calls: HashSet<usize>,
    calls: AtomicUsize,
}

impl FailingReadingStore {
    pub fn new(inner: InMemoryStore, failing_calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            inner,
            failing_calls: failing_calls.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordStore for FailingReadingStore {
    async fn get_or_create_user(&self, name: &str) -> Result<(UserAccount, bool), AppError> {
        self.inner.get_or_create_user(name).await
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>, AppError> {
        self.inner.list_users().await
    }

    async fn get_or_create_country(&self, name: &str) -> Result<(Country, bool), AppError> {
        self.inner.get_or_create_country(name).await
    }

    async fn get_or_create_state(&self, name: &str) -> Result<(State, bool), AppError> {
        self.inner.get_or_create_state(name).await
    }

    async fn get_or_create_city(&self, name: &str) -> Result<(City, bool), AppError> {
        self.inner.get_or_create_city(name).await
    }

    async fn get_or_create_location(
        &self,
        city: &City,
        state: &State,
        country: &Country,
        coordinates: Coordinates,
    ) -> Result<(Location, bool), AppError> {
        self.inner
            .get_or_create_location(city, state, country, coordinates)
            .await
    }

    async fn get_or_create_city_location(&self, city: &City) -> Result<(Location, bool), AppError> {
        self.inner.get_or_create_city_location(city).await
    }

    async fn get_or_create_station(
        &self,
        user_id: Uuid,
        location_id: Uuid,
    ) -> Result<(Station, bool), AppError> {
        self.inner.get_or_create_station(user_id, location_id).await
    }

    async fn list_stations(&self) -> Result<Vec<Station>, AppError> {
        self.inner.list_stations().await
    }

    async fn get_or_create_measurement(
        &self,
        name: &str,
        unit: &str,
    ) -> Result<(MeasurementKind, bool), AppError> {
        self.inner.get_or_create_measurement(name, unit).await
    }

    async fn list_measurements(&self) -> Result<Vec<MeasurementKind>, AppError> {
        self.inner.list_measurements().await
    }

    async fn create_reading(&self, reading: NewReading) -> Result<Reading, AppError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_calls.contains(&call) {
            return Err(AppError::Io(std::io::Error::other("connection reset")));
        }
        self.inner.create_reading(reading).await
    }

    async fn reading_volume(&self) -> Result<i64, AppError> {
        self.inner.reading_volume().await
    }

    async fn latest_reading_time(&self) -> Result<Option<OffsetDateTime>, AppError> {
        self.inner.latest_reading_time().await
    }

    async fn list_readings(&self, filter: ReadingFilter) -> Result<Vec<Reading>, AppError> {
        self.inner.list_readings(filter).await
    }
}
