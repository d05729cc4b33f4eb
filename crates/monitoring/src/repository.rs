//! Storage interfaces consumed by the seeding tools.
//!
//! Every `get_or_create_*` method is an idempotent upsert keyed on the
//! entity's natural key: calling it repeatedly with the same key returns the
//! same entity, and the boolean is `true` only for the call that inserted it.
//! Attributes that are not part of the key (a location's coordinates, a
//! measurement's unit) are applied on insert and never overwritten.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    City, Coordinates, Country, Location, MeasurementKind, NewReading, Reading, ReadingFilter,
    State, Station, UserAccount,
};

/// Login accounts with secrets.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user_by_name(&self, name: &str) -> Result<Option<UserAccount>, AppError>;

    /// Creates an account, hashing `password` before it is stored.
    ///
    /// Fails with [`AppError::Conflict`] when the name is taken.
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserAccount, AppError>;

    /// Gives a password-less account its first password.
    ///
    /// Returns `false` when the account already has one, which is left untouched.
    async fn set_initial_password(&self, user_id: Uuid, password: &str) -> Result<bool, AppError>;
}

/// Entity store backing the telemetry tables.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Looks up a user by name, creating a password-less account if absent.
    ///
    /// Such accounts cannot log in until [`IdentityStore::set_initial_password`] is called.
    async fn get_or_create_user(&self, name: &str) -> Result<(UserAccount, bool), AppError>;

    async fn list_users(&self) -> Result<Vec<UserAccount>, AppError>;

    async fn get_or_create_country(&self, name: &str) -> Result<(Country, bool), AppError>;

    async fn get_or_create_state(&self, name: &str) -> Result<(State, bool), AppError>;

    async fn get_or_create_city(&self, name: &str) -> Result<(City, bool), AppError>;

    /// Keyed on `(city, state, country)`.
    async fn get_or_create_location(
        &self,
        city: &City,
        state: &State,
        country: &Country,
        coordinates: Coordinates,
    ) -> Result<(Location, bool), AppError>;

    /// Keyed on the city alone; the location has no state, country or coordinates.
    async fn get_or_create_city_location(&self, city: &City) -> Result<(Location, bool), AppError>;

    async fn get_or_create_station(
        &self,
        user_id: Uuid,
        location_id: Uuid,
    ) -> Result<(Station, bool), AppError>;

    async fn list_stations(&self) -> Result<Vec<Station>, AppError>;

    async fn get_or_create_measurement(
        &self,
        name: &str,
        unit: &str,
    ) -> Result<(MeasurementKind, bool), AppError>;

    async fn list_measurements(&self) -> Result<Vec<MeasurementKind>, AppError>;

    /// Appends a reading. The station and measurement must already exist.
    async fn create_reading(&self, reading: NewReading) -> Result<Reading, AppError>;

    /// Sum of `length` over all readings, 0 when there are none.
    async fn reading_volume(&self) -> Result<i64, AppError>;

    /// Latest `measured_at` over all readings.
    async fn latest_reading_time(&self) -> Result<Option<OffsetDateTime>, AppError>;

    /// Readings matching `filter`, oldest first.
    async fn list_readings(&self, filter: ReadingFilter) -> Result<Vec<Reading>, AppError>;
}
