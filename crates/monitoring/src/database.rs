use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::errors::AppError;
use crate::models::{
    City, Coordinates, Country, Location, MeasurementKind, NewReading, Place, Reading,
    ReadingFilter, State, Station, UserAccount, derived_email,
};
use crate::repository::{IdentityStore, RecordStore};

/// Opens a pool and applies the embedded migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<Database, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(Database::new(pool))
}

/// Tables holding [`Place`] rows.
#[derive(Debug, Clone, Copy)]
enum PlaceTable {
    Countries,
    States,
    Cities,
}

impl PlaceTable {
    fn as_str(self) -> &'static str {
        match self {
            PlaceTable::Countries => "countries",
            PlaceTable::States => "states",
            PlaceTable::Cities => "cities",
        }
    }
}

/// Splits a row produced by an upsert query into the entity and its `created` flag.
fn with_created<T>(row: &PgRow) -> Result<(T, bool), AppError>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    let created: bool = row.try_get("created")?;
    Ok((T::from_row(row)?, created))
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn get_or_create_place(
        &self,
        table: PlaceTable,
        name: &str,
    ) -> Result<(Place, bool), AppError> {
        let table = table.as_str();
        let query = format!(
            r#"
            WITH inserted AS (
                INSERT INTO {table} (id, name)
                VALUES ($1, $2)
                ON CONFLICT (name) DO NOTHING
                RETURNING id, name
            )
            SELECT id, name, TRUE AS created FROM inserted
            UNION ALL
            SELECT id, name, FALSE AS created FROM {table} WHERE name = $2
            LIMIT 1
            "#
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        with_created(&row)
    }

    async fn upsert_location(
        &self,
        city_id: Uuid,
        state_id: Option<Uuid>,
        country_id: Option<Uuid>,
        coordinates: Option<Coordinates>,
    ) -> Result<(Location, bool), AppError> {
        let row = sqlx::query(
            r#"
            WITH inserted AS (
                INSERT INTO locations (id, city_id, state_id, country_id, lat, lng)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT ON CONSTRAINT locations_natural_key DO NOTHING
                RETURNING id, city_id, state_id, country_id, lat, lng
            )
            SELECT id, city_id, state_id, country_id, lat, lng, TRUE AS created FROM inserted
            UNION ALL
            SELECT id, city_id, state_id, country_id, lat, lng, FALSE AS created
            FROM locations
            WHERE city_id = $2
              AND state_id IS NOT DISTINCT FROM $3
              AND country_id IS NOT DISTINCT FROM $4
            LIMIT 1
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(city_id)
        .bind(state_id)
        .bind(country_id)
        .bind(coordinates.map(|c| c.lat))
        .bind(coordinates.map(|c| c.lng))
        .fetch_one(&self.pool)
        .await?;

        with_created(&row)
    }
}

#[async_trait]
impl IdentityStore for Database {
    async fn find_user_by_name(&self, name: &str) -> Result<Option<UserAccount>, AppError> {
        let user = sqlx::query_as(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserAccount, AppError> {
        let user = UserAccount::new(
            name.to_string(),
            email.to_string(),
            Some(hash_password(password)?),
        );

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!("user {name}")));
        }

        Ok(user)
    }

    async fn set_initial_password(&self, user_id: Uuid, password: &str) -> Result<bool, AppError> {
        let password_hash = hash_password(password)?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2
            WHERE id = $1 AND password_hash IS NULL
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RecordStore for Database {
    async fn get_or_create_user(&self, name: &str) -> Result<(UserAccount, bool), AppError> {
        let row = sqlx::query(
            r#"
            WITH inserted AS (
                INSERT INTO users (id, name, email, password_hash, created_at)
                VALUES ($1, $2, $3, NULL, NOW())
                ON CONFLICT (name) DO NOTHING
                RETURNING id, name, email, password_hash, created_at
            )
            SELECT id, name, email, password_hash, created_at, TRUE AS created FROM inserted
            UNION ALL
            SELECT id, name, email, password_hash, created_at, FALSE AS created
            FROM users
            WHERE name = $2
            LIMIT 1
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(derived_email(name))
        .fetch_one(&self.pool)
        .await?;

        with_created(&row)
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>, AppError> {
        let users = sqlx::query_as(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            ORDER BY created_at, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn get_or_create_country(&self, name: &str) -> Result<(Country, bool), AppError> {
        self.get_or_create_place(PlaceTable::Countries, name).await
    }

    async fn get_or_create_state(&self, name: &str) -> Result<(State, bool), AppError> {
        self.get_or_create_place(PlaceTable::States, name).await
    }

    async fn get_or_create_city(&self, name: &str) -> Result<(City, bool), AppError> {
        self.get_or_create_place(PlaceTable::Cities, name).await
    }

    async fn get_or_create_location(
        &self,
        city: &City,
        state: &State,
        country: &Country,
        coordinates: Coordinates,
    ) -> Result<(Location, bool), AppError> {
        self.upsert_location(city.id, Some(state.id), Some(country.id), Some(coordinates))
            .await
    }

    async fn get_or_create_city_location(&self, city: &City) -> Result<(Location, bool), AppError> {
        self.upsert_location(city.id, None, None, None).await
    }

    async fn get_or_create_station(
        &self,
        user_id: Uuid,
        location_id: Uuid,
    ) -> Result<(Station, bool), AppError> {
        let row = sqlx::query(
            r#"
            WITH inserted AS (
                INSERT INTO stations (id, user_id, location_id)
                VALUES ($1, $2, $3)
                ON CONFLICT ON CONSTRAINT stations_natural_key DO NOTHING
                RETURNING id, user_id, location_id
            )
            SELECT id, user_id, location_id, TRUE AS created FROM inserted
            UNION ALL
            SELECT id, user_id, location_id, FALSE AS created
            FROM stations
            WHERE user_id = $2 AND location_id = $3
            LIMIT 1
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(location_id)
        .fetch_one(&self.pool)
        .await?;

        with_created(&row)
    }

    async fn list_stations(&self) -> Result<Vec<Station>, AppError> {
        let stations = sqlx::query_as("SELECT id, user_id, location_id FROM stations ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(stations)
    }

    async fn get_or_create_measurement(
        &self,
        name: &str,
        unit: &str,
    ) -> Result<(MeasurementKind, bool), AppError> {
        let row = sqlx::query(
            r#"
            WITH inserted AS (
                INSERT INTO measurements (id, name, unit)
                VALUES ($1, $2, $3)
                ON CONFLICT (name) DO NOTHING
                RETURNING id, name, unit
            )
            SELECT id, name, unit, TRUE AS created FROM inserted
            UNION ALL
            SELECT id, name, unit, FALSE AS created FROM measurements WHERE name = $2
            LIMIT 1
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(unit)
        .fetch_one(&self.pool)
        .await?;

        with_created(&row)
    }

    async fn list_measurements(&self) -> Result<Vec<MeasurementKind>, AppError> {
        let measurements = sqlx::query_as("SELECT id, name, unit FROM measurements ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(measurements)
    }

    async fn create_reading(&self, reading: NewReading) -> Result<Reading, AppError> {
        let reading = reading.into_reading();

        sqlx::query(
            r#"
            INSERT INTO readings (id, station_id, measurement_id, value, length, measured_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(reading.id)
        .bind(reading.station_id)
        .bind(reading.measurement_id)
        .bind(reading.value)
        .bind(reading.length)
        .bind(reading.measured_at)
        .execute(&self.pool)
        .await?;

        Ok(reading)
    }

    async fn reading_volume(&self) -> Result<i64, AppError> {
        let volume: Option<i64> = sqlx::query_scalar("SELECT SUM(length)::BIGINT FROM readings")
            .fetch_one(&self.pool)
            .await?;

        Ok(volume.unwrap_or(0))
    }

    async fn latest_reading_time(&self) -> Result<Option<OffsetDateTime>, AppError> {
        let latest = sqlx::query_scalar("SELECT MAX(measured_at) FROM readings")
            .fetch_one(&self.pool)
            .await?;

        Ok(latest)
    }

    async fn list_readings(&self, filter: ReadingFilter) -> Result<Vec<Reading>, AppError> {
        let readings = sqlx::query_as(
            r#"
            SELECT id, station_id, measurement_id, value, length, measured_at
            FROM readings
            WHERE ($1::UUID IS NULL OR station_id = $1)
              AND ($2::UUID IS NULL OR measurement_id = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR measured_at >= $3)
            ORDER BY measured_at
            "#,
        )
        .bind(filter.station_id)
        .bind(filter.measurement_id)
        .bind(filter.since)
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }
}
