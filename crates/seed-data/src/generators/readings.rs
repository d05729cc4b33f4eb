//! Synthetic reading generation for load testing.
//!
//! Readings are laid on a simulated time axis that starts one month before
//! `now` (or just after the newest stored reading) and advances by a fixed
//! cadence. Generation stops at the target quantity or when simulated time
//! reaches `now`, whichever comes first.

use monitoring::geocoding::Geocoder;
use monitoring::models::NewReading;
use monitoring::{AppError, RecordStore};
use rand::Rng;
use rand::seq::SliceRandom;
use time::{Date, Duration, Month, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::config::GeneratorConfig;
use crate::generators::locations::{catalog_locations, ensure_measurements};
use crate::generators::stations::assign_stations;

/// Target quantity when the caller has no preference.
pub const DEFAULT_QUANTITY: u64 = 500_000;

/// The same instant one calendar month earlier, clamping the day to the shorter month.
pub fn one_month_before(now: OffsetDateTime) -> OffsetDateTime {
    let (year, month) = match now.month() {
        Month::January => (now.year() - 1, Month::December),
        month => (now.year(), month.previous()),
    };

    let last_day = time::util::days_in_year_month(year, month);

    Date::from_calendar_date(year, month, now.day().min(last_day))
        .map(|date| now.replace_date(date))
        .unwrap_or(now - Duration::days(30))
}

/// Why a generation run wrote nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Existing volume already meets the target.
    AlreadyPopulated,
    /// No station exists to attach readings to (e.g. there are no users).
    NoStations,
    NoMeasurements,
}

/// Summary of a generation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    /// Reading volume found before the run.
    pub existing_volume: u64,
    pub created_readings: u64,
    /// Volume counter when the run stopped.
    pub final_count: u64,
    pub first_timestamp: Option<OffsetDateTime>,
    pub last_timestamp: Option<OffsetDateTime>,
    pub locations: usize,
    pub stations: usize,
    pub measurements: usize,
    pub skipped: Option<SkipReason>,
}

/// Populates a store with structurally valid mock telemetry.
pub struct MockDataGenerator<'a, S: ?Sized, G: ?Sized> {
    store: &'a S,
    geocoder: &'a G,
    config: GeneratorConfig,
}

impl<'a, S, G> MockDataGenerator<'a, S, G>
where
    S: RecordStore + ?Sized,
    G: Geocoder + ?Sized,
{
    pub fn new(store: &'a S, geocoder: &'a G) -> Self {
        Self {
            store,
            geocoder,
            config: GeneratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    fn validate_config(&self) -> Result<(), AppError> {
        let config = &self.config;
        if config.value_range.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "empty value range {:?}",
                config.value_range
            )));
        }
        if config.stations_per_user.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "empty stations-per-user range {:?}",
                config.stations_per_user
            )));
        }
        if config.readings_per_day == 0 {
            return Err(AppError::InvalidInput(
                "readings_per_day must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Where the simulated time axis starts.
    async fn start_time(
        &self,
        existing: u64,
        now: OffsetDateTime,
    ) -> Result<OffsetDateTime, AppError> {
        if existing > 0 {
            if let Some(latest) = self.store.latest_reading_time().await? {
                return Ok(latest + self.config.resume_offset);
            }
        }
        Ok(one_month_before(now))
    }

    /// Generates readings until the store holds `quantity` or simulated time reaches `now`.
    ///
    /// Store failures stop the run; whatever was written before stays.
    pub async fn generate(
        &self,
        quantity: u64,
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> Result<GenerationReport, AppError> {
        self.validate_config()?;
        info!("Starting generation of {quantity} data...");

        let existing = u64::try_from(self.store.reading_volume().await?).unwrap_or(0);
        info!("Data in database: {existing}");

        let mut report = GenerationReport {
            existing_volume: existing,
            final_count: existing,
            ..Default::default()
        };

        if existing >= quantity {
            info!("Mock data already generated.");
            report.skipped = Some(SkipReason::AlreadyPopulated);
            return Ok(report);
        }

        ensure_measurements(self.store).await?;
        let locations =
            catalog_locations(self.store, self.geocoder, &self.config.catalog).await?;
        report.locations = locations.len();

        // Only accounts that can log in own stations
        let users: Vec<_> = self
            .store
            .list_users()
            .await?
            .into_iter()
            .filter(|user| user.password_hash.is_some())
            .collect();
        assign_stations(
            self.store,
            &users,
            &locations,
            self.config.stations_per_user.clone(),
            rng,
        )
        .await?;

        let start = self.start_time(existing, now).await?;
        let cadence = self.config.cadence();
        info!("Init date: {start}");
        info!("Data per day: {}", self.config.readings_per_day);
        info!("Interval (milliseconds): {}", cadence.whole_milliseconds());

        let stations = self.store.list_stations().await?;
        let measurements = self.store.list_measurements().await?;
        report.stations = stations.len();
        report.measurements = measurements.len();
        info!("Total stations: {}", stations.len());
        info!("Total measures: {}", measurements.len());

        if stations.is_empty() {
            warn!(
                "No stations to generate readings for ({} users); nothing to do",
                users.len()
            );
            report.skipped = Some(SkipReason::NoStations);
            return Ok(report);
        }
        if measurements.is_empty() {
            warn!("No measurement kinds to generate readings for; nothing to do");
            report.skipped = Some(SkipReason::NoMeasurements);
            return Ok(report);
        }

        let mut count = existing;
        let mut current = start;

        while count < quantity && current < now {
            let (Some(station), Some(measurement)) =
                (stations.choose(rng), measurements.choose(rng))
            else {
                break;
            };
            let value = rng.gen_range(self.config.value_range.clone());

            self.store
                .create_reading(NewReading {
                    station_id: station.id,
                    measurement_id: measurement.id,
                    value,
                    measured_at: current,
                })
                .await?;
            debug!("Data created: {count} {}", current.unix_timestamp());

            report.first_timestamp.get_or_insert(current);
            report.last_timestamp = Some(current);
            report.created_readings += 1;
            count += 1;
            current += cadence;

            if report.created_readings % self.config.progress_every.max(1) == 0 {
                info!("  Generated {}/{} readings", count, quantity);
            }
        }

        report.final_count = count;
        info!("Finished. Total data: {count} Last date: {current}");
        Ok(report)
    }
}
