//! Historical measurement import from `user,city,timestamp,variable,value` CSV files.

use std::io::Read;
use std::path::Path;

use monitoring::RecordStore;
use monitoring::models::{NewReading, Reading};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, error, info};

use crate::errors::{ImportError, SeedError};

/// Log progress every this many rows.
const PROGRESS_EVERY: usize = 1000;

/// Unit for a variable name: `°C` for temperature, `%` for anything else.
pub fn infer_unit(variable: &str) -> &'static str {
    if variable.eq_ignore_ascii_case("temperatura") {
        "°C"
    } else {
        "%"
    }
}

/// One data row of the measurement CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub user: String,
    pub city: String,
    pub measured_at: OffsetDateTime,
    pub variable: String,
    pub value: f64,
}

/// Parses `YYYY-MM-DD HH:MM:SS` as a UTC timestamp.
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime, ImportError> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    PrimitiveDateTime::parse(value, format)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|source| ImportError::Timestamp {
            value: value.to_string(),
            source,
        })
}

pub fn parse_row(record: &csv::StringRecord) -> Result<MeasurementRow, ImportError> {
    if record.len() != 5 {
        return Err(ImportError::MalformedLine(format!(
            "expected 5 fields, found {}",
            record.len()
        )));
    }
    let (user, city, timestamp, variable, value) =
        (&record[0], &record[1], &record[2], &record[3], &record[4]);

    let measured_at = parse_timestamp(timestamp)?;
    let value = value.parse::<f64>().map_err(|source| ImportError::Number {
        value: value.to_string(),
        source,
    })?;

    Ok(MeasurementRow {
        user: user.to_string(),
        city: city.to_string(),
        measured_at,
        variable: variable.to_string(),
        value,
    })
}

/// Resolves the row's user, location, station and measurement kind, then writes the reading.
pub async fn save_measurement<S>(store: &S, row: &MeasurementRow) -> Result<Reading, ImportError>
where
    S: RecordStore + ?Sized,
{
    let (user, _) = store.get_or_create_user(&row.user).await?;
    let (city, _) = store.get_or_create_city(&row.city).await?;
    let (location, _) = store.get_or_create_city_location(&city).await?;
    let (measurement, _) = store
        .get_or_create_measurement(&row.variable, infer_unit(&row.variable))
        .await?;
    let (station, _) = store.get_or_create_station(user.id, location.id).await?;

    let reading = store
        .create_reading(NewReading {
            station_id: station.id,
            measurement_id: measurement.id,
            value: row.value,
            measured_at: row.measured_at,
        })
        .await?;

    Ok(reading)
}

/// Counts from a CSV import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvImportReport {
    pub rows: usize,
    pub imported: usize,
    pub failed: usize,
}

/// Imports every data row from `reader`. The first line is a header and is skipped.
///
/// Bad rows are logged and skipped; only an I/O failure of the reader aborts the import.
pub async fn import_csv<S, R>(store: &S, reader: R) -> Result<CsvImportReport, SeedError>
where
    S: RecordStore + ?Sized,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .quoting(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut report = CsvImportReport::default();

    for result in csv_reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                error!("ERROR reading CSV row: {e}");
                report.rows += 1;
                report.failed += 1;
                continue;
            }
        };

        report.rows += 1;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let outcome = match parse_row(&record) {
            Ok(row) => save_measurement(store, &row).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(reading) => {
                debug!(line, reading_id = %reading.id, "Saved measure");
                report.imported += 1;
            }
            Err(e) => {
                error!(line, "ERROR saving measure: {e}");
                report.failed += 1;
            }
        }

        if report.rows % PROGRESS_EVERY == 0 {
            info!("  Processed {} rows", report.rows);
        }
    }

    info!(
        rows = report.rows,
        imported = report.imported,
        failed = report.failed,
        "CSV import finished"
    );

    Ok(report)
}

/// Imports the CSV file at `path`.
pub async fn import_csv_file<S>(store: &S, path: &Path) -> Result<CsvImportReport, SeedError>
where
    S: RecordStore + ?Sized,
{
    let contents = tokio::fs::read(path).await.map_err(|source| SeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let line_count = contents.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count();
    info!("CSV length: {line_count} lines ({})", path.display());

    import_csv(store, contents.as_slice()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FailingReadingStore;
    use monitoring::memory::InMemoryStore;
    use monitoring::models::ReadingFilter;
    use time::macros::datetime;

    const HEADER: &str = "usuario,ciudad,fecha,variable,medicion\n";

    #[test]
    fn test_infer_unit() {
        assert_eq!(infer_unit("Temperatura"), "°C");
        assert_eq!(infer_unit("TEMPERATURA"), "°C");
        assert_eq!(infer_unit("temperatura"), "°C");
        assert_eq!(infer_unit("Humedad"), "%");
        assert_eq!(infer_unit("Temperatura2"), "%");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("2024-01-01 10:00:00").unwrap(),
            datetime!(2024-01-01 10:00:00 UTC)
        );
        assert!(parse_timestamp("2024-01-01T10:00:00").is_err());
        assert!(parse_timestamp("2024-13-01 10:00:00").is_err());
    }

    #[test]
    fn test_parse_row_field_count() {
        let record = csv::StringRecord::from(vec!["bob", "Cali", "2024-01-01 10:00:00"]);
        assert!(matches!(
            parse_row(&record),
            Err(ImportError::MalformedLine(_))
        ));
    }

    #[test]
    fn test_parse_row_bad_value() {
        let record = csv::StringRecord::from(vec![
            "bob",
            "Cali",
            "2024-01-01 10:00:00",
            "Temperatura",
            "warm",
        ]);
        assert!(matches!(parse_row(&record), Err(ImportError::Number { .. })));
    }

    #[tokio::test]
    async fn test_import_single_row() {
        let store = InMemoryStore::new();
        let csv = format!("{HEADER}bob,Cali,2024-01-01 10:00:00,Temperatura,21.5\n");

        let report = import_csv(&store, csv.as_bytes()).await.unwrap();
        assert_eq!(
            report,
            CsvImportReport {
                rows: 1,
                imported: 1,
                failed: 0,
            }
        );

        let readings = store.list_readings(ReadingFilter::default()).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, 21.5);
        assert_eq!(readings[0].measured_at, datetime!(2024-01-01 10:00:00 UTC));

        let measurements = store.list_measurements().await.unwrap();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].name, "Temperatura");
        assert_eq!(measurements[0].unit, "°C");
        assert_eq!(readings[0].measurement_id, measurements[0].id);

        let stations = store.list_stations().await.unwrap();
        let users = store.list_users().await.unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "bob");
        assert_eq!(stations[0].user_id, users[0].id);
        assert_eq!(readings[0].station_id, stations[0].id);
    }

    #[tokio::test]
    async fn test_rows_share_entities() {
        let store = InMemoryStore::new();
        let csv = format!(
            "{HEADER}\
             bob,Cali,2024-01-01 10:00:00,Temperatura,21.5\n\
             bob,Cali,2024-01-01 11:00:00,Humedad,60\n\
             ana,Cali,2024-01-01 10:00:00,Humedad,55\n"
        );

        let report = import_csv(&store, csv.as_bytes()).await.unwrap();
        assert_eq!(report.imported, 3);

        assert_eq!(store.list_users().await.unwrap().len(), 2);
        assert_eq!(store.list_stations().await.unwrap().len(), 2);
        assert_eq!(store.list_measurements().await.unwrap().len(), 2);
        // One city-only location shared by both users
        assert_eq!(store.location_count(), 1);
    }

    #[tokio::test]
    async fn test_bad_rows_are_skipped() {
        let store = InMemoryStore::new();
        let csv = format!(
            "{HEADER}\
             bob,Cali,not-a-date,Temperatura,21.5\n\
             bob,Cali,2024-01-01 10:00:00,Temperatura\n\
             bob,Cali,2024-01-01 10:00:00,Temperatura,hot\n\
             bob,Cali,2024-01-02 10:00:00,Temperatura,19.0\n"
        );

        let report = import_csv(&store, csv.as_bytes()).await.unwrap();
        assert_eq!(report.rows, 4);
        assert_eq!(report.failed, 3);
        assert_eq!(report.imported, 1);

        let readings = store.list_readings(ReadingFilter::default()).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, 19.0);
    }

    #[tokio::test]
    async fn test_store_error_skips_only_that_row() {
        let store = FailingReadingStore::new(InMemoryStore::new(), [1]);
        let csv = format!(
            "{HEADER}\
             bob,Cali,2024-01-01 10:00:00,Temperatura,21.5\n\
             bob,Cali,2024-01-01 11:00:00,Temperatura,22.0\n\
             bob,Cali,2024-01-01 12:00:00,Temperatura,22.5\n"
        );

        let report = import_csv(&store, csv.as_bytes()).await.unwrap();
        assert_eq!(
            report,
            CsvImportReport {
                rows: 3,
                imported: 2,
                failed: 1,
            }
        );

        let readings = store
            .inner
            .list_readings(ReadingFilter::default())
            .await
            .unwrap();
        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![21.5, 22.5]);
    }

    #[tokio::test]
    async fn test_header_only() {
        let store = InMemoryStore::new();
        let report = import_csv(&store, HEADER.as_bytes()).await.unwrap();
        assert_eq!(report, CsvImportReport::default());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let store = InMemoryStore::new();
        let result = import_csv_file(&store, Path::new("/nonexistent/input.csv")).await;
        assert!(matches!(result, Err(SeedError::Io { .. })));
    }
}
