//! Registers accounts from the credentials file, then fills the database with mock readings.
//!
//! Run with:
//! ```
//! cargo run -p seed-data --bin seed -- 20000
//! ```

use clap::Parser;
use monitoring::database;
use monitoring::geocoding::{Geocoder, NominatimGeocoder};
use monitoring::memory::InMemoryStore;
use monitoring::{IdentityStore, RecordStore};
use rand::SeedableRng;
use rand::rngs::StdRng;
use seed_data::config::{
    CITY_CATALOG, DEFAULT_COMMAND_QUANTITY, GeneratorConfig, Settings, catalog_geocoder,
};
use seed_data::credentials::register_users_from_file;
use seed_data::generators::MockDataGenerator;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Seed users and mock readings")]
struct Args {
    /// Total reading volume to reach
    #[arg(
        value_parser = clap::value_parser!(u64).range(1..),
        default_value_t = DEFAULT_COMMAND_QUANTITY
    )]
    quantity: u64,

    /// Seed for reproducible data
    #[arg(long)]
    seed: Option<u64>,

    /// Run against an in-memory store with catalog coordinates instead of the database
    #[arg(long)]
    dry_run: bool,
}

async fn run<S, G>(
    store: &S,
    geocoder: &G,
    settings: &Settings,
    args: &Args,
) -> anyhow::Result<()>
where
    S: IdentityStore + RecordStore,
    G: Geocoder,
{
    match register_users_from_file(store, &settings.users_file).await {
        Ok(tally) => tracing::info!(
            "Users: {} already registered, {} new, {} errors",
            tally.already_registered,
            tally.newly_registered,
            tally.errors
        ),
        Err(e) => tracing::warn!("Skipping user registration: {e}"),
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let report = MockDataGenerator::new(store, geocoder)
        .with_config(GeneratorConfig::default())
        .generate(args.quantity, OffsetDateTime::now_utc(), &mut rng)
        .await?;

    tracing::info!("Seed completed!");
    tracing::info!("  Locations: {}", report.locations);
    tracing::info!("  Stations: {}", report.stations);
    tracing::info!("  Readings created: {}", report.created_readings);
    tracing::info!("  Total readings: {}", report.final_count);
    if let Some(reason) = report.skipped {
        tracing::info!("  Skipped: {reason:?}");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;

    if args.dry_run {
        tracing::info!("Dry run: using in-memory store");
        let store = InMemoryStore::new();
        let geocoder = catalog_geocoder(&CITY_CATALOG);
        return run(&store, &geocoder, &settings, &args).await;
    }

    tracing::info!("Connecting to {}", settings.masked_database_url());
    let db = database::connect(&settings.database_url, settings.db_pool_max).await?;
    tracing::info!("Connected to database");

    let mut geocoder = NominatimGeocoder::new().with_endpoint(settings.geocoder_url.clone());
    if let Some(dir) = &settings.geocoder_cache_dir {
        geocoder = geocoder.with_cache_dir(dir);
    }

    run(&db, &geocoder, &settings, &args).await
}
