//! Seeding tools for the IoT monitoring backend.
//!
//! Three jobs share this crate:
//! - registering accounts from a `login:password` credentials file
//! - importing historical measurements from CSV
//! - generating mock stations and readings for load testing
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use seed_data::prelude::*;
//!
//! let store = InMemoryStore::new();
//! register_users(&store, ["alice:pw1", "bob:pw2"]).await;
//!
//! let geocoder = catalog_geocoder(&CITY_CATALOG);
//! let report = MockDataGenerator::new(&store, &geocoder)
//!     .generate(1000, OffsetDateTime::now_utc(), &mut rand::thread_rng())
//!     .await?;
//! ```

pub mod config;
pub mod credentials;
pub mod csv_import;
pub mod errors;
pub mod generators;

#[cfg(test)]
mod testing;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{CITY_CATALOG, GeneratorConfig, Settings, catalog_geocoder};
    pub use crate::credentials::{RegistrationTally, register_users, register_users_from_file};
    pub use crate::csv_import::{CsvImportReport, import_csv, import_csv_file};
    pub use crate::errors::{ImportError, SeedError};
    pub use crate::generators::{GenerationReport, MockDataGenerator, SkipReason};
    pub use monitoring::memory::InMemoryStore;
    pub use monitoring::{IdentityStore, RecordStore};
    pub use time::OffsetDateTime;
}
