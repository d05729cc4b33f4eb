//! Mock-data generators.
//!
//! - [`locations`]: measurement kinds and geocoded catalog locations
//! - [`stations`]: random station assignment per user
//! - [`readings`]: the [`MockDataGenerator`] that drives a full run

pub mod locations;
pub mod readings;
pub mod stations;

pub use locations::{catalog_locations, ensure_measurements};
pub use readings::{
    DEFAULT_QUANTITY, GenerationReport, MockDataGenerator, SkipReason, one_month_before,
};
pub use stations::assign_stations;
