//! Core of the IoT monitoring backend: domain records, storage and geocoding.
//!
//! The seeding tools only talk to storage through the traits in
//! [`repository`]; [`database::Database`] backs them with PostgreSQL and
//! [`memory::InMemoryStore`] keeps everything in process.

pub mod auth;
pub mod database;
pub mod errors;
pub mod geocoding;
pub mod memory;
pub mod models;
pub mod repository;

pub use errors::AppError;
pub use repository::{IdentityStore, RecordStore};
