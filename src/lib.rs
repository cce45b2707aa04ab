//! rentbook: a property-rental management backend.
//!
//! Properties own units; units own bookings and expenses. All records live in
//! a document store behind [`storage::StorageBackend`], with cascading deletes,
//! whole-dataset import/export and one-time sample seeding layered on top by
//! [`manager::RentalManager`].

pub mod api;
pub mod config;
pub mod exchange;
pub mod integrity;
pub mod manager;
pub mod seed;
pub mod storage;

pub use rentbook_core::models;
pub use rentbook_sqlite::SqliteStorage;
