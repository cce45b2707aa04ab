//! Core types and traits for rentbook storage backends.
//!
//! This crate provides the `StorageBackend` trait, the rental entity model
//! and id generation, so storage implementations can live in separate crates.

pub mod id;
pub mod models;
pub mod storage;

// Re-export key types at crate root for convenience
pub use id::new_id;
pub use models::{Booking, Expense, LineItem, MeterReading, Payment, Property, Record, Unit};
pub use storage::{
    Collection, Document, Filter, Page, StorageBackend, StorageError, TransactionId,
    INTERNAL_ID_FIELD,
};
