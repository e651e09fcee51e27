//! Database models.
//!
//! Each module holds the `FromRow` struct for one table plus the DTOs
//! used to create rows.

pub mod agenda;
pub mod batch;
pub mod campaign;
pub mod result;
pub mod user;
