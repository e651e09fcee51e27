//! Domain logic for the MT human-evaluation platform.
//!
//! This crate is pure: no database access, no async, no network I/O. It
//! covers the offline batch-construction pipeline (corpus loading, document
//! packing, bad-reference synthesis, batch composition) and the in-memory
//! agenda model that the `db` and `api` crates persist and serve.

pub mod agenda;
pub mod badref;
pub mod batch;
pub mod composer;
pub mod corpus;
pub mod error;
pub mod mqm;
pub mod packer;
pub mod types;
