//! HTTP handlers, one module per resource.

pub mod agenda;
pub mod batch;
pub mod campaign;
pub mod dispatch;
pub mod user;
