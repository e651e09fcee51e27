//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod agenda_repo;
pub mod batch_repo;
pub mod campaign_repo;
pub mod result_repo;
pub mod user_repo;

pub use agenda_repo::AgendaRepo;
pub use batch_repo::BatchRepo;
pub use campaign_repo::CampaignRepo;
pub use result_repo::ResultRepo;
pub use user_repo::UserRepo;
