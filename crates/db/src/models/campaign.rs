//! Campaign model and DTOs.

use mteval_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full campaign row from the `campaigns` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Campaign {
    pub id: DbId,
    pub name: String,
    pub source_language: String,
    pub target_language: String,
    pub required_annotations: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new campaign.
#[derive(Debug, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    pub source_language: String,
    pub target_language: String,
    pub required_annotations: i32,
}
