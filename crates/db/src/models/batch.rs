//! Stored-batch model and DTOs.

use mteval_core::batch::Item;
use mteval_core::error::CoreError;
use mteval_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full batch row from the `batches` table. The item array is stored as
/// JSONB in the batch wire format and is immutable after upload.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredBatch {
    pub id: DbId,
    pub campaign_id: DbId,
    pub batch_no: i32,
    pub batch_size: i32,
    pub random_seed: i64,
    pub items: serde_json::Value,
    pub created_at: Timestamp,
}

impl StoredBatch {
    /// Deserialize the stored item array.
    pub fn items(&self) -> Result<Vec<Item>, CoreError> {
        serde_json::from_value(self.items.clone())
            .map_err(|e| CoreError::Internal(format!("stored batch {} is corrupt: {e}", self.id)))
    }
}

/// DTO for storing a composed batch.
#[derive(Debug, Deserialize)]
pub struct CreateBatch {
    pub batch_no: i32,
    pub batch_size: i32,
    pub random_seed: i64,
    pub items: serde_json::Value,
}
