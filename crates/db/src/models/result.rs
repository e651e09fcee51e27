//! Annotation-result model and DTOs.

use mteval_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full result row from the `results` table. Rows are append-only.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnnotationResult {
    pub id: DbId,
    pub campaign_id: DbId,
    pub user_id: DbId,
    pub batch_no: i32,
    pub item_id: i32,
    pub score: Option<i32>,
    pub preference: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub mqm: Option<serde_json::Value>,
    pub source_errors: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

/// DTO for submitting one annotation result.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateResult {
    pub batch_no: i32,
    pub item_id: i32,
    pub score: Option<i32>,
    pub preference: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub mqm: Option<serde_json::Value>,
    pub source_errors: Option<serde_json::Value>,
}
