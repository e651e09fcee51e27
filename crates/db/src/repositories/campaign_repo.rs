//! Repository for the `campaigns` table.

use mteval_core::types::DbId;
use sqlx::PgPool;

use crate::models::campaign::{Campaign, CreateCampaign};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, source_language, target_language, \
                       required_annotations, created_at, updated_at";

/// Provides CRUD operations for campaigns.
pub struct CampaignRepo;

impl CampaignRepo {
    /// Insert a new campaign, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateCampaign) -> Result<Campaign, sqlx::Error> {
        let query = format!(
            "INSERT INTO campaigns (name, source_language, target_language, required_annotations)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(&input.name)
            .bind(&input.source_language)
            .bind(&input.target_language)
            .bind(input.required_annotations)
            .fetch_one(pool)
            .await
    }

    /// Find a campaign by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM campaigns WHERE id = $1");
        sqlx::query_as::<_, Campaign>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all campaigns ordered by most recently created first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Campaign>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM campaigns ORDER BY created_at DESC");
        sqlx::query_as::<_, Campaign>(&query).fetch_all(pool).await
    }
}
