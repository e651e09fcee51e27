//! Repository for the `results` table.

use mteval_core::types::DbId;
use sqlx::PgPool;

use crate::models::result::{AnnotationResult, CreateResult};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, campaign_id, user_id, batch_no, item_id, score, preference, \
                       start_time, end_time, mqm, source_errors, created_at";

/// Provides append-only storage for annotation results.
pub struct ResultRepo;

impl ResultRepo {
    /// Insert one result, returning the created row.
    ///
    /// Duplicate (user, batch, item) submissions violate
    /// `uq_results_user_batch_item`; callers classify that into a domain
    /// error.
    pub async fn create(
        pool: &PgPool,
        campaign_id: DbId,
        user_id: DbId,
        input: &CreateResult,
    ) -> Result<AnnotationResult, sqlx::Error> {
        let query = format!(
            "INSERT INTO results
                (campaign_id, user_id, batch_no, item_id, score, preference,
                 start_time, end_time, mqm, source_errors)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnnotationResult>(&query)
            .bind(campaign_id)
            .bind(user_id)
            .bind(input.batch_no)
            .bind(input.item_id)
            .bind(input.score)
            .bind(&input.preference)
            .bind(input.start_time)
            .bind(input.end_time)
            .bind(&input.mqm)
            .bind(&input.source_errors)
            .fetch_one(pool)
            .await
    }

    /// Item ids the user has already answered within one batch, ascending.
    pub async fn answered_item_ids(
        pool: &PgPool,
        campaign_id: DbId,
        user_id: DbId,
        batch_no: i32,
    ) -> Result<Vec<i32>, sqlx::Error> {
        let rows: Vec<(i32,)> = sqlx::query_as(
            "SELECT item_id FROM results
             WHERE campaign_id = $1 AND user_id = $2 AND batch_no = $3
             ORDER BY item_id",
        )
        .bind(campaign_id)
        .bind(user_id)
        .bind(batch_no)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// List all results for one batch across users, in submission order.
    pub async fn list_for_batch(
        pool: &PgPool,
        campaign_id: DbId,
        batch_no: i32,
    ) -> Result<Vec<AnnotationResult>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM results
             WHERE campaign_id = $1 AND batch_no = $2
             ORDER BY created_at"
        );
        sqlx::query_as::<_, AnnotationResult>(&query)
            .bind(campaign_id)
            .bind(batch_no)
            .fetch_all(pool)
            .await
    }

    /// Count of results one user has submitted in a campaign.
    pub async fn count_for_user(
        pool: &PgPool,
        campaign_id: DbId,
        user_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM results WHERE campaign_id = $1 AND user_id = $2",
        )
        .bind(campaign_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}
