//! Repository for the `batches` table.

use mteval_core::types::DbId;
use sqlx::PgPool;

use crate::models::batch::{CreateBatch, StoredBatch};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, campaign_id, batch_no, batch_size, random_seed, items, created_at";

/// Provides storage for sealed batches.
pub struct BatchRepo;

impl BatchRepo {
    /// Insert one composed batch, returning the created row.
    pub async fn create(
        pool: &PgPool,
        campaign_id: DbId,
        input: &CreateBatch,
    ) -> Result<StoredBatch, sqlx::Error> {
        let query = format!(
            "INSERT INTO batches (campaign_id, batch_no, batch_size, random_seed, items)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StoredBatch>(&query)
            .bind(campaign_id)
            .bind(input.batch_no)
            .bind(input.batch_size)
            .bind(input.random_seed)
            .bind(&input.items)
            .fetch_one(pool)
            .await
    }

    /// Find a batch by campaign and batch number.
    pub async fn find(
        pool: &PgPool,
        campaign_id: DbId,
        batch_no: i32,
    ) -> Result<Option<StoredBatch>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM batches WHERE campaign_id = $1 AND batch_no = $2");
        sqlx::query_as::<_, StoredBatch>(&query)
            .bind(campaign_id)
            .bind(batch_no)
            .fetch_optional(pool)
            .await
    }

    /// List a campaign's batches in batch-number order.
    pub async fn list_for_campaign(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<StoredBatch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM batches WHERE campaign_id = $1 ORDER BY batch_no");
        sqlx::query_as::<_, StoredBatch>(&query)
            .bind(campaign_id)
            .fetch_all(pool)
            .await
    }

    /// Batch numbers of a campaign, ascending.
    pub async fn batch_numbers(pool: &PgPool, campaign_id: DbId) -> Result<Vec<i32>, sqlx::Error> {
        let rows: Vec<(i32,)> =
            sqlx::query_as("SELECT batch_no FROM batches WHERE campaign_id = $1 ORDER BY batch_no")
                .bind(campaign_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(n,)| n).collect())
    }

    /// Delete a batch unless an agenda still references it.
    ///
    /// Returns `true` if the row was deleted, `false` if it did not exist.
    /// Referenced batches produce a `RowNotFound`-free conflict at the call
    /// site via the returned reference count.
    pub async fn reference_count(
        pool: &PgPool,
        campaign_id: DbId,
        batch_no: i32,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*)
             FROM agenda_items ai
             JOIN task_agendas ta ON ta.id = ai.agenda_id
             WHERE ta.campaign_id = $1
               AND ai.type_name = 'Batch'
               AND ai.primary_id = $2::text",
        )
        .bind(campaign_id)
        .bind(batch_no.to_string())
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Delete a batch row. Callers must check [`Self::reference_count`]
    /// first; sealed batches held by an agenda must not disappear.
    pub async fn delete(
        pool: &PgPool,
        campaign_id: DbId,
        batch_no: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM batches WHERE campaign_id = $1 AND batch_no = $2")
            .bind(campaign_id)
            .bind(batch_no)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
