//! Repository for the `task_agendas` and `agenda_items` tables.

use mteval_core::agenda::{ObjectId, TaskAgenda};
use mteval_core::types::DbId;
use sqlx::PgPool;

use crate::models::agenda::{AgendaItemRow, AgendaRow};

/// Column list for agenda headers.
const AGENDA_COLUMNS: &str = "id, campaign_id, user_id, created_at, updated_at";

/// Column list for agenda entries.
const ITEM_COLUMNS: &str = "id, agenda_id, type_name, primary_id, position, completed_at";

/// Provides storage for task agendas.
pub struct AgendaRepo;

impl AgendaRepo {
    /// Persist a freshly computed assignment for a campaign, replacing any
    /// previous agendas.
    ///
    /// The campaign row is locked for the duration so two concurrent
    /// assignment requests serialize instead of interleaving writes.
    pub async fn save_assignment(
        pool: &PgPool,
        campaign_id: DbId,
        agendas: &[TaskAgenda],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT id FROM campaigns WHERE id = $1 FOR UPDATE")
            .bind(campaign_id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM task_agendas WHERE campaign_id = $1")
            .bind(campaign_id)
            .execute(&mut *tx)
            .await?;

        for agenda in agendas {
            let (agenda_id,): (DbId,) = sqlx::query_as(
                "INSERT INTO task_agendas (campaign_id, user_id)
                 VALUES ($1, $2)
                 RETURNING id",
            )
            .bind(campaign_id)
            .bind(agenda.user_id)
            .fetch_one(&mut *tx)
            .await?;

            for (position, task) in agenda.open().iter().enumerate() {
                sqlx::query(
                    "INSERT INTO agenda_items (agenda_id, type_name, primary_id, position)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(agenda_id)
                .bind(&task.type_name)
                .bind(&task.primary_id)
                .bind(position as i32)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        tracing::debug!(campaign_id, agendas = agendas.len(), "assignment persisted");
        Ok(())
    }

    /// Find the agenda header for a campaign/user pair.
    pub async fn find(
        pool: &PgPool,
        campaign_id: DbId,
        user_id: DbId,
    ) -> Result<Option<AgendaRow>, sqlx::Error> {
        let query = format!(
            "SELECT {AGENDA_COLUMNS} FROM task_agendas WHERE campaign_id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, AgendaRow>(&query)
            .bind(campaign_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List all agenda headers for a campaign ordered by user id.
    pub async fn list_for_campaign(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<AgendaRow>, sqlx::Error> {
        let query = format!(
            "SELECT {AGENDA_COLUMNS} FROM task_agendas WHERE campaign_id = $1 ORDER BY user_id"
        );
        sqlx::query_as::<_, AgendaRow>(&query)
            .bind(campaign_id)
            .fetch_all(pool)
            .await
    }

    /// All entries of one agenda in position order.
    pub async fn items(pool: &PgPool, agenda_id: DbId) -> Result<Vec<AgendaItemRow>, sqlx::Error> {
        let query =
            format!("SELECT {ITEM_COLUMNS} FROM agenda_items WHERE agenda_id = $1 ORDER BY position");
        sqlx::query_as::<_, AgendaItemRow>(&query)
            .bind(agenda_id)
            .fetch_all(pool)
            .await
    }

    /// The oldest open entry of one agenda, if any.
    pub async fn next_open(
        pool: &PgPool,
        agenda_id: DbId,
    ) -> Result<Option<AgendaItemRow>, sqlx::Error> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM agenda_items
             WHERE agenda_id = $1 AND completed_at IS NULL
             ORDER BY position
             LIMIT 1"
        );
        sqlx::query_as::<_, AgendaItemRow>(&query)
            .bind(agenda_id)
            .fetch_optional(pool)
            .await
    }

    /// Mark one open entry completed. Returns `true` when a row changed;
    /// `false` means the entry was absent or already completed.
    pub async fn mark_completed(
        pool: &PgPool,
        agenda_id: DbId,
        task: &ObjectId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE agenda_items SET completed_at = NOW()
             WHERE agenda_id = $1 AND type_name = $2 AND primary_id = $3
               AND completed_at IS NULL",
        )
        .bind(agenda_id)
        .bind(&task.type_name)
        .bind(&task.primary_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether the agenda holds the entry in completed state.
    pub async fn is_completed(
        pool: &PgPool,
        agenda_id: DbId,
        task: &ObjectId,
    ) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(
                SELECT 1 FROM agenda_items
                WHERE agenda_id = $1 AND type_name = $2 AND primary_id = $3
                  AND completed_at IS NOT NULL
             )",
        )
        .bind(agenda_id)
        .bind(&task.type_name)
        .bind(&task.primary_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    /// Reopen one completed entry, moving it to the end of the open list.
    /// Returns `true` when a row changed.
    pub async fn activate_completed(
        pool: &PgPool,
        agenda_id: DbId,
        task: &ObjectId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE agenda_items SET
                completed_at = NULL,
                position = (SELECT COALESCE(MAX(position), -1) + 1
                            FROM agenda_items WHERE agenda_id = $1)
             WHERE agenda_id = $1 AND type_name = $2 AND primary_id = $3
               AND completed_at IS NOT NULL",
        )
        .bind(agenda_id)
        .bind(&task.type_name)
        .bind(&task.primary_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
