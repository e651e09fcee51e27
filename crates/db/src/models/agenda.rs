//! Agenda models.

use mteval_core::agenda::{ObjectId, TaskAgenda};
use mteval_core::error::CoreError;
use mteval_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Agenda header row from the `task_agendas` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AgendaRow {
    pub id: DbId,
    pub campaign_id: DbId,
    pub user_id: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One entry row from the `agenda_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AgendaItemRow {
    pub id: DbId,
    pub agenda_id: DbId,
    pub type_name: String,
    pub primary_id: String,
    pub position: i32,
    pub completed_at: Option<Timestamp>,
}

impl AgendaItemRow {
    pub fn handle(&self) -> ObjectId {
        ObjectId::new(self.type_name.clone(), self.primary_id.clone())
    }
}

/// Rebuild a domain agenda from its stored rows, in position order.
pub fn agenda_from_rows(user_id: DbId, rows: &[AgendaItemRow]) -> Result<TaskAgenda, CoreError> {
    let mut open = Vec::new();
    let mut completed = Vec::new();
    for row in rows {
        if row.completed_at.is_some() {
            completed.push(row.handle());
        } else {
            open.push(row.handle());
        }
    }
    TaskAgenda::from_parts(user_id, open, completed)
}
