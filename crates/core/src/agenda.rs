//! Task agendas and batch assignment.
//!
//! A task agenda is one annotator's ordered to-do list of work handles.
//! Handles are abstract (type name + primary id) so the agenda does not
//! depend on how batches are stored. Assignment spreads batches over
//! annotators so that every batch reaches the requested replication and
//! per-annotator load stays balanced.

use std::fmt;

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Object handles
// ---------------------------------------------------------------------------

/// An abstract handle to an annotatable object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub type_name: String,
    pub primary_id: String,
}

impl ObjectId {
    pub fn new(type_name: impl Into<String>, primary_id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            primary_id: primary_id.into(),
        }
    }

    /// Handle for a batch, keyed by its batch number.
    pub fn batch(batch_no: i32) -> Self {
        Self::new("Batch", batch_no.to_string())
    }

    /// Parse a `type:id` string produced by [`fmt::Display`].
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.split_once(':') {
            Some((type_name, primary_id)) if !type_name.is_empty() && !primary_id.is_empty() => {
                Ok(Self::new(type_name, primary_id))
            }
            _ => Err(CoreError::Validation(format!(
                "invalid object handle '{s}', expected 'type:id'"
            ))),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.primary_id)
    }
}

// ---------------------------------------------------------------------------
// Agendas
// ---------------------------------------------------------------------------

/// One annotator's ordered work list.
///
/// Open tasks keep insertion order; a task is in `open` or `completed`,
/// never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAgenda {
    pub user_id: DbId,
    open: Vec<ObjectId>,
    completed: Vec<ObjectId>,
}

impl TaskAgenda {
    pub fn new(user_id: DbId) -> Self {
        Self {
            user_id,
            open: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// Rebuild an agenda from stored open and completed handle lists.
    pub fn from_parts(
        user_id: DbId,
        open: Vec<ObjectId>,
        completed: Vec<ObjectId>,
    ) -> Result<Self, CoreError> {
        for task in &open {
            if completed.contains(task) {
                return Err(CoreError::Validation(format!(
                    "task '{task}' is both open and completed for user {user_id}"
                )));
            }
        }
        Ok(Self {
            user_id,
            open,
            completed,
        })
    }

    pub fn open(&self) -> &[ObjectId] {
        &self.open
    }

    pub fn completed(&self) -> &[ObjectId] {
        &self.completed
    }

    /// Whether the agenda holds the task, open or completed.
    pub fn contains(&self, task: &ObjectId) -> bool {
        self.open.contains(task) || self.completed.contains(task)
    }

    pub fn is_completed(&self, task: &ObjectId) -> bool {
        self.completed.contains(task)
    }

    /// Open plus completed task count.
    pub fn len(&self) -> usize {
        self.open.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.completed.is_empty()
    }

    /// The oldest open task, if any.
    pub fn next_open(&self) -> Option<&ObjectId> {
        self.open.first()
    }

    /// Append a task to the open list. Adding a task the agenda already
    /// holds is a no-op.
    pub fn add_open(&mut self, task: ObjectId) {
        if !self.contains(&task) {
            self.open.push(task);
        }
    }

    /// Move a task from open to completed.
    pub fn complete_open_task(&mut self, task: &ObjectId) -> Result<(), CoreError> {
        if let Some(pos) = self.open.iter().position(|t| t == task) {
            let done = self.open.remove(pos);
            self.completed.push(done);
            return Ok(());
        }
        if self.completed.contains(task) {
            return Err(CoreError::AlreadyCompleted {
                user: self.user_id,
                task: task.to_string(),
            });
        }
        Err(CoreError::NotAssigned {
            user: self.user_id,
            task: task.to_string(),
        })
    }

    /// Move a completed task back to the end of the open list.
    pub fn activate_completed_task(&mut self, task: &ObjectId) -> Result<(), CoreError> {
        if let Some(pos) = self.completed.iter().position(|t| t == task) {
            let reopened = self.completed.remove(pos);
            self.open.push(reopened);
            return Ok(());
        }
        Err(CoreError::NotAssigned {
            user: self.user_id,
            task: task.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// Assign every batch to exactly `replication` distinct annotators.
///
/// Each slot goes to the least-loaded annotator not already holding the
/// batch, ties broken by ascending user id, so total load is balanced to
/// within one batch. Fails when `replication` exceeds the annotator count
/// or is not positive.
pub fn assign(
    user_ids: &[DbId],
    batches: &[ObjectId],
    replication: usize,
) -> Result<Vec<TaskAgenda>, CoreError> {
    if replication == 0 {
        return Err(CoreError::Validation(
            "replication must be at least 1".to_string(),
        ));
    }
    if replication > user_ids.len() {
        return Err(CoreError::Validation(format!(
            "replication {replication} exceeds the {} available annotators",
            user_ids.len()
        )));
    }

    let mut sorted_users = user_ids.to_vec();
    sorted_users.sort_unstable();
    sorted_users.dedup();

    let mut agendas: Vec<TaskAgenda> =
        sorted_users.iter().map(|&id| TaskAgenda::new(id)).collect();

    for batch in batches {
        for _ in 0..replication {
            let slot = agendas
                .iter()
                .enumerate()
                .filter(|(_, a)| !a.contains(batch))
                .min_by_key(|(_, a)| (a.len(), a.user_id))
                .map(|(i, _)| i)
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "cannot place batch '{batch}': all annotators already hold it"
                    ))
                })?;
            agendas[slot].add_open(batch.clone());
        }
    }
    Ok(agendas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn batch_handles(n: i32) -> Vec<ObjectId> {
        (1..=n).map(ObjectId::batch).collect()
    }

    // -- ObjectId -----------------------------------------------------------

    #[test]
    fn handle_round_trips_through_display() {
        let id = ObjectId::batch(7);
        assert_eq!(id.to_string(), "Batch:7");
        assert_eq!(ObjectId::parse("Batch:7").unwrap(), id);
    }

    #[test]
    fn malformed_handle_rejected() {
        assert!(ObjectId::parse("Batch").is_err());
        assert!(ObjectId::parse(":7").is_err());
        assert!(ObjectId::parse("Batch:").is_err());
    }

    // -- TaskAgenda ---------------------------------------------------------

    #[test]
    fn open_tasks_keep_insertion_order() {
        let mut agenda = TaskAgenda::new(1);
        agenda.add_open(ObjectId::batch(3));
        agenda.add_open(ObjectId::batch(1));
        agenda.add_open(ObjectId::batch(2));
        assert_eq!(agenda.next_open(), Some(&ObjectId::batch(3)));
    }

    #[test]
    fn add_open_ignores_duplicates() {
        let mut agenda = TaskAgenda::new(1);
        agenda.add_open(ObjectId::batch(1));
        agenda.add_open(ObjectId::batch(1));
        assert_eq!(agenda.open().len(), 1);
    }

    #[test]
    fn completing_moves_task_and_advances() {
        let mut agenda = TaskAgenda::new(1);
        agenda.add_open(ObjectId::batch(1));
        agenda.add_open(ObjectId::batch(2));

        agenda.complete_open_task(&ObjectId::batch(1)).unwrap();
        assert!(agenda.is_completed(&ObjectId::batch(1)));
        assert_eq!(agenda.next_open(), Some(&ObjectId::batch(2)));
    }

    #[test]
    fn completing_unassigned_task_fails() {
        let mut agenda = TaskAgenda::new(9);
        assert_matches!(
            agenda.complete_open_task(&ObjectId::batch(1)),
            Err(CoreError::NotAssigned { user: 9, .. })
        );
    }

    #[test]
    fn completing_twice_fails() {
        let mut agenda = TaskAgenda::new(1);
        agenda.add_open(ObjectId::batch(1));
        agenda.complete_open_task(&ObjectId::batch(1)).unwrap();
        assert_matches!(
            agenda.complete_open_task(&ObjectId::batch(1)),
            Err(CoreError::AlreadyCompleted { user: 1, .. })
        );
    }

    #[test]
    fn reactivating_reopens_at_the_end() {
        let mut agenda = TaskAgenda::new(1);
        agenda.add_open(ObjectId::batch(1));
        agenda.add_open(ObjectId::batch(2));
        agenda.complete_open_task(&ObjectId::batch(1)).unwrap();

        agenda.activate_completed_task(&ObjectId::batch(1)).unwrap();
        assert!(!agenda.is_completed(&ObjectId::batch(1)));
        assert_eq!(agenda.open().last(), Some(&ObjectId::batch(1)));
    }

    #[test]
    fn reactivating_open_task_fails() {
        let mut agenda = TaskAgenda::new(1);
        agenda.add_open(ObjectId::batch(1));
        assert_matches!(
            agenda.activate_completed_task(&ObjectId::batch(1)),
            Err(CoreError::NotAssigned { .. })
        );
    }

    #[test]
    fn from_parts_rejects_overlap() {
        assert_matches!(
            TaskAgenda::from_parts(
                1,
                vec![ObjectId::batch(1)],
                vec![ObjectId::batch(1)],
            ),
            Err(CoreError::Validation(_))
        );
    }

    // -- assign -------------------------------------------------------------

    #[test]
    fn six_batches_three_users_replication_two() {
        let agendas = assign(&[10, 20, 30], &batch_handles(6), 2).unwrap();

        // Each user holds 4 batches, each batch 2 distinct holders.
        for agenda in &agendas {
            assert_eq!(agenda.len(), 4);
        }
        for batch in batch_handles(6) {
            let holders = agendas.iter().filter(|a| a.contains(&batch)).count();
            assert_eq!(holders, 2, "batch {batch} has {holders} holders");
        }
    }

    #[test]
    fn load_balanced_within_one() {
        let agendas = assign(&[1, 2, 3, 4], &batch_handles(7), 2).unwrap();
        let loads: Vec<usize> = agendas.iter().map(TaskAgenda::len).collect();
        let min = *loads.iter().min().unwrap();
        let max = *loads.iter().max().unwrap();
        assert!(max - min <= 1, "loads {loads:?} differ by more than one");
        assert_eq!(loads.iter().sum::<usize>(), 14);
    }

    #[test]
    fn no_user_holds_a_batch_twice() {
        let agendas = assign(&[1, 2, 3], &batch_handles(5), 3).unwrap();
        for agenda in &agendas {
            let mut held = agenda.open().to_vec();
            held.sort_by(|a, b| a.primary_id.cmp(&b.primary_id));
            held.dedup();
            assert_eq!(held.len(), agenda.len());
        }
    }

    #[test]
    fn replication_above_user_count_rejected() {
        assert_matches!(
            assign(&[1, 2], &batch_handles(3), 3),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn zero_replication_rejected() {
        assert_matches!(
            assign(&[1, 2], &batch_handles(3), 0),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn ties_break_by_ascending_user_id() {
        let agendas = assign(&[30, 10, 20], &batch_handles(1), 1).unwrap();
        let holder = agendas.iter().find(|a| a.len() == 1).unwrap();
        assert_eq!(holder.user_id, 10);
    }

    #[test]
    fn assignment_is_deterministic() {
        let a = assign(&[1, 2, 3], &batch_handles(6), 2).unwrap();
        let b = assign(&[1, 2, 3], &batch_handles(6), 2).unwrap();
        assert_eq!(a, b);
    }
}
