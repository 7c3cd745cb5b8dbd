//! Allocation note management.

use uuid::Uuid;

use granite_core::models::AllocationNote;
use granite_core::AppError;
use granite_db::{AdminActionRepository, NoteRepository};

pub struct NoteService {
    notes: NoteRepository,
    audit: AdminActionRepository,
}

impl NoteService {
    pub fn new(notes: NoteRepository, audit: AdminActionRepository) -> Self {
        Self { notes, audit }
    }

    pub async fn create(
        &self,
        author: &str,
        allocation_id: Uuid,
        note: &str,
        is_private: bool,
    ) -> Result<AllocationNote, AppError> {
        if note.trim().is_empty() {
            return Err(AppError::validation("Note must not be empty."));
        }
        self.notes.create(allocation_id, author, note, is_private).await
    }

    /// Private notes are only returned to reviewers.
    pub async fn list(
        &self,
        allocation_id: Uuid,
        include_private: bool,
    ) -> Result<Vec<AllocationNote>, AppError> {
        self.notes.list_for_allocation(allocation_id, include_private).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        note: &str,
        is_private: bool,
    ) -> Result<AllocationNote, AppError> {
        if note.trim().is_empty() {
            return Err(AppError::validation("Note must not be empty."));
        }
        self.notes
            .update(id, note, is_private)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Note {id} not found")))
    }

    pub async fn delete(&self, actor: &str, id: Uuid) -> Result<(), AppError> {
        let note = self
            .notes
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Note {id} not found")))?;
        if !self.notes.delete(id).await? {
            return Err(AppError::not_found(format!("Note {id} not found")));
        }
        self.audit
            .record(
                note.allocation_id,
                actor,
                &format!("Deleted note by \"{}\"", note.author),
            )
            .await?;
        Ok(())
    }
}
