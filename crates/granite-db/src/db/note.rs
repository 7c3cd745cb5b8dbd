use granite_core::models::AllocationNote;
use granite_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const NOTE_COLUMNS: &str = "id, allocation_id, author, note, is_private, created_at, updated_at";

/// Repository for allocation notes.
#[derive(Clone)]
pub struct NoteRepository {
    pool: PgPool,
}

impl NoteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, note), fields(db.table = "allocation_notes", db.operation = "insert"))]
    pub async fn create(
        &self,
        allocation_id: Uuid,
        author: &str,
        note: &str,
        is_private: bool,
    ) -> Result<AllocationNote, AppError> {
        let row = sqlx::query_as::<Postgres, AllocationNote>(&format!(
            r#"
            INSERT INTO allocation_notes (allocation_id, author, note, is_private)
            VALUES ($1, $2, $3, $4)
            RETURNING {NOTE_COLUMNS}
            "#
        ))
        .bind(allocation_id)
        .bind(author)
        .bind(note)
        .bind(is_private)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_notes", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<AllocationNote>, AppError> {
        let note = sqlx::query_as::<Postgres, AllocationNote>(&format!(
            "SELECT {NOTE_COLUMNS} FROM allocation_notes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(note)
    }

    /// Notes on an allocation; private notes only when `include_private`.
    #[tracing::instrument(skip(self), fields(db.table = "allocation_notes", db.operation = "select"))]
    pub async fn list_for_allocation(
        &self,
        allocation_id: Uuid,
        include_private: bool,
    ) -> Result<Vec<AllocationNote>, AppError> {
        let notes = sqlx::query_as::<Postgres, AllocationNote>(&format!(
            "SELECT {NOTE_COLUMNS} FROM allocation_notes \
             WHERE allocation_id = $1 AND ($2 OR NOT is_private) ORDER BY created_at DESC"
        ))
        .bind(allocation_id)
        .bind(include_private)
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }

    #[tracing::instrument(skip(self, note), fields(db.table = "allocation_notes", db.operation = "update", db.record_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        note: &str,
        is_private: bool,
    ) -> Result<Option<AllocationNote>, AppError> {
        let row = sqlx::query_as::<Postgres, AllocationNote>(&format!(
            r#"
            UPDATE allocation_notes
            SET note = $2, is_private = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {NOTE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(note)
        .bind(is_private)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_notes", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM allocation_notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
