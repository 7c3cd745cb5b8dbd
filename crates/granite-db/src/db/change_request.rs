use chrono::NaiveDate;
use granite_core::change::ChangeRequestDraft;
use granite_core::models::{AllocationChangeRequest, AttributeChangeRequest};
use granite_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::transaction::TransactionGuard;

const REQUEST_COLUMNS: &str = "id, allocation_id, status, end_date_extension, justification, \
     notes, created_at, updated_at";
const CHANGE_COLUMNS: &str =
    "id, change_request_id, allocation_attribute_id, old_value, new_value, created_at";

/// Repository for change requests and their per-attribute captures.
#[derive(Clone)]
pub struct ChangeRequestRepository {
    pool: PgPool,
}

impl ChangeRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_change_requests", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<AllocationChangeRequest>, AppError> {
        let request = sqlx::query_as::<Postgres, AllocationChangeRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM allocation_change_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_change_requests", db.operation = "select"))]
    pub async fn list_for_allocation(
        &self,
        allocation_id: Uuid,
    ) -> Result<Vec<AllocationChangeRequest>, AppError> {
        let requests = sqlx::query_as::<Postgres, AllocationChangeRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM allocation_change_requests \
             WHERE allocation_id = $1 ORDER BY created_at DESC"
        ))
        .bind(allocation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    /// The review queue: every pending request, oldest first.
    #[tracing::instrument(skip(self), fields(db.table = "allocation_change_requests", db.operation = "select"))]
    pub async fn list_pending(&self) -> Result<Vec<AllocationChangeRequest>, AppError> {
        let requests = sqlx::query_as::<Postgres, AllocationChangeRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM allocation_change_requests \
             WHERE status = 'pending' ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_change_requests", db.operation = "select"))]
    pub async fn has_pending(&self, allocation_id: Uuid) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM allocation_change_requests \
             WHERE allocation_id = $1 AND status = 'pending')",
        )
        .bind(allocation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(db.table = "attribute_change_requests", db.operation = "select"))]
    pub async fn list_changes(
        &self,
        change_request_id: Uuid,
    ) -> Result<Vec<AttributeChangeRequest>, AppError> {
        let changes = sqlx::query_as::<Postgres, AttributeChangeRequest>(&format!(
            "SELECT {CHANGE_COLUMNS} FROM attribute_change_requests \
             WHERE change_request_id = $1 ORDER BY created_at"
        ))
        .bind(change_request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(changes)
    }

    /// Persist a validated draft: the request row plus one capture row per
    /// attribute change, atomically.
    #[tracing::instrument(skip(self, draft), fields(db.table = "allocation_change_requests", db.operation = "insert"))]
    pub async fn create_from_draft(
        &self,
        draft: &ChangeRequestDraft,
    ) -> Result<AllocationChangeRequest, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let request = sqlx::query_as::<Postgres, AllocationChangeRequest>(&format!(
            r#"
            INSERT INTO allocation_change_requests (allocation_id, status, end_date_extension, justification)
            VALUES ($1, 'pending', $2, $3)
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(draft.allocation_id)
        .bind(draft.end_date_extension)
        .bind(&draft.justification)
        .fetch_one(&mut **tx)
        .await?;

        for (attribute_id, old_value, new_value) in &draft.attribute_changes {
            sqlx::query(
                "INSERT INTO attribute_change_requests \
                 (change_request_id, allocation_attribute_id, old_value, new_value) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(request.id)
            .bind(attribute_id)
            .bind(old_value)
            .bind(new_value)
            .execute(&mut **tx)
            .await?;
        }

        tx.commit().await?;
        Ok(request)
    }

    /// Persist a resolution atomically: the request row, reviewer edits to
    /// the capture rows, the approved attribute values, and the new end
    /// date when the extension was granted.
    #[tracing::instrument(skip_all, fields(db.table = "allocation_change_requests", db.operation = "update", db.record_id = %request.id))]
    pub async fn save_resolution(
        &self,
        request: &AllocationChangeRequest,
        attribute_changes: &[AttributeChangeRequest],
        apply_values: &[(Uuid, String)],
        new_end_date: Option<NaiveDate>,
    ) -> Result<(), AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        sqlx::query(
            "UPDATE allocation_change_requests \
             SET status = $2, end_date_extension = $3, notes = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(request.id)
        .bind(request.status)
        .bind(request.end_date_extension)
        .bind(&request.notes)
        .execute(&mut **tx)
        .await?;

        for change in attribute_changes {
            sqlx::query("UPDATE attribute_change_requests SET new_value = $2 WHERE id = $1")
                .bind(change.id)
                .bind(&change.new_value)
                .execute(&mut **tx)
                .await?;
        }

        for (attribute_id, value) in apply_values {
            sqlx::query(
                "UPDATE allocation_attributes SET value = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(attribute_id)
            .bind(value)
            .execute(&mut **tx)
            .await?;
        }

        if let Some(end_date) = new_end_date {
            sqlx::query("UPDATE allocations SET end_date = $2, updated_at = NOW() WHERE id = $1")
                .bind(request.allocation_id)
                .bind(end_date)
                .execute(&mut **tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete one proposed attribute change from a pending request.
    #[tracing::instrument(skip(self), fields(db.table = "attribute_change_requests", db.operation = "delete", db.record_id = %change_id))]
    pub async fn delete_change(&self, change_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM attribute_change_requests acr \
             USING allocation_change_requests cr \
             WHERE acr.id = $1 AND cr.id = acr.change_request_id AND cr.status = 'pending'",
        )
        .bind(change_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
