use granite_core::models::{Allocation, AllocationStatus};
use granite_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::transaction::TransactionGuard;

const ALLOCATION_COLUMNS: &str = "id, project_id, resource_id, status, quantity, justification, \
     description, start_date, end_date, is_locked, is_changeable, created_at, updated_at";

/// Repository for allocations and their linked resources.
#[derive(Clone)]
pub struct AllocationRepository {
    pool: PgPool,
}

impl AllocationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocations", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Allocation>, AppError> {
        let allocation = sqlx::query_as::<Postgres, Allocation>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(allocation)
    }

    #[tracing::instrument(skip(self, draft), fields(db.table = "allocations", db.operation = "insert"))]
    pub async fn create(
        &self,
        draft: &granite_core::creation::AllocationDraft,
    ) -> Result<Allocation, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let allocation = sqlx::query_as::<Postgres, Allocation>(&format!(
            r#"
            INSERT INTO allocations (project_id, resource_id, status, quantity, justification, is_changeable)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ALLOCATION_COLUMNS}
            "#
        ))
        .bind(draft.project_id)
        .bind(draft.resource_id)
        .bind(draft.status)
        .bind(draft.quantity)
        .bind(&draft.justification)
        .bind(draft.is_changeable)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO allocation_resources (allocation_id, resource_id, is_parent) VALUES ($1, $2, TRUE)",
        )
        .bind(allocation.id)
        .bind(draft.resource_id)
        .execute(&mut **tx)
        .await?;

        tx.commit().await?;
        Ok(allocation)
    }

    /// Attach an additional (linked) resource.
    #[tracing::instrument(skip(self), fields(db.table = "allocation_resources", db.operation = "insert"))]
    pub async fn link_resource(&self, allocation_id: Uuid, resource_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO allocation_resources (allocation_id, resource_id, is_parent) \
             VALUES ($1, $2, FALSE) ON CONFLICT DO NOTHING",
        )
        .bind(allocation_id)
        .bind(resource_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist a transition plan's allocation state: status, dates, flags,
    /// and description in one statement.
    #[tracing::instrument(skip(self, allocation), fields(db.table = "allocations", db.operation = "update", db.record_id = %allocation.id))]
    pub async fn save(&self, allocation: &Allocation) -> Result<Allocation, AppError> {
        let saved = sqlx::query_as::<Postgres, Allocation>(&format!(
            r#"
            UPDATE allocations
            SET status = $2, quantity = $3, justification = $4, description = $5,
                start_date = $6, end_date = $7, is_locked = $8, is_changeable = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ALLOCATION_COLUMNS}
            "#
        ))
        .bind(allocation.id)
        .bind(allocation.status)
        .bind(allocation.quantity)
        .bind(&allocation.justification)
        .bind(&allocation.description)
        .bind(allocation.start_date)
        .bind(allocation.end_date)
        .bind(allocation.is_locked)
        .bind(allocation.is_changeable)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocations", db.operation = "update", db.record_id = %id))]
    pub async fn set_status(&self, id: Uuid, status: AllocationStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE allocations SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocations", db.operation = "select"))]
    pub async fn list_for_project(&self, project_id: Uuid) -> Result<Vec<Allocation>, AppError> {
        let allocations = sqlx::query_as::<Postgres, Allocation>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations WHERE project_id = $1 ORDER BY created_at"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(allocations)
    }

    /// Allocations of a project in the active-ish status set, optionally
    /// narrowed to one resource. Used for allocation limits and the
    /// project-wide removal sweep during renewals.
    #[tracing::instrument(skip(self), fields(db.table = "allocations", db.operation = "select"))]
    pub async fn list_active_for_project(
        &self,
        project_id: Uuid,
        resource_id: Option<Uuid>,
    ) -> Result<Vec<Allocation>, AppError> {
        let allocations = sqlx::query_as::<Postgres, Allocation>(&format!(
            r#"
            SELECT {ALLOCATION_COLUMNS} FROM allocations
            WHERE project_id = $1
              AND ($2::uuid IS NULL OR resource_id = $2)
              AND status = ANY($3)
            ORDER BY created_at
            "#
        ))
        .bind(project_id)
        .bind(resource_id)
        .bind(AllocationStatus::active_set())
        .fetch_all(&self.pool)
        .await?;
        Ok(allocations)
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocations", db.operation = "select"))]
    pub async fn count_active_for_project_resource(
        &self,
        project_id: Uuid,
        resource_id: Uuid,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM allocations WHERE project_id = $1 AND resource_id = $2 AND status = ANY($3)",
        )
        .bind(project_id)
        .bind(resource_id)
        .bind(AllocationStatus::active_set())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
