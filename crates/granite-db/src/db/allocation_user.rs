use granite_core::membership::MemberWrite;
use granite_core::models::{AllocationUser, AllocationUserStatus};
use granite_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::transaction::TransactionGuard;

const MEMBER_COLUMNS: &str =
    "id, allocation_id, user_id, username, status, role, created_at, updated_at";

/// Repository for allocation membership rows.
#[derive(Clone)]
pub struct AllocationUserRepository {
    pool: PgPool,
}

impl AllocationUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_users", db.operation = "select"))]
    pub async fn list_for_allocation(
        &self,
        allocation_id: Uuid,
    ) -> Result<Vec<AllocationUser>, AppError> {
        let members = sqlx::query_as::<Postgres, AllocationUser>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM allocation_users WHERE allocation_id = $1 ORDER BY username"
        ))
        .bind(allocation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_users", db.operation = "select"))]
    pub async fn get(
        &self,
        allocation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AllocationUser>, AppError> {
        let member = sqlx::query_as::<Postgres, AllocationUser>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM allocation_users WHERE allocation_id = $1 AND user_id = $2"
        ))
        .bind(allocation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    /// Apply a batch of membership writes atomically: resurrections update
    /// the existing row, fresh additions insert one.
    #[tracing::instrument(skip(self, writes), fields(db.table = "allocation_users", db.operation = "upsert", batch_size = writes.len()))]
    pub async fn apply_batch(
        &self,
        allocation_id: Uuid,
        writes: &[MemberWrite],
    ) -> Result<Vec<AllocationUser>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let mut members = Vec::with_capacity(writes.len());
        for write in writes {
            let member = match write.existing_id {
                Some(id) => {
                    sqlx::query_as::<Postgres, AllocationUser>(&format!(
                        r#"
                        UPDATE allocation_users
                        SET status = $2, role = $3, updated_at = NOW()
                        WHERE id = $1
                        RETURNING {MEMBER_COLUMNS}
                        "#
                    ))
                    .bind(id)
                    .bind(write.status)
                    .bind(&write.role)
                    .fetch_one(&mut **tx)
                    .await?
                }
                None => {
                    sqlx::query_as::<Postgres, AllocationUser>(&format!(
                        r#"
                        INSERT INTO allocation_users (allocation_id, user_id, username, status, role)
                        VALUES ($1, $2, $3, $4, $5)
                        RETURNING {MEMBER_COLUMNS}
                        "#
                    ))
                    .bind(allocation_id)
                    .bind(write.user_id)
                    .bind(&write.username)
                    .bind(write.status)
                    .bind(&write.role)
                    .fetch_one(&mut **tx)
                    .await?
                }
            };
            members.push(member);
        }
        tx.commit().await?;
        Ok(members)
    }

    #[tracing::instrument(skip(self, member_ids), fields(db.table = "allocation_users", db.operation = "update", batch_size = member_ids.len()))]
    pub async fn set_status_many(
        &self,
        member_ids: &[Uuid],
        status: AllocationUserStatus,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE allocation_users SET status = $2, updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(member_ids)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_users", db.operation = "update", db.record_id = %member_id))]
    pub async fn set_status(
        &self,
        member_id: Uuid,
        status: AllocationUserStatus,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE allocation_users SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(member_id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_users", db.operation = "update", db.record_id = %member_id))]
    pub async fn set_role(&self, member_id: Uuid, role: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE allocation_users SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(member_id)
            .bind(role)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Flip a user's membership to Removed on every allocation of the
    /// project in the given status set. Returns the touched allocation ids.
    #[tracing::instrument(skip(self, statuses), fields(db.table = "allocation_users", db.operation = "update"))]
    pub async fn remove_across_project(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        statuses: &[granite_core::models::AllocationStatus],
    ) -> Result<Vec<Uuid>, AppError> {
        let allocation_ids = sqlx::query_scalar::<Postgres, Uuid>(
            r#"
            UPDATE allocation_users au
            SET status = 'removed', updated_at = NOW()
            FROM allocations a
            WHERE au.allocation_id = a.id
              AND a.project_id = $1
              AND au.user_id = $2
              AND a.status = ANY($3)
              AND au.status <> 'removed'
            RETURNING au.allocation_id
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(statuses)
        .fetch_all(&self.pool)
        .await?;
        Ok(allocation_ids)
    }
}
