use granite_core::models::AdminAction;
use granite_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Append-only audit log repository.
#[derive(Clone)]
pub struct AdminActionRepository {
    pool: PgPool,
}

impl AdminActionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, action), fields(db.table = "admin_actions", db.operation = "insert", actor = %actor))]
    pub async fn record(
        &self,
        allocation_id: Uuid,
        actor: &str,
        action: &str,
    ) -> Result<AdminAction, AppError> {
        let row = sqlx::query_as::<Postgres, AdminAction>(
            r#"
            INSERT INTO admin_actions (allocation_id, actor, action)
            VALUES ($1, $2, $3)
            RETURNING id, allocation_id, actor, action, created_at
            "#,
        )
        .bind(allocation_id)
        .bind(actor)
        .bind(action)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Record several audit lines from one operation.
    pub async fn record_all(
        &self,
        allocation_id: Uuid,
        actor: &str,
        actions: &[String],
    ) -> Result<(), AppError> {
        for action in actions {
            self.record(allocation_id, actor, action).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "admin_actions", db.operation = "select"))]
    pub async fn list_for_allocation(
        &self,
        allocation_id: Uuid,
    ) -> Result<Vec<AdminAction>, AppError> {
        let actions = sqlx::query_as::<Postgres, AdminAction>(
            "SELECT id, allocation_id, actor, action, created_at FROM admin_actions \
             WHERE allocation_id = $1 ORDER BY created_at DESC",
        )
        .bind(allocation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(actions)
    }
}
