use granite_core::models::Resource;
use granite_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const RESOURCE_COLUMNS: &str = "id, name, description, user_limit, eula, requires_eula, \
     requires_account, requires_resource_account, requires_payment, allocation_limit, \
     review_groups, created_at, updated_at";

/// Repository for resources.
#[derive(Clone)]
pub struct ResourceRepository {
    pool: PgPool,
}

impl ResourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Resource>, AppError> {
        let resource = sqlx::query_as::<Postgres, Resource>(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(resource)
    }

    /// Linked resources of an allocation, parent excluded.
    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "select"))]
    pub async fn list_linked(&self, allocation_id: Uuid) -> Result<Vec<Resource>, AppError> {
        let resources = sqlx::query_as::<Postgres, Resource>(&format!(
            r#"
            SELECT {RESOURCE_COLUMNS} FROM resources r
            JOIN allocation_resources ar ON ar.resource_id = r.id
            WHERE ar.allocation_id = $1 AND NOT ar.is_parent
            ORDER BY r.name
            "#
        ))
        .bind(allocation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(resources)
    }
}
