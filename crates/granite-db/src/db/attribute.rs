use granite_core::models::{AllocationAttribute, AttributeDetail, AttributeType};
use granite_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const DETAIL_QUERY: &str = r#"
SELECT aa.id, aa.allocation_id, aa.attribute_type_id,
       at.name AS type_name, at.kind, at.is_unique, at.is_changeable, at.has_usage,
       aa.value, u.value AS usage
FROM allocation_attributes aa
JOIN attribute_types at ON at.id = aa.attribute_type_id
LEFT JOIN allocation_attribute_usage u ON u.allocation_attribute_id = aa.id
"#;

/// Repository for attribute types, allocation attributes, and usage rows.
#[derive(Clone)]
pub struct AttributeRepository {
    pool: PgPool,
}

impl AttributeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "attribute_types", db.operation = "select"))]
    pub async fn get_type(&self, id: Uuid) -> Result<Option<AttributeType>, AppError> {
        let attr_type = sqlx::query_as::<Postgres, AttributeType>(
            "SELECT id, name, kind, is_unique, is_changeable, has_usage, created_at, updated_at \
             FROM attribute_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attr_type)
    }

    #[tracing::instrument(skip(self), fields(db.table = "attribute_types", db.operation = "select"))]
    pub async fn get_type_by_name(&self, name: &str) -> Result<Option<AttributeType>, AppError> {
        let attr_type = sqlx::query_as::<Postgres, AttributeType>(
            "SELECT id, name, kind, is_unique, is_changeable, has_usage, created_at, updated_at \
             FROM attribute_types WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attr_type)
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_attributes", db.operation = "select"))]
    pub async fn list_details(&self, allocation_id: Uuid) -> Result<Vec<AttributeDetail>, AppError> {
        let details = sqlx::query_as::<Postgres, AttributeDetail>(&format!(
            "{DETAIL_QUERY} WHERE aa.allocation_id = $1 ORDER BY at.name"
        ))
        .bind(allocation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_attributes", db.operation = "select", db.record_id = %id))]
    pub async fn get_detail(&self, id: Uuid) -> Result<Option<AttributeDetail>, AppError> {
        let detail = sqlx::query_as::<Postgres, AttributeDetail>(&format!(
            "{DETAIL_QUERY} WHERE aa.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(detail)
    }

    #[tracing::instrument(skip(self, value), fields(db.table = "allocation_attributes", db.operation = "insert"))]
    pub async fn create(
        &self,
        allocation_id: Uuid,
        attribute_type_id: Uuid,
        value: &str,
    ) -> Result<AllocationAttribute, AppError> {
        let attribute = sqlx::query_as::<Postgres, AllocationAttribute>(
            r#"
            INSERT INTO allocation_attributes (allocation_id, attribute_type_id, value)
            VALUES ($1, $2, $3)
            RETURNING id, allocation_id, attribute_type_id, value, created_at, updated_at
            "#,
        )
        .bind(allocation_id)
        .bind(attribute_type_id)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;
        Ok(attribute)
    }

    /// Whether an attribute of this type already exists on the allocation.
    #[tracing::instrument(skip(self), fields(db.table = "allocation_attributes", db.operation = "select"))]
    pub async fn exists_for_type(
        &self,
        allocation_id: Uuid,
        attribute_type_id: Uuid,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM allocation_attributes WHERE allocation_id = $1 AND attribute_type_id = $2)",
        )
        .bind(allocation_id)
        .bind(attribute_type_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    #[tracing::instrument(skip(self, value), fields(db.table = "allocation_attributes", db.operation = "update", db.record_id = %id))]
    pub async fn set_value(&self, id: Uuid, value: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE allocation_attributes SET value = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "allocation_attributes", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM allocation_attributes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Ensure a usage row exists for a usage-tracking attribute.
    #[tracing::instrument(skip(self), fields(db.table = "allocation_attribute_usage", db.operation = "insert"))]
    pub async fn ensure_usage_row(&self, allocation_attribute_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO allocation_attribute_usage (allocation_attribute_id, value) \
             VALUES ($1, 0) ON CONFLICT (allocation_attribute_id) DO NOTHING",
        )
        .bind(allocation_attribute_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
