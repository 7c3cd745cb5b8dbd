use granite_core::models::{Project, ProjectUser, ProjectUserStatus};
use granite_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const PROJECT_COLUMNS: &str = "id, title, status, pi_user_id, pi_username, end_date, \
     needs_review, created_at, updated_at";
const PROJECT_USER_COLUMNS: &str = "id, project_id, user_id, username, email, role, status, \
     enable_notifications, created_at, updated_at";

/// Repository for projects and project memberships.
#[derive(Clone)]
pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Project>, AppError> {
        let project = sqlx::query_as::<Postgres, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(project)
    }

    #[tracing::instrument(skip(self), fields(db.table = "project_users", db.operation = "select"))]
    pub async fn get_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProjectUser>, AppError> {
        let member = sqlx::query_as::<Postgres, ProjectUser>(&format!(
            "SELECT {PROJECT_USER_COLUMNS} FROM project_users WHERE project_id = $1 AND user_id = $2"
        ))
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    #[tracing::instrument(skip(self), fields(db.table = "project_users", db.operation = "select"))]
    pub async fn list_members(&self, project_id: Uuid) -> Result<Vec<ProjectUser>, AppError> {
        let members = sqlx::query_as::<Postgres, ProjectUser>(&format!(
            "SELECT {PROJECT_USER_COLUMNS} FROM project_users \
             WHERE project_id = $1 AND status = 'active' ORDER BY username"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    /// Recipients of customer notifications: the PI plus active members with
    /// notifications enabled.
    #[tracing::instrument(skip(self), fields(db.table = "project_users", db.operation = "select"))]
    pub async fn list_notification_recipients(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ProjectUser>, AppError> {
        let members = sqlx::query_as::<Postgres, ProjectUser>(&format!(
            r#"
            SELECT {PROJECT_USER_COLUMNS} FROM project_users pu
            WHERE pu.project_id = $1
              AND pu.status = 'active'
              AND (pu.enable_notifications
                   OR pu.user_id = (SELECT pi_user_id FROM projects WHERE id = $1))
            ORDER BY pu.username
            "#
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    #[tracing::instrument(skip(self), fields(db.table = "project_users", db.operation = "update"))]
    pub async fn set_member_status(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        status: ProjectUserStatus,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE project_users SET status = $3, updated_at = NOW() \
             WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
