use crate::domain::error::AppError;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Inserts the (user, author) edge. A duplicate attempt is swallowed by
    /// the unique constraint and reported as success.
    async fn insert(&self, user_id: Uuid, author_id: Uuid) -> Result<(), AppError>;
    /// Removes the edge; removing a missing edge is a no-op.
    async fn delete(&self, user_id: Uuid, author_id: Uuid) -> Result<(), AppError>;
    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PostgresFollowRepository {
    pool: PgPool,
}

impl PostgresFollowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowRepository for PostgresFollowRepository {
    async fn insert(&self, user_id: Uuid, author_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO follows (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT unique_subscription DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(author_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create follow: {}", e);
            AppError::Internal(format!("database error: {}", e))
        })?;

        info!(user_id = %user_id, author_id = %author_id, "follow added");
        Ok(())
    }

    async fn delete(&self, user_id: Uuid, author_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to delete follow: {}", e);
                AppError::Internal(format!("database error: {}", e))
            })?;

        info!(user_id = %user_id, author_id = %author_id, "follow removed");
        Ok(())
    }

    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("db error checking follow: {}", e);
            AppError::Internal(e.to_string())
        })
    }
}
