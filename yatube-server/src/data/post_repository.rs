use crate::domain::error::AppError;
use crate::domain::post::{Post, PostQuery};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: Post) -> Result<Post, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, AppError>;
    /// Rewrites text and group; replaces the image path only when one is
    /// supplied, otherwise the stored image is kept.
    async fn update(
        &self,
        id: Uuid,
        text: String,
        group_id: Option<Uuid>,
        image: Option<String>,
    ) -> Result<Option<Post>, AppError>;
    async fn count(&self, query: &PostQuery) -> Result<u64, AppError>;
    async fn list(&self, query: &PostQuery, limit: u64, offset: u64)
    -> Result<Vec<Post>, AppError>;
}

#[derive(Clone)]
pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Every select joins the author and the optional group so the read model
// comes back complete.
const POST_SELECT: &str = r#"
SELECT p.id, p.author_id, u.username AS author_username,
       p.group_id, g.title AS group_title, g.slug AS group_slug,
       p.text, p.image, p.pub_date
FROM posts p
JOIN users u ON u.id = p.author_id
LEFT JOIN groups g ON g.id = p.group_id
"#;

fn filter_clause(query: &PostQuery) -> &'static str {
    match query {
        PostQuery::All => "",
        PostQuery::Group(_) => "WHERE p.group_id = $3",
        PostQuery::Author(_) => "WHERE p.author_id = $3",
        PostQuery::Feed(_) => {
            "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = $3)"
        }
    }
}

fn filter_id(query: &PostQuery) -> Option<Uuid> {
    match query {
        PostQuery::All => None,
        PostQuery::Group(id) | PostQuery::Author(id) | PostQuery::Feed(id) => Some(*id),
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, post: Post) -> Result<Post, AppError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, group_id, text, image, pub_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(post.group_id)
        .bind(&post.text)
        .bind(&post.image)
        .bind(post.pub_date)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create post: {}", e);
            AppError::Internal(format!("database error: {}", e))
        })?;

        info!(post_id = %post.id, author_id = %post.author_id, "post created");
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, AppError> {
        sqlx::query_as::<_, Post>(&format!("{POST_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("db error find_by_id {}: {}", id, e);
                AppError::Internal(e.to_string())
            })
    }

    async fn update(
        &self,
        id: Uuid,
        text: String,
        group_id: Option<Uuid>,
        image: Option<String>,
    ) -> Result<Option<Post>, AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE posts
            SET text = $1, group_id = $2, image = COALESCE($3, image)
            WHERE id = $4
            "#,
        )
        .bind(&text)
        .bind(group_id)
        .bind(&image)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to update post {}: {}", id, e);
            AppError::Internal(e.to_string())
        })?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        info!(post_id = %id, "post updated");
        self.find_by_id(id).await
    }

    async fn count(&self, query: &PostQuery) -> Result<u64, AppError> {
        let sql = format!(
            "SELECT COUNT(*) FROM posts p {}",
            filter_clause(query).replace("$3", "$1")
        );
        let mut q = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(id) = filter_id(query) {
            q = q.bind(id);
        }
        let count = q.fetch_one(&self.pool).await.map_err(|e| {
            error!("db error counting posts: {}", e);
            AppError::Internal(e.to_string())
        })?;
        Ok(count as u64)
    }

    async fn list(
        &self,
        query: &PostQuery,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Post>, AppError> {
        let sql = format!(
            "{POST_SELECT} {} ORDER BY p.pub_date DESC LIMIT $1 OFFSET $2",
            filter_clause(query)
        );
        let mut q = sqlx::query_as::<_, Post>(&sql)
            .bind(limit as i64)
            .bind(offset as i64);
        if let Some(id) = filter_id(query) {
            q = q.bind(id);
        }
        q.fetch_all(&self.pool).await.map_err(|e| {
            error!("db error while fetching posts: {}", e);
            AppError::Internal(e.to_string())
        })
    }
}
