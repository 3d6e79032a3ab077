use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::data::follow_repository::FollowRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::error::AppError;
use crate::domain::user::User;

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowRepository>,
    users: Arc<dyn UserRepository>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { follows, users }
    }

    /// Subscribes `user_id` to the author. Self-follow and duplicate clicks
    /// are no-ops, never errors.
    #[instrument(skip(self))]
    pub async fn follow(&self, user_id: Uuid, author_username: &str) -> Result<User, AppError> {
        let author = self.author(author_username).await?;
        if author.id != user_id {
            self.follows.insert(user_id, author.id).await?;
            info!(user_id = %user_id, author = %author.username, "followed");
        }
        Ok(author)
    }

    #[instrument(skip(self))]
    pub async fn unfollow(&self, user_id: Uuid, author_username: &str) -> Result<User, AppError> {
        let author = self.author(author_username).await?;
        self.follows.delete(user_id, author.id).await?;
        info!(user_id = %user_id, author = %author.username, "unfollowed");
        Ok(author)
    }

    pub async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, AppError> {
        self.follows.exists(user_id, author_id).await
    }

    async fn author(&self, username: &str) -> Result<User, AppError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {username}")))
    }
}
