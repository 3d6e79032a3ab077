//! In-memory repository used by the test suite in place of Postgres. It
//! honors the same invariants the schema enforces: unique usernames and
//! slugs, the unique follow pair, newest-first ordering.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::comment::Comment;
use crate::domain::error::AppError;
use crate::domain::follow::Follow;
use crate::domain::group::Group;
use crate::domain::post::{Post, PostQuery};
use crate::domain::user::User;

use super::comment_repository::CommentRepository;
use super::follow_repository::FollowRepository;
use super::group_repository::GroupRepository;
use super::post_repository::PostRepository;
use super::user_repository::UserRepository;

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
}

#[derive(Clone, Default)]
pub struct MemoryRepo {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete_all_posts(&self) {
        self.state.lock().unwrap().posts.clear();
    }

    fn matches(post: &Post, query: &PostQuery, follows: &[Follow]) -> bool {
        match query {
            PostQuery::All => true,
            PostQuery::Group(id) => post.group_id == Some(*id),
            PostQuery::Author(id) => post.author_id == *id,
            PostQuery::Feed(user_id) => follows
                .iter()
                .any(|f| f.user_id == *user_id && f.author_id == post.author_id),
        }
    }

    fn selected(&self, query: &PostQuery) -> Vec<Post> {
        let state = self.state.lock().unwrap();
        let mut posts: Vec<Post> = state
            .posts
            .iter()
            .filter(|p| Self::matches(p, query, &state.follows))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
        posts
    }
}

#[async_trait]
impl UserRepository for MemoryRepo {
    async fn create(&self, user: User) -> Result<User, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(AppError::AlreadyExists("username already taken".into()));
        }
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::AlreadyExists("email already registered".into()));
        }
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        match state.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password_hash = password_hash;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("user {id}"))),
        }
    }
}

#[async_trait]
impl GroupRepository for MemoryRepo {
    async fn create(&self, group: Group) -> Result<Group, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.groups.iter().any(|g| g.slug == group.slug) {
            return Err(AppError::AlreadyExists("group slug already taken".into()));
        }
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .groups
            .iter()
            .find(|g| g.id == id)
            .cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .groups
            .iter()
            .find(|g| g.slug == slug)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Group>, AppError> {
        let mut groups = self.state.lock().unwrap().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }
}

#[async_trait]
impl PostRepository for MemoryRepo {
    async fn create(&self, post: Post) -> Result<Post, AppError> {
        self.state.lock().unwrap().posts.push(post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .posts
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        text: String,
        group_id: Option<Uuid>,
        image: Option<String>,
    ) -> Result<Option<Post>, AppError> {
        let mut state = self.state.lock().unwrap();
        let group = group_id.and_then(|gid| state.groups.iter().find(|g| g.id == gid).cloned());
        match state.posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                post.text = text;
                post.group_id = group_id;
                post.group_title = group.as_ref().map(|g| g.title.clone());
                post.group_slug = group.as_ref().map(|g| g.slug.clone());
                if image.is_some() {
                    post.image = image;
                }
                Ok(Some(post.clone()))
            }
            None => Ok(None),
        }
    }

    async fn count(&self, query: &PostQuery) -> Result<u64, AppError> {
        Ok(self.selected(query).len() as u64)
    }

    async fn list(
        &self,
        query: &PostQuery,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Post>, AppError> {
        Ok(self
            .selected(query)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl CommentRepository for MemoryRepo {
    async fn create(&self, comment: Comment) -> Result<Comment, AppError> {
        self.state.lock().unwrap().comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, AppError> {
        let mut comments: Vec<Comment> = self
            .state
            .lock()
            .unwrap()
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
        Ok(comments)
    }
}

#[async_trait]
impl FollowRepository for MemoryRepo {
    async fn insert(&self, user_id: Uuid, author_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let edge = Follow { user_id, author_id };
        if !state.follows.contains(&edge) {
            state.follows.push(edge);
        }
        Ok(())
    }

    async fn delete(&self, user_id: Uuid, author_id: Uuid) -> Result<(), AppError> {
        self.state
            .lock()
            .unwrap()
            .follows
            .retain(|f| !(f.user_id == user_id && f.author_id == author_id));
        Ok(())
    }

    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .follows
            .contains(&Follow { user_id, author_id }))
    }
}
