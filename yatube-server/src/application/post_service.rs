use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::data::comment_repository::CommentRepository;
use crate::data::group_repository::GroupRepository;
use crate::data::post_repository::PostRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::comment::Comment;
use crate::domain::error::AppError;
use crate::domain::group::Group;
use crate::domain::page::{POSTS_PER_PAGE, Page, clamp_page, page_offset};
use crate::domain::post::{Post, PostQuery};
use crate::domain::user::User;

/// Validated input for creating or editing a post. The image, when present,
/// has already been written to the media store.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image: Option<String>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    groups: Arc<dyn GroupRepository>,
    users: Arc<dyn UserRepository>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        groups: Arc<dyn GroupRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            posts,
            comments,
            groups,
            users,
        }
    }

    /// Builds one listing page for the given queryset. An out-of-range
    /// request lands on the nearest valid page.
    pub async fn page_of(&self, query: PostQuery, requested: i64) -> Result<Page<Post>, AppError> {
        let total = self.posts.count(&query).await?;
        let number = clamp_page(requested, total, POSTS_PER_PAGE);
        let items = self
            .posts
            .list(&query, POSTS_PER_PAGE, page_offset(number, POSTS_PER_PAGE))
            .await?;
        Ok(Page::new(items, number, total, POSTS_PER_PAGE))
    }

    pub async fn index_page(&self, requested: i64) -> Result<Page<Post>, AppError> {
        self.page_of(PostQuery::All, requested).await
    }

    /// Resolves the page an index request will land on after clamping, so
    /// cache lookups for equivalent requests share one entry.
    pub async fn index_page_number(&self, requested: i64) -> Result<u64, AppError> {
        let total = self.posts.count(&PostQuery::All).await?;
        Ok(clamp_page(requested, total, POSTS_PER_PAGE))
    }

    pub async fn group_page(
        &self,
        slug: &str,
        requested: i64,
    ) -> Result<(Group, Page<Post>), AppError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("group {slug}")))?;
        let page = self.page_of(PostQuery::Group(group.id), requested).await?;
        Ok((group, page))
    }

    pub async fn profile_page(
        &self,
        username: &str,
        requested: i64,
    ) -> Result<(User, Page<Post>), AppError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {username}")))?;
        let page = self.page_of(PostQuery::Author(author.id), requested).await?;
        Ok((author, page))
    }

    pub async fn feed_page(&self, user_id: Uuid, requested: i64) -> Result<Page<Post>, AppError> {
        self.page_of(PostQuery::Feed(user_id), requested).await
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Post, AppError> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {id}")))
    }

    pub async fn post_detail(&self, id: Uuid) -> Result<(Post, Vec<Comment>), AppError> {
        let post = self.get_post(id).await?;
        let comments = self.comments.list_for_post(id).await?;
        Ok((post, comments))
    }

    pub async fn groups_for_form(&self) -> Result<Vec<Group>, AppError> {
        self.groups.list_all().await
    }

    #[instrument(skip(self, input))]
    pub async fn create_post(&self, author_id: Uuid, input: PostInput) -> Result<Post, AppError> {
        let author = self
            .users
            .find_by_id(author_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {author_id}")))?;
        let group = self.resolve_group(input.group_id).await?;

        let post = Post::new(
            author.id,
            author.username,
            input.text,
            group.map(|g| (g.id, g.title, g.slug)),
            input.image,
        );
        self.posts.create(post).await
    }

    /// Rewrites the post. Ownership has been checked by the caller; an
    /// unknown group id is rejected before anything is written.
    #[instrument(skip(self, input))]
    pub async fn edit_post(&self, post_id: Uuid, input: PostInput) -> Result<Post, AppError> {
        self.resolve_group(input.group_id).await?;
        self.posts
            .update(post_id, input.text, input.group_id, input.image)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {post_id}")))
    }

    #[instrument(skip(self, text))]
    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, AppError> {
        let post = self.get_post(post_id).await?;
        let author = self
            .users
            .find_by_id(author_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {author_id}")))?;
        let comment = Comment::new(post.id, author.id, author.username, text);
        self.comments.create(comment).await
    }

    async fn resolve_group(&self, group_id: Option<Uuid>) -> Result<Option<Group>, AppError> {
        match group_id {
            None => Ok(None),
            Some(id) => self
                .groups
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::Invalid("unknown group".into()))
                .map(Some),
        }
    }
}
