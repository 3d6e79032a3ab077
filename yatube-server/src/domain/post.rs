use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters of post/comment text kept in the human-readable representation.
pub const REPR_TEXT_LEN: usize = 15;

/// Read model for a post. Author username and group title/slug are carried
/// alongside the foreign keys so templates and `Display` need no extra
/// queries; the Postgres repository fills them with a join.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub group_id: Option<Uuid>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
    pub text: String,
    pub image: Option<String>,
    pub pub_date: DateTime<Utc>,
}

impl Post {
    pub fn new(
        author_id: Uuid,
        author_username: String,
        text: String,
        group: Option<(Uuid, String, String)>,
        image: Option<String>,
    ) -> Self {
        let (group_id, group_title, group_slug) = match group {
            Some((id, title, slug)) => (Some(id), Some(title), Some(slug)),
            None => (None, None, None),
        };
        Self {
            id: Uuid::new_v4(),
            author_id,
            author_username,
            group_id,
            group_title,
            group_slug,
            text,
            image,
            pub_date: Utc::now(),
        }
    }
}

pub(crate) fn truncated(text: &str, len: usize) -> String {
    text.chars().take(len).collect()
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            truncated(&self.text, REPR_TEXT_LEN),
            self.pub_date.format("%Y-%m-%d"),
            self.author_username,
            self.group_title.as_deref().unwrap_or("")
        )
    }
}

/// Which post queryset a listing page is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostQuery {
    All,
    Group(Uuid),
    Author(Uuid),
    /// Posts of the authors the given user follows.
    Feed(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_truncates_text_to_fifteen_chars() {
        let mut post = Post::new(
            Uuid::new_v4(),
            "auth".into(),
            "a very long post body that keeps going".into(),
            Some((Uuid::new_v4(), "Dogs".into(), "dogs".into())),
            None,
        );
        post.pub_date = "2023-03-09T11:57:00Z".parse().unwrap();
        assert_eq!(post.to_string(), "a very long pos, 2023-03-09, auth, Dogs");
    }

    #[test]
    fn display_without_group_leaves_slot_empty() {
        let mut post = Post::new(Uuid::new_v4(), "auth".into(), "short".into(), None, None);
        post.pub_date = "2023-03-09T11:57:00Z".parse().unwrap();
        assert_eq!(post.to_string(), "short, 2023-03-09, auth, ");
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        assert_eq!(truncated("тестовый пост про кота", 15), "тестовый пост п");
    }
}
