use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::post::{REPR_TEXT_LEN, truncated};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: Uuid, author_id: Uuid, author_username: String, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id,
            author_id,
            author_username,
            text,
            pub_date: Utc::now(),
        }
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}",
            truncated(&self.text, REPR_TEXT_LEN),
            self.pub_date.format("%Y-%m-%d"),
            self.author_username
        )
    }
}
