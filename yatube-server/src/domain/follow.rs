use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directed subscription edge: `user` follows `author`.
/// The pair is unique at the database level (`unique_subscription`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub user_id: Uuid,
    pub author_id: Uuid,
}

impl fmt::Display for Follow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.user_id, self.author_id)
    }
}
