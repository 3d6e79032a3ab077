pub mod about;
pub mod auth;
pub mod posts;
