pub mod extractors;
pub mod forms;
pub mod handlers;
pub mod middleware;
pub mod render;
