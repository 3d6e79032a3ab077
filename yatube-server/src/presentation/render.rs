use actix_web::{HttpResponse, http::header};
use tera::{Context, Tera};
use tracing::error;

use crate::domain::error::AppError;
use crate::presentation::extractors::MaybeUser;

/// Context pre-seeded with what the base template needs on every page.
pub fn base_context(user: &MaybeUser) -> Context {
    let mut ctx = Context::new();
    ctx.insert("user", &user.0);
    ctx
}

pub fn render(tera: &Tera, name: &str, ctx: &Context) -> Result<String, AppError> {
    tera.render(name, ctx).map_err(|e| {
        error!("failed to render {}: {}", name, e);
        AppError::Internal(format!("template error: {e}"))
    })
}

pub fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

pub fn redirect(location: impl Into<String>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.into()))
        .finish()
}
