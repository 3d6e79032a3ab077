use actix_web::{HttpResponse, ResponseError, http::StatusCode, http::header};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    /// Protected route hit without a session; answered with a redirect to the
    /// login page carrying the originally requested path.
    #[error("login required")]
    LoginRequired { next: String },
    #[error("{0}")]
    Invalid(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::LoginRequired { .. } => StatusCode::FOUND,
            AppError::Invalid(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::LoginRequired { next } => HttpResponse::Found()
                .insert_header((header::LOCATION, format!("/auth/login/?next={next}")))
                .finish(),
            // the 404 body is replaced by the not-found template downstream
            other => HttpResponse::build(other.status_code())
                .content_type("text/html; charset=utf-8")
                .body(format!(
                    "<!doctype html>\n<html><body><h1>{}</h1></body></html>",
                    other
                )),
        }
    }
}
