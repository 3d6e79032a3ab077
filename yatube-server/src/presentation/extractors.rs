use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, web};
use futures_util::future::{Ready, ready};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::error::AppError;
use crate::infrastructure::security::{SESSION_COOKIE, SessionKeys};

/// The signed-in user, decoded from the session cookie. As an extractor it
/// guards a route: missing or invalid session turns into a redirect to the
/// login page carrying the requested path in `next`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
}

pub(crate) fn session_user(req: &HttpRequest) -> Option<SessionUser> {
    let keys = req.app_data::<web::Data<SessionKeys>>()?;
    let cookie = req.cookie(SESSION_COOKIE)?;
    let claims = keys.verify_session(cookie.value()).ok()?;
    let id = Uuid::parse_str(&claims.sub).ok()?;
    Some(SessionUser {
        id,
        username: claims.username,
    })
}

impl FromRequest for SessionUser {
    type Error = AppError;
    type Future = Ready<Result<Self, AppError>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(session_user(req).ok_or_else(|| AppError::LoginRequired {
            next: req.path().to_string(),
        }))
    }
}

/// Non-guarding variant for pages that render for everyone but vary on the
/// login state (navigation, follow buttons).
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<SessionUser>);

impl FromRequest for MaybeUser {
    type Error = AppError;
    type Future = Ready<Result<Self, AppError>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(MaybeUser(session_user(req))))
    }
}
