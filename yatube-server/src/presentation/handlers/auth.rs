use actix_web::cookie::Cookie;
use actix_web::{HttpResponse, Scope, get, post, web};
use serde::Deserialize;
use tera::Tera;
use tracing::info;

use crate::application::auth_service::{AuthService, Signup};
use crate::domain::error::AppError;
use crate::infrastructure::security::SESSION_COOKIE;
use crate::presentation::extractors::{MaybeUser, SessionUser};
use crate::presentation::forms::{
    FormErrors, LoginForm, PasswordChangeForm, PasswordResetConfirmForm, PasswordResetForm,
    SignupForm,
};
use crate::presentation::render::{base_context, html, render};

pub fn scope() -> Scope {
    web::scope("/auth")
        .service(signup_form)
        .service(signup)
        .service(login_form)
        .service(login)
        .service(logout)
        .service(password_change_form)
        .service(password_change)
        .service(password_reset_form)
        .service(password_reset)
        .service(password_reset_confirm_form)
        .service(password_reset_confirm)
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .finish()
}

// only site-local paths are followed; a `//host` prefix would leave the site
fn logged_in_redirect(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => "/".to_string(),
    }
}

#[get("/signup/")]
async fn signup_form(tera: web::Data<Tera>, user: MaybeUser) -> Result<HttpResponse, AppError> {
    let ctx = base_context(&user);
    Ok(html(render(&tera, "signup.html.tera", &ctx)?))
}

#[post("/signup/")]
async fn signup(
    form: web::Form<SignupForm>,
    auth: web::Data<AuthService>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let mut errors = form.validate();
    if errors.is_empty() {
        match auth
            .signup(Signup {
                username: form.username.clone(),
                email: form.email.clone(),
                password: form.password1.clone(),
                first_name: form.first_name.clone(),
                last_name: form.last_name.clone(),
            })
            .await
        {
            Ok((user, token)) => {
                info!(username = %user.username, "signup complete");
                return Ok(HttpResponse::Found()
                    .insert_header(("Location", "/"))
                    .cookie(session_cookie(token))
                    .finish());
            }
            Err(AppError::AlreadyExists(message)) => {
                errors.insert("username", message);
            }
            Err(other) => return Err(other),
        }
    }

    let mut ctx = base_context(&MaybeUser(None));
    ctx.insert("errors", &errors);
    ctx.insert("form", &form);
    Ok(html(render(&tera, "signup.html.tera", &ctx)?))
}

#[derive(Debug, Deserialize)]
struct NextParam {
    #[serde(default)]
    next: Option<String>,
}

#[get("/login/")]
async fn login_form(
    param: web::Query<NextParam>,
    tera: web::Data<Tera>,
    user: MaybeUser,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(&user);
    ctx.insert("next", &param.next);
    Ok(html(render(&tera, "login.html.tera", &ctx)?))
}

#[post("/login/")]
async fn login(
    form: web::Form<LoginForm>,
    auth: web::Data<AuthService>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    match auth.login(&form.username, &form.password).await {
        Ok((_, token)) => Ok(HttpResponse::Found()
            .insert_header(("Location", logged_in_redirect(form.next.as_deref())))
            .cookie(session_cookie(token))
            .finish()),
        Err(AppError::Invalid(message)) => {
            let mut errors = FormErrors::new();
            errors.insert("login", message);
            let mut ctx = base_context(&MaybeUser(None));
            ctx.insert("errors", &errors);
            ctx.insert("next", &form.next);
            Ok(html(render(&tera, "login.html.tera", &ctx)?))
        }
        Err(other) => Err(other),
    }
}

#[get("/logout/")]
async fn logout(tera: web::Data<Tera>) -> Result<HttpResponse, AppError> {
    let ctx = base_context(&MaybeUser(None));
    let body = render(&tera, "logged_out.html.tera", &ctx)?;
    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    let mut resp = html(body);
    if let Err(e) = resp.add_removal_cookie(&removal) {
        return Err(AppError::Internal(format!("failed to clear session: {e}")));
    }
    Ok(resp)
}

#[get("/password_change/")]
async fn password_change_form(
    user: SessionUser,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let ctx = base_context(&MaybeUser(Some(user)));
    Ok(html(render(&tera, "password_change.html.tera", &ctx)?))
}

#[post("/password_change/")]
async fn password_change(
    user: SessionUser,
    form: web::Form<PasswordChangeForm>,
    auth: web::Data<AuthService>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let mut errors = form.validate();
    if errors.is_empty() {
        match auth
            .change_password(user.id, &form.old_password, &form.new_password1)
            .await
        {
            Ok(()) => {
                let mut ctx = base_context(&MaybeUser(Some(user)));
                ctx.insert("done", &true);
                return Ok(html(render(&tera, "password_change.html.tera", &ctx)?));
            }
            Err(AppError::Invalid(message)) => {
                errors.insert("old_password", message);
            }
            Err(other) => return Err(other),
        }
    }

    let mut ctx = base_context(&MaybeUser(Some(user)));
    ctx.insert("errors", &errors);
    Ok(html(render(&tera, "password_change.html.tera", &ctx)?))
}

#[get("/password_reset/")]
async fn password_reset_form(
    tera: web::Data<Tera>,
    user: MaybeUser,
) -> Result<HttpResponse, AppError> {
    let ctx = base_context(&user);
    Ok(html(render(&tera, "password_reset.html.tera", &ctx)?))
}

#[post("/password_reset/")]
async fn password_reset(
    form: web::Form<PasswordResetForm>,
    auth: web::Data<AuthService>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    auth.request_password_reset(&form.email).await?;
    let mut ctx = base_context(&MaybeUser(None));
    ctx.insert("done", &true);
    Ok(html(render(&tera, "password_reset.html.tera", &ctx)?))
}

#[get("/password_reset/confirm/")]
async fn password_reset_confirm_form(
    param: web::Query<TokenParam>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(&MaybeUser(None));
    ctx.insert("token", &param.token);
    Ok(html(render(&tera, "password_reset_confirm.html.tera", &ctx)?))
}

#[derive(Debug, Deserialize)]
struct TokenParam {
    #[serde(default)]
    token: Option<String>,
}

#[post("/password_reset/confirm/")]
async fn password_reset_confirm(
    form: web::Form<PasswordResetConfirmForm>,
    auth: web::Data<AuthService>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let mut errors = form.validate();
    if errors.is_empty() {
        match auth.reset_password(&form.token, &form.new_password1).await {
            Ok(()) => {
                let mut ctx = base_context(&MaybeUser(None));
                ctx.insert("done", &true);
                return Ok(html(render(
                    &tera,
                    "password_reset_confirm.html.tera",
                    &ctx,
                )?));
            }
            Err(AppError::Invalid(message)) => {
                errors.insert("token", message);
            }
            Err(other) => return Err(other),
        }
    }

    let mut ctx = base_context(&MaybeUser(None));
    ctx.insert("errors", &errors);
    ctx.insert("token", &Some(form.token.clone()));
    Ok(html(render(&tera, "password_reset_confirm.html.tera", &ctx)?))
}
