use actix_multipart::Multipart;
use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;
use tera::Tera;
use tracing::info;
use uuid::Uuid;

use crate::application::follow_service::FollowService;
use crate::application::post_service::{PostInput, PostService};
use crate::domain::error::AppError;
use crate::infrastructure::cache::PageCache;
use crate::infrastructure::media::MediaStore;
use crate::presentation::extractors::{MaybeUser, SessionUser};
use crate::presentation::forms::{CommentForm, PostForm, read_post_form};
use crate::presentation::render::{base_context, html, redirect, render};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(group_posts)
        .service(follow_index)
        .service(profile_follow)
        .service(profile_unfollow)
        .service(profile)
        .service(post_create_form)
        .service(post_create)
        .service(post_edit_form)
        .service(post_edit)
        .service(add_comment)
        .service(post_detail);
}

#[derive(Debug, Deserialize)]
pub struct PageParam {
    #[serde(default)]
    page: Option<String>,
}

impl PageParam {
    /// Unparsable input falls back to the first page; range clamping is the
    /// pagination layer's job.
    fn number(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1)
    }
}

#[get("/")]
async fn index(
    param: web::Query<PageParam>,
    posts: web::Data<PostService>,
    tera: web::Data<Tera>,
    cache: web::Data<PageCache>,
    user: MaybeUser,
) -> Result<HttpResponse, AppError> {
    // keys carry the session identity and the clamped page number
    let number = posts.index_page_number(param.number()).await?;
    let identity = user
        .0
        .as_ref()
        .map(|u| u.id.to_string())
        .unwrap_or_default();
    let key = format!("index:user={identity}:page={number}");
    if let Some(body) = cache.get(&key) {
        return Ok(html(body));
    }

    let page = posts.index_page(number as i64).await?;
    let mut ctx = base_context(&user);
    ctx.insert("page_obj", &page);
    let body = render(&tera, "index.html.tera", &ctx)?;
    cache.put(key, body.clone());
    Ok(html(body))
}

#[get("/group/{slug}/")]
async fn group_posts(
    path: web::Path<String>,
    param: web::Query<PageParam>,
    posts: web::Data<PostService>,
    tera: web::Data<Tera>,
    user: MaybeUser,
) -> Result<HttpResponse, AppError> {
    let slug = path.into_inner();
    let (group, page) = posts.group_page(&slug, param.number()).await?;

    let mut ctx = base_context(&user);
    ctx.insert("group", &group);
    ctx.insert("page_obj", &page);
    Ok(html(render(&tera, "group_list.html.tera", &ctx)?))
}

#[get("/profile/{username}/")]
async fn profile(
    path: web::Path<String>,
    param: web::Query<PageParam>,
    posts: web::Data<PostService>,
    follows: web::Data<FollowService>,
    tera: web::Data<Tera>,
    user: MaybeUser,
) -> Result<HttpResponse, AppError> {
    let username = path.into_inner();
    let (author, page) = posts.profile_page(&username, param.number()).await?;

    let following = match &user.0 {
        Some(current) => follows.is_following(current.id, author.id).await?,
        None => false,
    };

    let mut ctx = base_context(&user);
    ctx.insert("author", &author);
    ctx.insert("author_full_name", &author.full_name());
    ctx.insert("following", &following);
    ctx.insert("page_obj", &page);
    Ok(html(render(&tera, "profile.html.tera", &ctx)?))
}

#[get("/posts/{id}/")]
async fn post_detail(
    path: web::Path<Uuid>,
    posts: web::Data<PostService>,
    tera: web::Data<Tera>,
    user: MaybeUser,
) -> Result<HttpResponse, AppError> {
    let (post, comments) = posts.post_detail(path.into_inner()).await?;

    let mut ctx = base_context(&user);
    ctx.insert("post", &post);
    ctx.insert("comments", &comments);
    Ok(html(render(&tera, "post_detail.html.tera", &ctx)?))
}

#[get("/create/")]
async fn post_create_form(
    user: SessionUser,
    posts: web::Data<PostService>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let groups = posts.groups_for_form().await?;
    let mut ctx = base_context(&MaybeUser(Some(user)));
    ctx.insert("groups", &groups);
    ctx.insert("is_edit", &false);
    Ok(html(render(&tera, "create_post.html.tera", &ctx)?))
}

#[post("/create/")]
async fn post_create(
    user: SessionUser,
    payload: Multipart,
    posts: web::Data<PostService>,
    media: web::Data<MediaStore>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let form = read_post_form(payload).await?;
    let errors = form.validate();
    if !errors.is_empty() {
        let groups = posts.groups_for_form().await?;
        let username = user.username.clone();
        let mut ctx = base_context(&MaybeUser(Some(user)));
        ctx.insert("groups", &groups);
        ctx.insert("is_edit", &false);
        ctx.insert("errors", &errors);
        ctx.insert("text", &form.text);
        info!(username = %username, "post form rejected");
        return Ok(html(render(&tera, "create_post.html.tera", &ctx)?));
    }

    let input = build_input(form, &media)?;
    let post = posts.create_post(user.id, input).await?;
    info!(username = %user.username, post_id = %post.id, "post created");
    Ok(redirect(format!("/profile/{}/", user.username)))
}

#[get("/posts/{id}/edit/")]
async fn post_edit_form(
    user: SessionUser,
    path: web::Path<Uuid>,
    posts: web::Data<PostService>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let post = posts.get_post(post_id).await?;
    if post.author_id != user.id {
        return Ok(redirect(format!("/posts/{post_id}/")));
    }

    let groups = posts.groups_for_form().await?;
    let mut ctx = base_context(&MaybeUser(Some(user)));
    ctx.insert("groups", &groups);
    ctx.insert("is_edit", &true);
    ctx.insert("post", &post);
    ctx.insert("text", &post.text);
    Ok(html(render(&tera, "create_post.html.tera", &ctx)?))
}

#[post("/posts/{id}/edit/")]
async fn post_edit(
    user: SessionUser,
    path: web::Path<Uuid>,
    payload: Multipart,
    posts: web::Data<PostService>,
    media: web::Data<MediaStore>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let post = posts.get_post(post_id).await?;
    // a non-author's edit is silently dropped
    if post.author_id != user.id {
        return Ok(redirect(format!("/posts/{post_id}/")));
    }

    let form = read_post_form(payload).await?;
    let errors = form.validate();
    if !errors.is_empty() {
        let groups = posts.groups_for_form().await?;
        let mut ctx = base_context(&MaybeUser(Some(user)));
        ctx.insert("groups", &groups);
        ctx.insert("is_edit", &true);
        ctx.insert("post", &post);
        ctx.insert("errors", &errors);
        ctx.insert("text", &form.text);
        return Ok(html(render(&tera, "create_post.html.tera", &ctx)?));
    }

    let input = build_input(form, &media)?;
    posts.edit_post(post_id, input).await?;
    info!(username = %user.username, post_id = %post_id, "post updated");
    Ok(redirect(format!("/posts/{post_id}/")))
}

#[post("/posts/{id}/comment/")]
async fn add_comment(
    user: SessionUser,
    path: web::Path<Uuid>,
    form: web::Form<CommentForm>,
    posts: web::Data<PostService>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let errors = form.validate();
    if !errors.is_empty() {
        let (post, comments) = posts.post_detail(post_id).await?;
        let mut ctx = base_context(&MaybeUser(Some(user)));
        ctx.insert("post", &post);
        ctx.insert("comments", &comments);
        ctx.insert("errors", &errors);
        return Ok(html(render(&tera, "post_detail.html.tera", &ctx)?));
    }

    let comment = posts
        .add_comment(post_id, user.id, form.text.trim().to_string())
        .await?;
    info!(username = %user.username, comment_id = %comment.id, "comment added");
    Ok(redirect(format!("/posts/{post_id}/")))
}

#[get("/follow/")]
async fn follow_index(
    user: SessionUser,
    param: web::Query<PageParam>,
    posts: web::Data<PostService>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let page = posts.feed_page(user.id, param.number()).await?;
    let mut ctx = base_context(&MaybeUser(Some(user)));
    ctx.insert("page_obj", &page);
    Ok(html(render(&tera, "follow.html.tera", &ctx)?))
}

#[get("/profile/{username}/follow/")]
async fn profile_follow(
    user: SessionUser,
    path: web::Path<String>,
    follows: web::Data<FollowService>,
) -> Result<HttpResponse, AppError> {
    let author = follows.follow(user.id, &path.into_inner()).await?;
    Ok(redirect(format!("/profile/{}/", author.username)))
}

#[get("/profile/{username}/unfollow/")]
async fn profile_unfollow(
    user: SessionUser,
    path: web::Path<String>,
    follows: web::Data<FollowService>,
) -> Result<HttpResponse, AppError> {
    let author = follows.unfollow(user.id, &path.into_inner()).await?;
    Ok(redirect(format!("/profile/{}/", author.username)))
}

fn build_input(form: PostForm, media: &MediaStore) -> Result<PostInput, AppError> {
    let image = match &form.image {
        Some(upload) => Some(
            media
                .save_post_image(&upload.filename, &upload.bytes)
                .map_err(|e| AppError::Internal(format!("failed to store image: {e}")))?,
        ),
        None => None,
    };
    Ok(PostInput {
        text: form.text.trim().to_string(),
        group_id: form.group,
        image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::cookie::Cookie;
    use actix_web::http::{StatusCode, header};
    use actix_web::middleware::ErrorHandlers;
    use actix_web::{App, test};

    use crate::data::memory::MemoryRepo;
    use crate::data::{
        follow_repository::FollowRepository, group_repository::GroupRepository,
        post_repository::PostRepository, user_repository::UserRepository,
    };
    use crate::presentation::middleware::rewrite_not_found;
    use crate::domain::group::Group;
    use crate::domain::post::Post;
    use crate::domain::user::User;
    use crate::infrastructure::security::{SESSION_COOKIE, SessionKeys};

    struct TestEnv {
        repo: MemoryRepo,
        keys: SessionKeys,
        post_service: PostService,
        follow_service: FollowService,
        cache: web::Data<PageCache>,
    }

    fn env() -> TestEnv {
        let repo = MemoryRepo::new();
        let shared = Arc::new(repo.clone());
        TestEnv {
            post_service: PostService::new(
                shared.clone(),
                shared.clone(),
                shared.clone(),
                shared.clone(),
            ),
            follow_service: FollowService::new(shared.clone(), shared),
            keys: SessionKeys::new("test-secret".into()),
            cache: web::Data::new(PageCache::new(Duration::from_secs(20))),
            repo,
        }
    }

    fn tera() -> Tera {
        Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*")).unwrap()
    }

    macro_rules! app {
        ($env:expr) => {
            test::init_service(
                App::new()
                    .wrap(ErrorHandlers::new().handler(StatusCode::NOT_FOUND, rewrite_not_found))
                    .app_data(web::Data::new(tera()))
                    .app_data(web::Data::new($env.keys.clone()))
                    .app_data(web::Data::new($env.post_service.clone()))
                    .app_data(web::Data::new($env.follow_service.clone()))
                    .app_data($env.cache.clone())
                    .app_data(web::Data::new(MediaStore::new(std::env::temp_dir())))
                    .configure(configure),
            )
            .await
        };
    }

    async fn seed_user(repo: &MemoryRepo, username: &str) -> User {
        UserRepository::create(
            repo,
            User::new(
                username.into(),
                format!("{username}@example.com"),
                "hash".into(),
                String::new(),
                String::new(),
            ),
        )
        .await
        .unwrap()
    }

    async fn seed_post(repo: &MemoryRepo, author: &User, group: Option<&Group>) -> Post {
        PostRepository::create(
            repo,
            Post::new(
                author.id,
                author.username.clone(),
                "Тестовый пост".into(),
                group.map(|g| (g.id, g.title.clone(), g.slug.clone())),
                None,
            ),
        )
        .await
        .unwrap()
    }

    fn session_cookie(keys: &SessionKeys, user: &User) -> Cookie<'static> {
        Cookie::new(SESSION_COOKIE, keys.issue_session(user).unwrap())
    }

    fn location<B>(resp: &actix_web::dev::ServiceResponse<B>) -> &str {
        resp.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    #[actix_web::test]
    async fn public_pages_respond_and_unknown_paths_404() {
        let env = env();
        let author = seed_user(&env.repo, "auth").await;
        let group = GroupRepository::create(
            &env.repo,
            Group::new("Тестовая группа".into(), "test-slug".into(), String::new()),
        )
        .await
        .unwrap();
        let post = seed_post(&env.repo, &author, Some(&group)).await;

        let app = app!(env);
        for uri in [
            "/".to_string(),
            "/group/test-slug/".to_string(),
            "/profile/auth/".to_string(),
            format!("/posts/{}/", post.id),
        ] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK, "GET {uri}");
        }

        // unmatched routes and missing resources share the not-found page
        for uri in ["/unexist_page/", "/group/no-such-slug/", "/profile/ghost/"] {
            let resp =
                test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "GET {uri}");
            let body = test::read_body(resp).await;
            assert!(
                String::from_utf8_lossy(&body).contains("Custom 404"),
                "GET {uri}"
            );
        }
    }

    #[actix_web::test]
    async fn guests_are_sent_to_login_with_next() {
        let env = env();
        let author = seed_user(&env.repo, "auth").await;
        let post = seed_post(&env.repo, &author, None).await;
        let app = app!(env);

        let edit = format!("/posts/{}/edit/", post.id);
        let comment = format!("/posts/{}/comment/", post.id);
        for (uri, expected) in [
            ("/create/".to_string(), "/auth/login/?next=/create/".to_string()),
            (edit.clone(), format!("/auth/login/?next={edit}")),
            ("/follow/".to_string(), "/auth/login/?next=/follow/".to_string()),
        ] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::FOUND, "GET {uri}");
            assert_eq!(location(&resp), expected);
        }

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&comment)
                .set_form(CommentForm { text: "hi".into() })
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), format!("/auth/login/?next={comment}"));
    }

    #[actix_web::test]
    async fn non_author_edit_is_redirected_to_detail_unchanged() {
        let env = env();
        let author = seed_user(&env.repo, "auth").await;
        let reader = seed_user(&env.repo, "reader").await;
        let post = seed_post(&env.repo, &author, None).await;
        let app = app!(env);

        let edit = format!("/posts/{}/edit/", post.id);
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&edit)
                .cookie(session_cookie(&env.keys, &reader))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), format!("/posts/{}/", post.id));

        let unchanged = PostRepository::find_by_id(&env.repo, post.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.text, "Тестовый пост");

        // the author still gets the form
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&edit)
                .cookie(session_cookie(&env.keys, &author))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn authenticated_comment_is_stored_and_redirects_to_detail() {
        let env = env();
        let author = seed_user(&env.repo, "auth").await;
        let reader = seed_user(&env.repo, "reader").await;
        let post = seed_post(&env.repo, &author, None).await;
        let app = app!(env);

        let uri = format!("/posts/{}/comment/", post.id);
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&uri)
                .cookie(session_cookie(&env.keys, &reader))
                .set_form(CommentForm {
                    text: "Тестовый комментарий".into(),
                })
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), format!("/posts/{}/", post.id));

        let (_, comments) = env.post_service.post_detail(post.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "Тестовый комментарий");
        assert_eq!(comments[0].author_username, "reader");
    }

    #[actix_web::test]
    async fn follow_and_unfollow_round_trip_via_routes() {
        let env = env();
        let author = seed_user(&env.repo, "auth").await;
        let reader = seed_user(&env.repo, "reader").await;
        let app = app!(env);

        let follow_uri = "/profile/auth/follow/";
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(follow_uri)
                .cookie(session_cookie(&env.keys, &reader))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/profile/auth/");
        assert!(
            env.follow_service
                .is_following(reader.id, author.id)
                .await
                .unwrap()
        );

        // duplicate click keeps a single subscription
        test::call_service(
            &app,
            test::TestRequest::get()
                .uri(follow_uri)
                .cookie(session_cookie(&env.keys, &reader))
                .to_request(),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/profile/auth/unfollow/")
                .cookie(session_cookie(&env.keys, &reader))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert!(
            !env.follow_service
                .is_following(reader.id, author.id)
                .await
                .unwrap()
        );
    }

    #[actix_web::test]
    async fn index_serves_stale_html_until_cache_clear() {
        let env = env();
        let author = seed_user(&env.repo, "auth").await;
        seed_post(&env.repo, &author, None).await;
        let app = app!(env);

        let first = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let first_body = test::read_body(first).await;

        env.repo.delete_all_posts();

        let second = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let second_body = test::read_body(second).await;
        assert_eq!(first_body, second_body);

        env.cache.clear();
        let third = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let third_body = test::read_body(third).await;
        assert_ne!(first_body, third_body);
    }

    #[actix_web::test]
    async fn cached_index_is_scoped_to_the_session() {
        let env = env();
        let author = seed_user(&env.repo, "auth").await;
        seed_post(&env.repo, &author, None).await;
        let app = app!(env);

        // a logged-in visitor warms the cache
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/")
                .cookie(session_cookie(&env.keys, &author))
                .to_request(),
        )
        .await;
        let warmed = String::from_utf8_lossy(&test::read_body(resp).await).to_string();
        assert!(warmed.contains("Log out"));

        // an anonymous visitor must not receive the cached logged-in page
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let anon = String::from_utf8_lossy(&test::read_body(resp).await).to_string();
        assert!(!anon.contains("Log out"));
        assert!(anon.contains("Log in"));

        // nor does the anonymous entry bleed into another session
        let reader = seed_user(&env.repo, "reader").await;
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/")
                .cookie(session_cookie(&env.keys, &reader))
                .to_request(),
        )
        .await;
        let other = String::from_utf8_lossy(&test::read_body(resp).await).to_string();
        assert!(other.contains("/profile/reader/"));
        assert!(!other.contains("Log in"));
    }

    #[actix_web::test]
    async fn out_of_range_index_request_shares_the_last_pages_cache_entry() {
        let env = env();
        let author = seed_user(&env.repo, "auth").await;
        let mut oldest = None;
        for i in 0..13 {
            let post = seed_post(&env.repo, &author, None).await;
            if i == 0 {
                oldest = Some(post);
            }
        }
        let oldest = oldest.unwrap();
        let app = app!(env);

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/?page=2").to_request()).await;
        let warmed = test::read_body(resp).await;

        // a text change invisible through the cache proves the entry is shared
        PostRepository::update(&env.repo, oldest.id, "rewritten".into(), None, None)
            .await
            .unwrap();
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/?page=99").to_request()).await;
        let clamped = test::read_body(resp).await;
        assert_eq!(warmed, clamped);
    }

    #[actix_web::test]
    async fn feed_lists_only_followed_authors_posts() {
        let env = env();
        let author = seed_user(&env.repo, "auth").await;
        let follower = seed_user(&env.repo, "follower").await;
        let outsider = seed_user(&env.repo, "outsider").await;
        seed_post(&env.repo, &author, None).await;
        FollowRepository::insert(&env.repo, follower.id, author.id)
            .await
            .unwrap();
        let app = app!(env);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/follow/")
                .cookie(session_cookie(&env.keys, &follower))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("Тестовый пост"));

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/follow/")
                .cookie(session_cookie(&env.keys, &outsider))
                .to_request(),
        )
        .await;
        let body = test::read_body(resp).await;
        assert!(!String::from_utf8_lossy(&body).contains("Тестовый пост"));
    }
}
