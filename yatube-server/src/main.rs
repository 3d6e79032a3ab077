mod application;
mod data;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;
use std::time::Duration;

use actix_files as fs;
use actix_web::http::StatusCode;
use actix_web::middleware::ErrorHandlers;
use actix_web::{App, HttpServer, web};
use tera::Tera;

use application::auth_service::AuthService;
use application::follow_service::FollowService;
use application::post_service::PostService;
use data::comment_repository::PostgresCommentRepository;
use data::follow_repository::PostgresFollowRepository;
use data::group_repository::PostgresGroupRepository;
use data::post_repository::PostgresPostRepository;
use data::user_repository::PostgresUserRepository;
use infrastructure::cache::PageCache;
use infrastructure::config::AppConfig;
use infrastructure::database::{create_pool, run_migrations};
use infrastructure::logging::init_logging;
use infrastructure::media::MediaStore;
use infrastructure::security::SessionKeys;
use presentation::handlers::{about, auth, posts};
use presentation::middleware::{RequestTrace, rewrite_not_found};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logging();

    let config = AppConfig::from_env().expect("invalid configuration");
    let pool = create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");
    run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    let users = Arc::new(PostgresUserRepository::new(pool.clone()));
    let groups = Arc::new(PostgresGroupRepository::new(pool.clone()));
    let post_repo = Arc::new(PostgresPostRepository::new(pool.clone()));
    let comments = Arc::new(PostgresCommentRepository::new(pool.clone()));
    let follows = Arc::new(PostgresFollowRepository::new(pool.clone()));

    let keys = SessionKeys::new(config.secret_key.clone());
    let auth_service = AuthService::new(users.clone(), keys.clone());
    let post_service = PostService::new(post_repo, comments, groups, users.clone());
    let follow_service = FollowService::new(follows, users);

    let templates = Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))
        .expect("invalid templates");
    let cache = web::Data::new(PageCache::new(Duration::from_secs(config.index_cache_ttl)));
    let media = MediaStore::new(config.media_root.clone());

    let config_data = config.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(RequestTrace)
            .wrap(ErrorHandlers::new().handler(StatusCode::NOT_FOUND, rewrite_not_found))
            .app_data(web::Data::new(templates.clone()))
            .app_data(web::Data::new(keys.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(post_service.clone()))
            .app_data(web::Data::new(follow_service.clone()))
            .app_data(cache.clone())
            .app_data(web::Data::new(media.clone()))
            .service(fs::Files::new("/static", config_data.static_root.clone()))
            .service(fs::Files::new("/media", config_data.media_root.clone()))
            .service(auth::scope())
            .service(about::scope())
            .configure(posts::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
