use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub secret_key: String,
    pub media_root: String,
    pub static_root: String,
    /// Lifetime of the cached index page, in seconds.
    pub index_cache_ttl: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PORT: {}", e))?;
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let secret_key =
            std::env::var("SECRET_KEY").map_err(|_| anyhow::anyhow!("SECRET_KEY must be set"))?;
        let media_root = std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".into());
        let static_root = std::env::var("STATIC_ROOT").unwrap_or_else(|_| "static".into());
        let index_cache_ttl = std::env::var("INDEX_CACHE_TTL")
            .unwrap_or_else(|_| "20".into())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid INDEX_CACHE_TTL: {}", e))?;

        Ok(Self {
            host,
            port,
            database_url,
            secret_key,
            media_root,
            static_root,
            index_cache_ttl,
        })
    }
}
