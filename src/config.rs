use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_PROFILE_IMAGE: &str =
    "https://isobarscience.com/wp-content/uploads/2020/09/default-profile-picture1.jpg";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub public_dir: PathBuf,
    pub default_image_url: String,
    pub upload_max_bytes: usize,
    pub secure_cookies: bool,
    pub session_idle_minutes: i64,
}

impl JwtConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.ttl_minutes > 0,
            "JWT_TTL_MINUTES must be positive, got {}",
            self.ttl_minutes
        );
        Ok(())
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "helpdesk".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "helpdesk-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
        };
        jwt.validate()?;
        Ok(Self {
            database_url,
            jwt,
            public_dir: std::env::var("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public")),
            default_image_url: std::env::var("DEFAULT_PROFILE_IMAGE")
                .unwrap_or_else(|_| DEFAULT_PROFILE_IMAGE.into()),
            upload_max_bytes: env_parse("UPLOAD_MAX_BYTES", 5 * 1024 * 1024),
            secure_cookies: env_parse("COOKIE_SECURE", false),
            session_idle_minutes: env_parse("SESSION_IDLE_MINUTES", 120),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
