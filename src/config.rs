use std::path::PathBuf;

use thiserror::Error;

pub const MIN_JWT_SECRET_LEN: usize = 32;
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;
const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_MAX_VIDEO_BYTES: usize = 400 * 1024 * 1024;
const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least 32 characters long")]
    WeakSecret,
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaLimits {
    pub max_image_bytes: usize,
    pub max_video_bytes: usize,
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self { max_image_bytes: DEFAULT_MAX_IMAGE_BYTES, max_video_bytes: DEFAULT_MAX_VIDEO_BYTES }
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub api_base: String,
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub database_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub media_dir: PathBuf,
    pub media_limits: MediaLimits,
    pub s3: Option<S3Config>,
    pub frontend_url: String,
    pub bootstrap_admin_emails: Vec<String>,
    pub enable_hsts: bool,
    pub discord: Option<DiscordConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }

        let token_ttl_minutes = parse_or(get("TOKEN_TTL_MINUTES"), "TOKEN_TTL_MINUTES", DEFAULT_TOKEN_TTL_MINUTES)?;
        if token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid { name: "TOKEN_TTL_MINUTES", value: token_ttl_minutes.to_string() });
        }

        let media_limits = MediaLimits {
            max_image_bytes: parse_or(get("MEDIA_MAX_IMAGE_BYTES"), "MEDIA_MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?,
            max_video_bytes: parse_or(get("MEDIA_MAX_VIDEO_BYTES"), "MEDIA_MAX_VIDEO_BYTES", DEFAULT_MAX_VIDEO_BYTES)?,
        };

        let s3 = get("S3_ENDPOINT").map(|endpoint| S3Config {
            endpoint,
            bucket: get("S3_BUCKET").unwrap_or_else(|| "anywhere-media".into()),
            region: get("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
            access_key: get("S3_ACCESS_KEY").unwrap_or_default(),
            secret_key: get("S3_SECRET_KEY").unwrap_or_default(),
        });

        // Discord login is enabled only when both credentials are present.
        let discord = match (get("DISCORD_CLIENT_ID"), get("DISCORD_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(DiscordConfig {
                client_id,
                client_secret,
                redirect_uri: get("DISCORD_REDIRECT_URI")
                    .unwrap_or_else(|| "http://localhost:8080/api/account/oauth/discord/callback".into()),
                api_base: get("DISCORD_API_BASE").unwrap_or_else(|| DEFAULT_DISCORD_API_BASE.into()),
            }),
            _ => None,
        };

        let bootstrap_admin_emails = get("BOOTSTRAP_ADMIN_EMAILS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            jwt_secret,
            token_ttl_minutes,
            database_url: get("DATABASE_URL"),
            data_dir: get("ANYWHERE_DATA_DIR").map(PathBuf::from),
            media_dir: get("MEDIA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("media")),
            media_limits,
            s3,
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".into()),
            bootstrap_admin_emails,
            enable_hsts: get("ENABLE_HSTS").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false),
            discord,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}
