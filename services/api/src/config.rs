//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use url::Url;

const KAKAO_AUTHORIZE_URL: &str = "https://kauth.kakao.com/oauth/authorize";
const KAKAO_TOKEN_URL: &str = "https://kauth.kakao.com/oauth/token";
const KAKAO_USERME_URL: &str = "https://kapi.kakao.com/v2/user/me";

/// Shortest HMAC secret accepted for signing OAuth state tokens.
const MIN_STATE_SECRET_LEN: usize = 16;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which adapter writes the photo stories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoryBackend {
    Template,
    OpenAi,
}

/// Settings for the Kakao OAuth application.
#[derive(Clone, Debug)]
pub struct KakaoSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Url,
    pub authorize_url: Url,
    pub token_url: Url,
    pub userme_url: Url,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cors_origin: String,
    pub kakao: KakaoSettings,
    pub state_secret: String,
    pub state_ttl: Duration,
    pub samples_path: PathBuf,
    pub session_idle: Duration,
    pub secure_cookies: bool,
    pub post_login_redirect: String,
    pub max_upload_bytes: usize,
    pub story_backend: StoryBackend,
    pub openai_api_key: Option<String>,
    pub story_model: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };

        // --- Server Settings ---
        let bind_address = parse_value::<SocketAddr>("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:3000"))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = var_or("CORS_ALLOWED_ORIGIN", "http://localhost:3000");

        // --- Kakao OAuth Settings (no hardcoded credentials) ---
        let kakao = KakaoSettings {
            client_id: required("KAKAO_REST_API_KEY")?,
            client_secret: lookup("KAKAO_CLIENT_SECRET").filter(|v| !v.is_empty()),
            redirect_uri: parse_url("KAKAO_REDIRECT_URI", &required("KAKAO_REDIRECT_URI")?)?,
            authorize_url: parse_url("KAKAO_AUTHORIZE_URL", &var_or("KAKAO_AUTHORIZE_URL", KAKAO_AUTHORIZE_URL))?,
            token_url: parse_url("KAKAO_TOKEN_URL", &var_or("KAKAO_TOKEN_URL", KAKAO_TOKEN_URL))?,
            userme_url: parse_url("KAKAO_USERME_URL", &var_or("KAKAO_USERME_URL", KAKAO_USERME_URL))?,
        };

        let state_secret = required("KAKAO_STATE_SECRET")?;
        if state_secret.len() < MIN_STATE_SECRET_LEN {
            return Err(ConfigError::InvalidValue(
                "KAKAO_STATE_SECRET".to_string(),
                format!("must be at least {} bytes long", MIN_STATE_SECRET_LEN),
            ));
        }
        let state_ttl =
            Duration::from_secs(parse_value::<u64>("STATE_TTL_SECONDS", &var_or("STATE_TTL_SECONDS", "300"))?);

        // --- Workflow Settings ---
        let samples_path = PathBuf::from(var_or("SAMPLES_PATH", "./assets"));
        let session_idle_minutes =
            parse_value::<u64>("SESSION_IDLE_MINUTES", &var_or("SESSION_IDLE_MINUTES", "120"))?;
        let secure_cookies = parse_value::<bool>("SECURE_COOKIES", &var_or("SECURE_COOKIES", "true"))?;
        let post_login_redirect = var_or("POST_LOGIN_REDIRECT", "/");
        let max_upload_bytes =
            parse_value::<usize>("MAX_UPLOAD_BYTES", &var_or("MAX_UPLOAD_BYTES", "20971520"))?;

        // --- Story Backend ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty());
        let story_backend = match var_or("STORY_BACKEND", "template").to_lowercase().as_str() {
            "template" => StoryBackend::Template,
            "openai" if openai_api_key.is_some() => StoryBackend::OpenAi,
            "openai" => return Err(ConfigError::MissingVar("OPENAI_API_KEY".to_string())),
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORY_BACKEND".to_string(),
                    format!("'{}' is not one of: template, openai", other),
                ))
            }
        };
        let story_model = var_or("STORY_MODEL", "gpt-4o-mini");

        Ok(Self {
            bind_address,
            log_level,
            cors_origin,
            kakao,
            state_secret,
            state_ttl,
            samples_path,
            session_idle: Duration::from_secs(session_idle_minutes * 60),
            secure_cookies,
            post_login_redirect,
            max_upload_bytes,
            story_backend,
            openai_api_key,
            story_model,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    parse_value::<Url>(key, raw)
}
