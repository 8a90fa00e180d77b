use anyhow::Context;
use scholar_token::TokenMakerConfig;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub auth: AuthSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8080"
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Token lifetime, e.g. "15m" or "1h 30m".
    #[serde(default = "default_lifetime")]
    pub lifetime: String,

    /// Directory holding private.key / public.key. Created on first run.
    #[serde(default = "default_key_dir")]
    pub key_dir: PathBuf,

    #[serde(default = "default_issuer")]
    pub issuer: String,

    #[serde(default = "default_audience")]
    pub audience: String,
}

fn default_lifetime() -> String {
    "15m".to_string()
}

fn default_key_dir() -> PathBuf {
    PathBuf::from(scholar_token::maker::DEFAULT_KEY_DIRECTORY)
}

fn default_issuer() -> String {
    scholar_token::maker::DEFAULT_ISSUER.to_string()
}

fn default_audience() -> String {
    scholar_token::maker::DEFAULT_AUDIENCE.to_string()
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            lifetime: default_lifetime(),
            key_dir: default_key_dir(),
            issuer: default_issuer(),
            audience: default_audience(),
        }
    }
}

impl TokenConfig {
    pub fn to_maker_config(&self) -> anyhow::Result<TokenMakerConfig> {
        let lifetime = humantime::parse_duration(&self.lifetime)
            .with_context(|| format!("invalid token lifetime {:?}", self.lifetime))?;

        Ok(TokenMakerConfig::default()
            .with_token_lifetime(lifetime)
            .with_key_directory(&self.key_dir)
            .with_issuer(&self.issuer)
            .with_audience(&self.audience))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Cookie carrying the access token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Path prefixes inside authenticated groups that skip the token check.
    #[serde(default)]
    pub skip_paths: Vec<String>,

    /// Per-user request limit on authenticated routes. Disabled when absent.
    #[serde(default)]
    pub rate_limit: Option<RateLimitSettings>,
}

fn default_cookie_name() -> String {
    crate::middleware::auth::ACCESS_TOKEN_COOKIE.to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            skip_paths: Vec::new(),
            rate_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length, e.g. "1m".
    #[serde(default = "default_window")]
    pub window: String,
}

fn default_max_requests() -> u32 {
    60
}

fn default_window() -> String {
    "1m".to_string()
}

impl RateLimitSettings {
    pub fn window(&self) -> anyhow::Result<Duration> {
        humantime::parse_duration(&self.window)
            .with_context(|| format!("invalid rate limit window {:?}", self.window))
    }
}

/// Load the config file, falling back to defaults when it does not exist.
///
/// `SCHOLAR_BIND` overrides `server.bind`.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let path = config_path();
    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        parse_config(&raw).with_context(|| format!("failed to parse {}", path.display()))?
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        AppConfig::default()
    };

    if let Ok(bind) = env::var("SCHOLAR_BIND") {
        cfg.server.bind = bind;
    }

    Ok(cfg)
}

pub fn parse_config(raw: &str) -> anyhow::Result<AppConfig> {
    Ok(toml::from_str(raw)?)
}

fn config_path() -> PathBuf {
    if let Ok(p) = env::var("SCHOLAR_SERVER_CONFIG") {
        return PathBuf::from(p);
    }
    PathBuf::from("config.toml")
}
