use crate::config::AppConfig;
use crate::middleware::rate_limit::UserRateLimiter;
use anyhow::Context;
use scholar_token::TokenMaker;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub cfg: AppConfig,
    pub token_maker: Arc<TokenMaker>,
    /// Present when `[auth.rate_limit]` is configured.
    pub rate_limiter: Option<Arc<UserRateLimiter>>,
}

impl AppState {
    /// Build state from config, creating the signing keys on first run.
    pub fn init(cfg: &AppConfig) -> anyhow::Result<Self> {
        let maker_config = cfg.token.to_maker_config()?;
        let token_maker = TokenMaker::new(maker_config).with_context(|| {
            format!(
                "failed to initialise token maker from {}",
                cfg.token.key_dir.display()
            )
        })?;

        Self::from_parts(cfg.clone(), Arc::new(token_maker))
    }

    pub fn from_parts(cfg: AppConfig, token_maker: Arc<TokenMaker>) -> anyhow::Result<Self> {
        let rate_limiter = match &cfg.auth.rate_limit {
            Some(limit) => Some(Arc::new(UserRateLimiter::new(
                limit.max_requests,
                limit.window()?,
            ))),
            None => None,
        };

        Ok(Self {
            cfg,
            token_maker,
            rate_limiter,
        })
    }
}
