use std::sync::Arc;

use store::Database;

use super::{
    auth::TokenKeys, config::Config, database::init_database, mailer::Mailer,
    middleware::rate_limit::RateLimiter,
};

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub keys: TokenKeys,
    pub mailer: Mailer,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Arc<Self>> {
        let config = Config::load()?;
        let db = init_database(&config).await?;

        Self::with_database(config, db)
    }

    pub fn with_database(config: Config, db: Database) -> anyhow::Result<Arc<Self>> {
        let keys = TokenKeys::new(&config.jwt_secret, config.token_ttl_days);
        let mailer = Mailer::new(
            config.mail_relay_url.clone(),
            config.mail_from.clone(),
            config.mail_timeout,
        )?;
        let rate_limiter = RateLimiter::new(config.rate_limit_window, config.rate_limit_max);

        Ok(Arc::new(Self {
            config,
            db,
            keys,
            mailer,
            rate_limiter,
        }))
    }
}
