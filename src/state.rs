use std::sync::Arc;

use crate::{
    ai::gemini::GeminiClient,
    config::AppConfig,
    db::{DbPool, OrmConn},
    error::{AppError, AppResult},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub gemini: Option<GeminiClient>,
}

impl AppState {
    pub fn new(pool: DbPool, orm: OrmConn, config: AppConfig) -> anyhow::Result<Self> {
        let gemini = config.gemini.as_ref().map(GeminiClient::new).transpose()?;
        Ok(Self {
            pool,
            orm,
            config: Arc::new(config),
            gemini,
        })
    }

    pub fn gemini(&self) -> AppResult<&GeminiClient> {
        self.gemini
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("AI provider is not configured".into()))
    }
}
