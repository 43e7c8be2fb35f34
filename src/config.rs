use std::env;

use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub site_url: String,
    pub api_url: String,
    pub cod_surcharge: i64,
    pub gemini: Option<GeminiConfig>,
}

/// Credentials and model names for the hosted generative-AI provider.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub embedding_model: String,
}

pub const DEFAULT_COD_SURCHARGE: i64 = 50;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let site_url =
            env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let api_url =
            env::var("API_URL").unwrap_or_else(|_| format!("{}/api", site_url.trim_end_matches('/')));
        let cod_surcharge = env::var("COD_SURCHARGE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .unwrap_or(DEFAULT_COD_SURCHARGE);

        let gemini = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(|api_key| GeminiConfig {
                api_key: SecretString::from(api_key),
                model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
                embedding_model: env::var("GEMINI_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-004".to_string()),
            });

        if gemini.is_none() {
            tracing::warn!("GEMINI_API_KEY is not set, AI routes will be unavailable");
        }

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret: SecretString::from(jwt_secret),
            site_url,
            api_url,
            cod_surcharge,
            gemini,
        })
    }
}
