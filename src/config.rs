use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub secure: bool,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub environment: String,
    pub jwt: JwtConfig,
    pub gemini: GeminiConfig,
    pub cookie: CookieConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let environment = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let production = environment == "production";

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "perfil".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "perfil-players".into()),
            ttl_hours: std::env::var("JWT_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24),
        };

        let gemini = GeminiConfig {
            api_key: std::env::var("GEMINI_API_KEY")?,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".into()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
        };

        // The cookie domain is only pinned in production.
        let cookie = CookieConfig {
            secure: production,
            domain: if production {
                std::env::var("COOKIE_DOMAIN").ok().filter(|d| !d.is_empty())
            } else {
                None
            },
        };

        Ok(Self {
            database_url,
            environment,
            jwt,
            gemini,
            cookie,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
