use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub session_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl SmtpConfig {
    /// Returns `None` when `SMTP_HOST` is unset, signalling that outbound
    /// email is not configured.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            host,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(587),
            from: std::env::var("SMTP_FROM").unwrap_or_else(|_| "no-reply@profile.com".into()),
            user: std::env::var("SMTP_USER").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub smtp: Option<SmtpConfig>,
    /// Frontend origin used to build absolute links in emails.
    pub base_url: String,
    /// The seeded admin account that must never be deleted.
    pub root_admin_email: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "portfolio".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "portfolio-users".into()),
            session_ttl_minutes: std::env::var("JWT_SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 30),
            reset_ttl_minutes: std::env::var("JWT_RESET_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(10),
        };
        Ok(Self {
            database_url,
            jwt,
            smtp: SmtpConfig::from_env(),
            base_url: std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:5173".into()),
            root_admin_email: std::env::var("ROOT_ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@example.com".into()),
        })
    }
}
