use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    /// Read configuration from the environment once at startup.
    /// `DATABASE_URL` is required; everything else has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("APP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(5000),
            database_url,
            // bcrypt only accepts costs in 4..=31; anything absent,
            // non-numeric, or out of range falls back to the default.
            bcrypt_cost: std::env::var("BCRYPT_COST")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|cost| (4..=31).contains(cost))
                .unwrap_or(10),
        })
    }
}
