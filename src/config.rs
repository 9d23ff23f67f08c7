use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    /// Seconds between recovery sweeps.
    pub sweep_interval_secs: u64,
    /// Pending transactions older than this are force-completed by the sweep.
    pub sweep_max_age_hours: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,
            sweep_max_age_hours: env::var("SWEEP_MAX_AGE_HOURS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
        })
    }
}
