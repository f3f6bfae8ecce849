use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::workflow::{WorkflowSettings, CONFIRMATION_DEPTH, MIN_BALANCE};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub chain_cli: String,

    pub confirmation_depth: u64,
    pub poll_interval: Duration,
    pub min_balance: f64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://registrar.db".to_string());
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let chain_cli = std::env::var("CHAIN_CLI").unwrap_or_else(|_| "namecoin-cli".to_string());

        let confirmation_depth = parse_or("CONFIRMATION_DEPTH", CONFIRMATION_DEPTH)?;
        let poll_secs: u64 = parse_or("POLL_INTERVAL_SECS", 60)?;
        let min_balance: f64 = parse_or("MIN_BALANCE", MIN_BALANCE)?;

        // fail fast, fail loud
        if poll_secs == 0 {
            bail!("POLL_INTERVAL_SECS must be at least 1");
        }
        if !min_balance.is_finite() || min_balance < 0.0 {
            bail!("MIN_BALANCE must be a non-negative number");
        }
        if !database_url.starts_with("sqlite:") {
            bail!("DATABASE_URL must start with sqlite:");
        }

        Ok(Self {
            database_url,
            bind_addr,
            chain_cli,
            confirmation_depth,
            poll_interval: Duration::from_secs(poll_secs),
            min_balance,
        })
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            confirmation_depth: self.confirmation_depth,
            poll_every: self.poll_interval,
            min_balance: self.min_balance,
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for env var {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
