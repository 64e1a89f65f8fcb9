use analysis_core::AnalysisError;
use analysis_orchestrator::scanner::DEFAULT_PACING_MS;
use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use yahoo_client::{YahooSettings, DEFAULT_BASE_URL, DEFAULT_LOOKBACK_DAYS, DEFAULT_TIMEOUT_SECS};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Delay between two tickers of one scan
    pub pacing: Duration,
    pub yahoo: YahooSettings,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_addr: SocketAddr = get("SCANNER_BIND_ADDR", DEFAULT_BIND_ADDR)
            .parse()
            .context("SCANNER_BIND_ADDR must be host:port")?;
        let pacing_ms: u64 = get("SCANNER_PACING_MS", &DEFAULT_PACING_MS.to_string())
            .parse()
            .context("SCANNER_PACING_MS must be a whole number of milliseconds")?;
        let lookback_days: i64 = get("YAHOO_LOOKBACK_DAYS", &DEFAULT_LOOKBACK_DAYS.to_string())
            .parse()
            .context("YAHOO_LOOKBACK_DAYS must be an integer")?;
        let timeout_secs: u64 = get("YAHOO_TIMEOUT_SECS", &DEFAULT_TIMEOUT_SECS.to_string())
            .parse()
            .context("YAHOO_TIMEOUT_SECS must be an integer")?;
        let base_url = get("YAHOO_BASE_URL", DEFAULT_BASE_URL);

        let config = Self {
            bind_addr,
            pacing: Duration::from_millis(pacing_ms),
            yahoo: YahooSettings {
                base_url,
                lookback_days,
                timeout: Duration::from_secs(timeout_secs),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        if self.yahoo.lookback_days <= 0 {
            return Err(AnalysisError::Config("YAHOO_LOOKBACK_DAYS must be positive".to_string()));
        }
        if self.yahoo.timeout.is_zero() {
            return Err(AnalysisError::Config("YAHOO_TIMEOUT_SECS must be positive".to_string()));
        }
        if !self.yahoo.base_url.starts_with("http://") && !self.yahoo.base_url.starts_with("https://") {
            return Err(AnalysisError::Config(format!(
                "YAHOO_BASE_URL must be an http(s) URL, got {}",
                self.yahoo.base_url
            )));
        }
        Ok(())
    }
}
