//! Operator configuration from environment variables.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::TimeDelta;
use secrecy::SecretString;

use crate::upgrade::{EngineSettings, RemovalBackoff};

pub const DEFAULT_OCM_URL: &str = "https://api.openshift.com";

#[derive(Debug, Clone)]
pub struct Config {
    // OCM connection
    pub ocm_url: String,
    pub ocm_token: SecretString,
    pub request_timeout: Duration,

    // Upgrade engine
    pub start_delay: TimeDelta,
    pub reconcile_timeout: Duration,

    // Servers
    pub health_port: u16,
    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ocm_token = get("OCM_TOKEN")
            .map(SecretString::from)
            .ok_or_else(|| anyhow!("Environment variable OCM_TOKEN is required but not set"))?;
        let ocm_url = get("OCM_URL").unwrap_or_else(|| DEFAULT_OCM_URL.to_string());
        if !ocm_url.starts_with("http://") && !ocm_url.starts_with("https://") {
            return Err(anyhow!("OCM_URL must be an http(s) URL, got '{}'", ocm_url));
        }

        let request_timeout_secs: u64 = parse_or(&get, "OCM_REQUEST_TIMEOUT_SECONDS", 30)?;
        let start_delay_minutes: i64 = parse_or(&get, "UPGRADE_START_DELAY_MINUTES", 10)?;
        if start_delay_minutes < 1 {
            return Err(anyhow!("UPGRADE_START_DELAY_MINUTES must be at least 1"));
        }
        let reconcile_timeout_secs: u64 = parse_or(&get, "RECONCILE_TIMEOUT_SECONDS", 300)?;

        Ok(Self {
            ocm_url,
            ocm_token,
            request_timeout: Duration::from_secs(request_timeout_secs),
            start_delay: TimeDelta::try_minutes(start_delay_minutes)
                .ok_or_else(|| anyhow!("UPGRADE_START_DELAY_MINUTES is out of range"))?,
            reconcile_timeout: Duration::from_secs(reconcile_timeout_secs),
            health_port: parse_or(&get, "HEALTH_PORT", 8080)?,
            metrics_port: parse_or(&get, "METRICS_PORT", 8081)?,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            start_delay: self.start_delay,
            removal_backoff: RemovalBackoff::default(),
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw))
    })
}
