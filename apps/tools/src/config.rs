use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use control_sync::RetryPolicy;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "formsync.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub lookup_base_url: String,
    pub lookup_timeout_ms: u64,
    pub render_queue_capacity: usize,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            retry_delay_ms: policy.retry_delay_ms,
            lookup_base_url: lookup_client::DEFAULT_BASE_URL.into(),
            lookup_timeout_ms: lookup_client::DEFAULT_TIMEOUT.as_millis() as u64,
            render_queue_capacity: 16,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
        }
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

/// Defaults, then the TOML file, then `APP__*` environment overrides.
///
/// An explicitly requested file must exist; the default file is optional.
pub fn load_settings(explicit: Option<&Path>) -> anyhow::Result<Settings> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut settings = match fs::read_to_string(&path) {
        Ok(raw) => toml::from_str::<Settings>(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?,
        Err(err) if explicit.is_none() && err.kind() == std::io::ErrorKind::NotFound => {
            Settings::default()
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

pub fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("APP__MAX_RETRIES") {
        settings.max_retries = parse_number("APP__MAX_RETRIES", &v)?;
    }
    if let Some(v) = lookup("APP__RETRY_DELAY_MS") {
        settings.retry_delay_ms = parse_number("APP__RETRY_DELAY_MS", &v)?;
    }
    if let Some(v) = lookup("APP__LOOKUP_BASE_URL") {
        settings.lookup_base_url = v;
    }
    if let Some(v) = lookup("APP__LOOKUP_TIMEOUT_MS") {
        settings.lookup_timeout_ms = parse_number("APP__LOOKUP_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = lookup("APP__RENDER_QUEUE_CAPACITY") {
        settings.render_queue_capacity = parse_number("APP__RENDER_QUEUE_CAPACITY", &v)?;
    }
    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
    Ok(())
}

fn parse_number<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
