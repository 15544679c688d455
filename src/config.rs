use std::env;
use std::time::Duration;

use crate::models::Locale;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub access_token: Option<String>,
    pub request_timeout: Duration,
    pub coverage_debounce: Duration,
    pub checklist_autosave: Duration,
    pub locale: Locale,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("PHYSIOFLOW_API_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("PHYSIOFLOW_API_URL is not set"))?;

        let access_token = lookup("PHYSIOFLOW_ACCESS_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let request_timeout = lookup("PHYSIOFLOW_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let coverage_debounce = lookup("PHYSIOFLOW_COVERAGE_DEBOUNCE_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(300));

        let checklist_autosave = lookup("PHYSIOFLOW_CHECKLIST_AUTOSAVE_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(500));

        let locale = lookup("PHYSIOFLOW_LOCALE")
            .and_then(|s| Locale::parse(&s))
            .unwrap_or_default();

        Ok(Self {
            api_url,
            access_token,
            request_timeout,
            coverage_debounce,
            checklist_autosave,
            locale,
        })
    }

    /// Config pointing at `api_url` with every other setting at its default.
    pub fn for_url(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token: None,
            request_timeout: Duration::from_secs(30),
            coverage_debounce: Duration::from_millis(300),
            checklist_autosave: Duration::from_millis(500),
            locale: Locale::default(),
        }
    }
}
