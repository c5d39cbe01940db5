//! Runtime settings loaded from the environment.
//!
//! `main` reads an optional `.env` file through `dotenvy` before
//! [`Settings::from_env`] runs, so either source works.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Every wait the pipeline performs, grouped so tests can zero them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Base wait for per-model retries inside the generation client.
    pub llm_retry_base: Duration,
    /// Pause between consecutive batch calls.
    pub batch_cooldown: Duration,
    /// Pause after a batch loses the whole model chain.
    pub batch_outage_pause: Duration,
    /// Linear step applied before retrying after a backend outage.
    pub outage_backoff: Duration,
    /// Pause before retrying after an unexpected pipeline failure.
    pub exception_pause: Duration,
    /// Interval between sandbox health checks.
    pub health_poll_interval: Duration,
    /// Number of sandbox health checks before giving up.
    pub health_max_polls: u32,
    /// Pause before the single sandbox-open retry.
    pub sandbox_open_retry: Duration,
    /// Pause inserted every 30 fetched files during a deep scan.
    pub fetch_pause: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            llm_retry_base: Duration::from_secs(3),
            batch_cooldown: Duration::from_secs(3),
            batch_outage_pause: Duration::from_secs(10),
            outage_backoff: Duration::from_secs(15),
            exception_pause: Duration::from_secs(3),
            health_poll_interval: Duration::from_secs(3),
            health_max_polls: 20,
            sandbox_open_retry: Duration::from_secs(3),
            fetch_pause: Duration::from_secs(1),
        }
    }
}

impl Timings {
    /// No waiting at all; health checks still poll up to `health_max_polls` times.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            llm_retry_base: Duration::ZERO,
            batch_cooldown: Duration::ZERO,
            batch_outage_pause: Duration::ZERO,
            outage_backoff: Duration::ZERO,
            exception_pause: Duration::ZERO,
            health_poll_interval: Duration::ZERO,
            health_max_polls: 6,
            sandbox_open_retry: Duration::ZERO,
            fetch_pause: Duration::ZERO,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Key for the generation backend; checked when a call is made.
    pub gemini_api_key: Option<String>,
    /// Token for the repository host.
    pub github_token: Option<String>,
    /// Key for the remote sandbox; without it the sandbox is unavailable.
    pub sandbox_api_key: Option<String>,
    /// Generation backend base URL.
    pub llm_base_url: String,
    /// Repository host API base URL.
    pub github_api_url: String,
    /// Raw-content host base URL.
    pub github_raw_url: String,
    /// Sandbox control-plane base URL.
    pub sandbox_url: String,
    /// Domain under which sandbox ports are exposed.
    pub sandbox_domain: String,
    /// Model used for planning and analysis.
    pub planner_model: String,
    /// Model used for code generation.
    pub coder_model: String,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Directory holding cross-run memory logs.
    pub memory_dir: PathBuf,
    /// Leave the sandbox of a successful run running for its preview.
    pub keep_preview: bool,
    /// Wait policy.
    pub timings: Timings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            github_token: None,
            sandbox_api_key: None,
            llm_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            github_raw_url: "https://raw.githubusercontent.com".to_string(),
            sandbox_url: "https://api.e2b.dev".to_string(),
            sandbox_domain: "e2b.app".to_string(),
            planner_model: "gemini-2.0-flash".to_string(),
            coder_model: "gemini-3-flash-preview".to_string(),
            max_retries: 3,
            memory_dir: PathBuf::from(".revive/memory"),
            keep_preview: true,
            timings: Timings::default(),
        }
    }
}

impl Settings {
    /// Reads settings from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error string when a numeric or boolean variable cannot be parsed.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error string when a numeric or boolean variable cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let string_or = |key: &str, default: String| text(key).unwrap_or(default);

        Ok(Self {
            gemini_api_key: text("GEMINI_API_KEY"),
            github_token: text("GITHUB_TOKEN"),
            sandbox_api_key: text("SANDBOX_API_KEY"),
            llm_base_url: string_or("REVIVE_LLM_BASE_URL", defaults.llm_base_url),
            github_api_url: string_or("REVIVE_GITHUB_API_URL", defaults.github_api_url),
            github_raw_url: string_or("REVIVE_GITHUB_RAW_URL", defaults.github_raw_url),
            sandbox_url: string_or("REVIVE_SANDBOX_URL", defaults.sandbox_url),
            sandbox_domain: string_or("REVIVE_SANDBOX_DOMAIN", defaults.sandbox_domain),
            planner_model: string_or("REVIVE_PLANNER_MODEL", defaults.planner_model),
            coder_model: string_or("REVIVE_CODER_MODEL", defaults.coder_model),
            max_retries: parse_or(
                "REVIVE_MAX_RETRIES",
                text("REVIVE_MAX_RETRIES"),
                defaults.max_retries,
            )?,
            memory_dir: text("REVIVE_MEMORY_DIR").map_or(defaults.memory_dir, PathBuf::from),
            keep_preview: parse_bool(
                "REVIVE_KEEP_PREVIEW",
                text("REVIVE_KEEP_PREVIEW"),
                defaults.keep_preview,
            )?,
            timings: defaults.timings,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e| format!("Invalid value for {key} ({raw:?}): {e}")),
    }
}

fn parse_bool(key: &str, value: Option<String>, default: bool) -> Result<bool, String> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(format!("Invalid value for {key} ({other:?}): expected true or false")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.max_retries, 3);
        assert_eq!(s.coder_model, "gemini-3-flash-preview");
        assert!(s.gemini_api_key.is_none());
        assert!(s.keep_preview);
    }

    #[test]
    fn overrides_are_read() {
        let s = settings(&[
            ("GEMINI_API_KEY", "k"),
            ("REVIVE_MAX_RETRIES", "5"),
            ("REVIVE_KEEP_PREVIEW", "off"),
            ("REVIVE_CODER_MODEL", "gemini-1.5-pro"),
        ])
        .unwrap();
        assert_eq!(s.gemini_api_key.as_deref(), Some("k"));
        assert_eq!(s.max_retries, 5);
        assert!(!s.keep_preview);
        assert_eq!(s.coder_model, "gemini-1.5-pro");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let s = settings(&[("SANDBOX_API_KEY", "  ")]).unwrap();
        assert!(s.sandbox_api_key.is_none());
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = settings(&[("REVIVE_MAX_RETRIES", "many")]).unwrap_err();
        assert!(err.contains("REVIVE_MAX_RETRIES"));
    }
}
