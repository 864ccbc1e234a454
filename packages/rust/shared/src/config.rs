//! Application configuration for TradeScout.
//!
//! User config lives at `~/.tradescout/tradescout.toml`.
//! CLI flags override config file values, which override defaults.
//! Session limits additionally depend on the detected [`DeploymentProfile`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TradeScoutError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "tradescout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".tradescout";

/// Database file name inside the data directory.
const DB_FILE_NAME: &str = "tradescout.db";

/// Environment variables whose presence marks a Railway deployment.
const RAILWAY_ENV_VARS: &[&str] = &[
    "RAILWAY_ENVIRONMENT",
    "RAILWAY_PROJECT_ID",
    "RAILWAY_SERVICE_ID",
    "RAILWAY_REPLICA_ID",
];

// ---------------------------------------------------------------------------
// Config structs (matching tradescout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Groq LLM settings.
    #[serde(default)]
    pub groq: GroqConfig,

    /// Tavily search settings.
    #[serde(default)]
    pub tavily: TavilyConfig,

    /// Batch research tuning.
    #[serde(default)]
    pub research: ResearchConfig,

    /// Session limit overrides.
    #[serde(default)]
    pub session: SessionOverrides,

    /// Outreach sender identity.
    #[serde(default)]
    pub outreach: OutreachConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding the session database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.tradescout".into()
}

/// `[groq]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_groq_key_env")]
    pub api_key_env: String,

    /// Chat completion model.
    #[serde(default = "default_groq_model")]
    pub model: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_groq_base_url")]
    pub base_url: String,

    /// Sampling temperature for extraction calls.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion budget for extraction calls.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_groq_key_env(),
            model: default_groq_model(),
            base_url: default_groq_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_groq_key_env() -> String {
    "GROQ_API_KEY".into()
}
fn default_groq_model() -> String {
    "llama-3.3-70b-versatile".into()
}
fn default_groq_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    200
}

/// `[tavily]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TavilyConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_tavily_key_env")]
    pub api_key_env: String,

    /// API root.
    #[serde(default = "default_tavily_base_url")]
    pub base_url: String,

    /// Results requested per search.
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// `basic` or `advanced`.
    #[serde(default = "default_search_depth")]
    pub search_depth: String,
}

impl Default for TavilyConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_tavily_key_env(),
            base_url: default_tavily_base_url(),
            max_results: default_max_results(),
            search_depth: default_search_depth(),
        }
    }
}

fn default_tavily_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_tavily_base_url() -> String {
    "https://api.tavily.com".into()
}
fn default_max_results() -> u32 {
    5
}
fn default_search_depth() -> String {
    "advanced".into()
}

/// `[research]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Companies researched per run (1..=10).
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Pause between companies, in seconds (1.0..=5.0).
    #[serde(default = "default_search_delay")]
    pub search_delay_secs: f64,

    /// Add a government-registry search layer.
    #[serde(default = "default_true")]
    pub enable_government_search: bool,

    /// Add a timber-industry-directory search layer.
    #[serde(default = "default_true")]
    pub enable_industry_search: bool,

    /// Retries per API call on transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries, multiplied by the attempt number.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Reuse results for companies researched in earlier sessions.
    #[serde(default = "default_true")]
    pub cache_results: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            search_delay_secs: default_search_delay(),
            enable_government_search: true,
            enable_industry_search: true,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            cache_results: true,
        }
    }
}

impl ResearchConfig {
    /// Batch size clamped to the supported range.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, 10) as usize
    }

    /// Search delay clamped to the supported range. A non-finite value
    /// falls back to the default.
    pub fn effective_delay(&self) -> Duration {
        let secs = if self.search_delay_secs.is_finite() {
            self.search_delay_secs
        } else {
            default_search_delay()
        };
        Duration::from_secs_f64(secs.clamp(1.0, 5.0))
    }
}

fn default_true() -> bool {
    true
}
fn default_batch_size() -> u32 {
    3
}
fn default_search_delay() -> f64 {
    2.0
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff() -> u64 {
    500
}

/// `[session]` section. Unset values fall back to the deployment profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_timeout_hours: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size_mb: Option<u64>,
}

/// `[outreach]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachConfig {
    /// Substituted for `[Your Name]` in templates.
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            sender_name: default_sender_name(),
            sender_email: None,
        }
    }
}

fn default_sender_name() -> String {
    "TradeScout Team".into()
}

// ---------------------------------------------------------------------------
// Deployment profile
// ---------------------------------------------------------------------------

/// Where the tool is running; drives session limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentProfile {
    Cloud,
    Local,
}

impl DeploymentProfile {
    /// Detect the profile from the process environment.
    pub fn detect() -> Self {
        Self::detect_with(|name| std::env::var_os(name).is_some())
    }

    /// Detect the profile with a custom env lookup (for tests).
    pub fn detect_with(has_var: impl Fn(&str) -> bool) -> Self {
        if RAILWAY_ENV_VARS.iter().any(|v| has_var(v)) {
            Self::Cloud
        } else {
            Self::Local
        }
    }
}

/// Runtime session limits — merged from profile defaults + `[session]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Maximum concurrently stored sessions.
    pub max_sessions: usize,
    /// Idle time after which a session is removed.
    pub session_timeout: Duration,
    /// Largest dataset accepted, in bytes.
    pub max_file_size_bytes: u64,
}

impl SessionPolicy {
    /// Defaults for a deployment profile.
    pub fn for_profile(profile: DeploymentProfile) -> Self {
        match profile {
            DeploymentProfile::Cloud => Self {
                max_sessions: 5,
                session_timeout: Duration::from_secs(3600),
                max_file_size_bytes: 25 * 1024 * 1024,
            },
            DeploymentProfile::Local => Self {
                max_sessions: 20,
                session_timeout: Duration::from_secs(4 * 3600),
                max_file_size_bytes: 100 * 1024 * 1024,
            },
        }
    }

    /// Profile defaults with config overrides applied.
    pub fn resolve(profile: DeploymentProfile, overrides: &SessionOverrides) -> Self {
        let mut policy = Self::for_profile(profile);
        if let Some(max) = overrides.max_sessions {
            policy.max_sessions = max.max(1);
        }
        if let Some(hours) = overrides.session_timeout_hours {
            policy.session_timeout = Duration::from_secs(hours.saturating_mul(3600));
        }
        if let Some(mb) = overrides.max_file_size_mb {
            policy.max_file_size_bytes = mb.saturating_mul(1024 * 1024);
        }
        policy
    }
}

/// Deployment facts reported by the `health` command.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentInfo {
    pub profile: DeploymentProfile,
    pub environment: String,
    pub memory_limit_mb: u64,
    pub storage_strategy: &'static str,
    pub max_sessions: usize,
    pub session_timeout_hours: u64,
    pub max_file_size_mb: u64,
    pub enable_debug: bool,
}

impl DeploymentInfo {
    /// Collect deployment facts from the environment and config.
    pub fn collect(config: &AppConfig) -> Self {
        let profile = DeploymentProfile::detect();
        let policy = SessionPolicy::resolve(profile, &config.session);
        let (environment, memory_limit_mb) = match profile {
            DeploymentProfile::Cloud => (
                std::env::var("RAILWAY_ENVIRONMENT").unwrap_or_else(|_| "production".into()),
                std::env::var("MEMORY_LIMIT_MB")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(256),
            ),
            DeploymentProfile::Local => ("local".to_string(), 1024),
        };

        Self {
            profile,
            enable_debug: environment != "production",
            environment,
            memory_limit_mb,
            storage_strategy: match profile {
                DeploymentProfile::Cloud => "memory",
                DeploymentProfile::Local => "disk",
            },
            max_sessions: policy.max_sessions,
            session_timeout_hours: policy.session_timeout.as_secs() / 3600,
            max_file_size_mb: policy.max_file_size_bytes / (1024 * 1024),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.tradescout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TradeScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.tradescout/tradescout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TradeScoutError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        TradeScoutError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TradeScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TradeScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TradeScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject malformed API base URLs and non-finite numbers early.
fn validate_config(config: &AppConfig) -> Result<()> {
    if !config.research.search_delay_secs.is_finite() {
        return Err(TradeScoutError::config(format!(
            "research.search_delay_secs must be a finite number, got {}",
            config.research.search_delay_secs
        )));
    }
    for (name, base) in [
        ("groq.base_url", &config.groq.base_url),
        ("tavily.base_url", &config.tavily.base_url),
    ] {
        url::Url::parse(base)
            .map_err(|e| TradeScoutError::config(format!("{name} '{base}' is invalid: {e}")))?;
    }
    Ok(())
}

/// Resolve the database path, expanding a leading `~`.
pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    Ok(expand_home(&config.defaults.data_dir)?.join(DB_FILE_NAME))
}

fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| TradeScoutError::config("could not determine home directory"))?;
            Ok(home.join(rest.trim_start_matches(['/', '\\'])))
        }
        None => Ok(PathBuf::from(path)),
    }
}

/// Read a non-empty API key from the env var named in config.
pub fn api_key(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

/// Check that both research API keys are set and non-empty.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    let missing: Vec<&str> = [
        config.tavily.api_key_env.as_str(),
        config.groq.api_key_env.as_str(),
    ]
    .into_iter()
    .filter(|var| api_key(var).is_none())
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(TradeScoutError::config(format!(
            "API key not found. Set {}.\n\
             Tavily keys: https://tavily.com · Groq keys: https://console.groq.com",
            missing.join(" and ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("GROQ_API_KEY"));
        assert!(toml_str.contains("TAVILY_API_KEY"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[research]
batch_size = 25
search_delay_secs = 0.2

[session]
max_sessions = 3
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.research.effective_batch_size(), 10);
        assert_eq!(config.research.effective_delay(), Duration::from_secs(1));
        assert!(config.research.enable_government_search);
        assert_eq!(config.groq.model, "llama-3.3-70b-versatile");
        assert_eq!(config.session.max_sessions, Some(3));
    }

    #[test]
    fn profile_detection() {
        let cloud = DeploymentProfile::detect_with(|v| v == "RAILWAY_SERVICE_ID");
        assert_eq!(cloud, DeploymentProfile::Cloud);
        let local = DeploymentProfile::detect_with(|_| false);
        assert_eq!(local, DeploymentProfile::Local);
    }

    #[test]
    fn policy_overrides_apply() {
        let overrides = SessionOverrides {
            max_sessions: Some(2),
            session_timeout_hours: None,
            max_file_size_mb: Some(1),
        };
        let policy = SessionPolicy::resolve(DeploymentProfile::Cloud, &overrides);
        assert_eq!(policy.max_sessions, 2);
        assert_eq!(policy.session_timeout, Duration::from_secs(3600));
        assert_eq!(policy.max_file_size_bytes, 1024 * 1024);
    }

    #[test]
    fn huge_overrides_saturate() {
        let overrides = SessionOverrides {
            max_sessions: None,
            session_timeout_hours: Some(u64::MAX / 1000),
            max_file_size_mb: Some(u64::MAX),
        };
        let policy = SessionPolicy::resolve(DeploymentProfile::Local, &overrides);
        assert_eq!(policy.session_timeout, Duration::from_secs(u64::MAX));
        assert_eq!(policy.max_file_size_bytes, u64::MAX);
    }

    #[test]
    fn batch_size_clamps_to_range() {
        let mut research = ResearchConfig::default();
        for (raw, expected) in [(0, 1), (1, 1), (10, 10), (11, 10)] {
            research.batch_size = raw;
            assert_eq!(research.effective_batch_size(), expected, "batch_size = {raw}");
        }
    }

    #[test]
    fn search_delay_clamps_to_range() {
        let mut research = ResearchConfig::default();
        for (raw, expected) in [(0.2, 1.0), (1.0, 1.0), (3.5, 3.5), (5.0, 5.0), (9.0, 5.0)] {
            research.search_delay_secs = raw;
            assert_eq!(
                research.effective_delay(),
                Duration::from_secs_f64(expected),
                "search_delay_secs = {raw}"
            );
        }
        for raw in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            research.search_delay_secs = raw;
            assert_eq!(research.effective_delay(), Duration::from_secs(2));
        }
    }

    #[test]
    fn nan_search_delay_rejected() {
        let config: AppConfig = toml::from_str("[research]\nsearch_delay_secs = nan\n").expect("parse");
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("search_delay_secs"));
        assert_eq!(config.research.effective_delay(), Duration::from_secs(2));
    }

    #[test]
    fn invalid_base_url_rejected() {
        let dir = std::env::temp_dir().join(format!("ts_cfg_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tradescout.toml");
        std::fs::write(&path, "[groq]\nbase_url = \"not a url\"\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("groq.base_url"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn database_path_joins_data_dir() {
        let mut config = AppConfig::default();
        config.defaults.data_dir = "/tmp/tradescout-data".into();
        let path = database_path(&config).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/tradescout-data/tradescout.db"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Unique env var names to avoid interfering with other tests
        config.groq.api_key_env = "TS_TEST_NONEXISTENT_GROQ_12345".into();
        config.tavily.api_key_env = "TS_TEST_NONEXISTENT_TAVILY_12345".into();
        let result = validate_api_keys(&config);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("API key not found"));
        assert!(msg.contains("TS_TEST_NONEXISTENT_GROQ_12345"));
    }
}
