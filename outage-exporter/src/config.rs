use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

use crate::sources::{RetryPolicy, ThematicLevel};

const DEFAULT_CONFIG_PATH: &str = "outage-config.toml";

const DTE_STATE_URL: &str = "https://kubra.io/stormcenter/api/v1/stormcenters/4fbb3ad3-e01d-4d71-9575-d453769c1171/views/8ed2824a-bd92-474e-a7c4-848b812b7f9b/currentState?preview=false";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Kubra,
    HttpJson,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            user_agent: concat!("dte-outage-exporter/", env!("CARGO_PKG_VERSION")).to_string(),
            max_attempts: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_backoff_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub metric_namespace: String,
    /// `http_json`: document URL.
    pub url: Option<String>,
    /// `http_json`: tag key for areas in the document.
    pub level: String,
    /// `kubra`: storm center currentState URL.
    pub state_url: String,
    /// `kubra`: host that serves the interval data files.
    pub base_url: String,
    /// `kubra`: thematic layers to fetch.
    pub levels: Vec<ThematicLevel>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Kubra,
            metric_namespace: "dte.outage".to_string(),
            url: None,
            level: "area".to_string(),
            state_url: DTE_STATE_URL.to_string(),
            base_url: "https://kubra.io".to_string(),
            // thematic-1 is by county, thematic-2 by zip code
            levels: vec![
                ThematicLevel::new("county", "thematic-1"),
                ThematicLevel::new("zip_code", "thematic-2"),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatadogConfig {
    pub site: String,
    pub api_key_env: String,
    pub app_key_env: String,
    pub resource_name: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub service_check: bool,
    pub service_check_name: String,
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            site: "https://api.datadoghq.com".to_string(),
            api_key_env: "DD_API_KEY".to_string(),
            app_key_env: "DD_APP_KEY".to_string(),
            resource_name: "dte-outage".to_string(),
            batch_size: 500,
            max_retries: 2,
            retry_backoff_ms: 500,
            service_check: true,
            service_check_name: "dte.outage.ok".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Repeat the pipeline every `interval_secs`. Unset means run once and exit.
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub source: SourceConfig,
    pub datadog: DatadogConfig,
    pub schedule: ScheduleConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Load from `OUTAGE_CONFIG`, else `outage-config.toml` if present, else defaults.
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let cfg = match env::var("OUTAGE_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH)?,
            Err(_) => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {path}: {e}"))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self.source.kind {
            SourceKind::HttpJson if self.source.url.as_deref().map_or(true, |u| u.trim().is_empty()) => {
                anyhow::bail!("source.url is required when source.kind = \"http_json\"")
            }
            SourceKind::Kubra if self.source.levels.is_empty() => {
                anyhow::bail!("source.levels must not be empty when source.kind = \"kubra\"")
            }
            _ => {}
        }
        if self.datadog.batch_size == 0 {
            anyhow::bail!("datadog.batch_size must be greater than zero");
        }
        if self.schedule.interval_secs == Some(0) {
            anyhow::bail!("schedule.interval_secs must be greater than zero");
        }
        Ok(())
    }
}
