use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GmailError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of most recent threads examined per run
    #[serde(default = "default_max_threads")]
    pub max_threads: u32,
    /// Optional Gmail search query restricting the listed threads
    #[serde(default)]
    pub query: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_threads: default_max_threads(),
            query: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_approved_emails")]
    pub approved_emails: PathBuf,
    #[serde(default = "default_email_column")]
    pub email_column: String,
    #[serde(default = "default_category_column")]
    pub category_column: String,
    /// Keyword list; keyword labeling is off when unset
    #[serde(default)]
    pub keywords: Option<PathBuf>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            approved_emails: default_approved_emails(),
            email_column: default_email_column(),
            category_column: default_category_column(),
            keywords: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_cleared")]
    pub cleared: String,
    #[serde(default = "default_cleared_with_category")]
    pub cleared_with_category: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            cleared: default_cleared(),
            cleared_with_category: default_cleared_with_category(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub dry_run: bool,
}

fn default_max_threads() -> u32 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_secs() -> u64 {
    3
}

fn default_jitter_min_ms() -> u64 {
    200
}

fn default_jitter_max_ms() -> u64 {
    500
}

fn default_approved_emails() -> PathBuf {
    PathBuf::from("approved_emails.csv")
}

fn default_email_column() -> String {
    "Email".to_string()
}

fn default_category_column() -> String {
    "City".to_string()
}

fn default_cleared() -> String {
    "Cleared".to_string()
}

fn default_cleared_with_category() -> String {
    "{cleared} + {category}".to_string()
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        let config = Self::read(path).await?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file without validating, for callers that adjust values first
    pub async fn read(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    GmailError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GmailError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scan.max_threads == 0 {
            return Err(GmailError::ConfigError(
                "scan.max_threads must be at least 1".to_string(),
            ));
        }
        if self.scan.max_threads > 500 {
            return Err(GmailError::ConfigError(
                "scan.max_threads cannot exceed 500 (Gmail threads.list page limit)".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(GmailError::ConfigError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts > 10 {
            return Err(GmailError::ConfigError(
                "retry.max_attempts cannot exceed 10".to_string(),
            ));
        }
        if self.retry.jitter_min_ms > self.retry.jitter_max_ms {
            return Err(GmailError::ConfigError(
                "retry.jitter_min_ms cannot be greater than retry.jitter_max_ms".to_string(),
            ));
        }

        if self.sources.approved_emails.as_os_str().is_empty() {
            return Err(GmailError::ConfigError(
                "sources.approved_emails cannot be empty".to_string(),
            ));
        }
        if self.sources.email_column.trim().is_empty() {
            return Err(GmailError::ConfigError(
                "sources.email_column cannot be empty".to_string(),
            ));
        }

        if self.labels.cleared.trim().is_empty() {
            return Err(GmailError::ConfigError(
                "labels.cleared cannot be empty".to_string(),
            ));
        }
        if !self.labels.cleared_with_category.contains("{category}") {
            return Err(GmailError::ConfigError(
                "labels.cleared_with_category must contain the {category} placeholder".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}
