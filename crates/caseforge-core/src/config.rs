use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

/// Top-level caseforge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub data_source: DataSourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    /// Raw key or `${ENV_VAR}` reference.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_max_tokens() -> u32 {
    20000
}
fn default_temperature() -> f32 {
    0.0
}

impl ModelConfig {
    /// Resolve the configured api key, expanding `${ENV_VAR}` references.
    pub fn resolve_api_key(&self) -> Option<String> {
        let raw = self.api_key.as_deref()?;
        if let Some(var) = raw.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            std::env::var(var).ok()
        } else {
            Some(raw.to_string())
        }
    }
}

/// Retry configuration for model requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    8000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Remote data-source (JSON-RPC tool endpoint) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    #[serde(default = "default_data_source_url")]
    pub base_url: String,
    #[serde(default = "default_data_source_timeout")]
    pub timeout_secs: u64,
}

fn default_data_source_url() -> String {
    "http://127.0.0.1:5000/mcp".to_string()
}
fn default_data_source_timeout() -> u64 {
    30
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_data_source_url(),
            timeout_secs: default_data_source_timeout(),
        }
    }
}

/// Where collection artifacts and lookup reports are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}
fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            uploads_dir: default_uploads_dir(),
        }
    }
}

/// Step budgets for the workflow executors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Budget for the outer run graph and the lookup pipeline.
    #[serde(default = "default_max_run_steps")]
    pub max_run_steps: usize,
    /// Budget for one search sub-workflow (bounds the tool-call loop).
    #[serde(default = "default_max_search_steps")]
    pub max_search_steps: usize,
}

fn default_max_run_steps() -> usize {
    16
}
fn default_max_search_steps() -> usize {
    24
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_run_steps: default_max_run_steps(),
            max_search_steps: default_max_search_steps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ForgeError::ConfigNotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| ForgeError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [model]
            model_id = "gpt-4o"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.model.provider, "openai");
        assert_eq!(cfg.model.temperature, 0.0);
        assert_eq!(cfg.workflow.max_search_steps, 24);
        assert_eq!(cfg.storage.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(cfg.gateway.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_api_key_env_reference() {
        std::env::set_var("CASEFORGE_TEST_KEY", "sk-from-env");
        let cfg = ModelConfig {
            provider: "openai".into(),
            model_id: "gpt-4o".into(),
            api_key: Some("${CASEFORGE_TEST_KEY}".into()),
            base_url: None,
            max_tokens: 1024,
            temperature: 0.0,
            retry: None,
        };
        assert_eq!(cfg.resolve_api_key().as_deref(), Some("sk-from-env"));
    }

    #[test]
    fn test_api_key_raw_value() {
        let cfg = ModelConfig {
            provider: "openai".into(),
            model_id: "gpt-4o".into(),
            api_key: Some("sk-raw".into()),
            base_url: None,
            max_tokens: 1024,
            temperature: 0.0,
            retry: None,
        };
        assert_eq!(cfg.resolve_api_key().as_deref(), Some("sk-raw"));
    }

    #[test]
    fn test_missing_config_file() {
        let err = AppConfig::load(Path::new("/nonexistent/caseforge.toml")).unwrap_err();
        assert!(matches!(err, ForgeError::ConfigNotFound(_)));
    }
}
