use std::path::{Path, PathBuf};
use std::time::Duration;

use genmedia_client::config::{
    DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_TEXT_MODEL,
};
use genmedia_client::{ClientConfig, RetryPolicy};
use serde::Deserialize;
use tracing::info;

use crate::credential::FileCredentialStore;
use crate::error::{Result, StudioError};
use crate::types::VIDEO_MODELS;

/// Optional TOML overrides. Secrets never live here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    pub base_url: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    pub interval_secs: Option<u64>,
    /// 0 waits forever.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub base_millis: Option<u64>,
    pub max_jitter_millis: Option<u64>,
}

pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        StudioError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
    })?;
    toml::from_str(&content).map_err(|e| {
        StudioError::InvalidConfig(format!("failed to parse {}: {e}", path.display()))
    })
}

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub video_model: String,
    pub credentials_path: Option<PathBuf>,
    pub poll_interval: Duration,
    pub poll_timeout: Option<Duration>,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: VIDEO_MODELS[0].0.to_string(),
            credentials_path: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: Some(DEFAULT_POLL_TIMEOUT),
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl StudioConfig {
    /// `.env`, then the TOML file named by `config_path` or `MASCOT_CONFIG`,
    /// then environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = config_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("MASCOT_CONFIG").ok().map(PathBuf::from));
        let file = path.as_deref().map(load_file_config).transpose()?;

        Ok(Self::from_parts(file.unwrap_or_default(), |name| {
            std::env::var(name).ok()
        }))
    }

    /// Env overrides file, file overrides defaults.
    pub fn from_parts(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let mut retry = defaults.retry;
        if let Some(n) = file.retry.max_attempts {
            retry.max_attempts = n;
        }
        if let Some(ms) = file.retry.base_millis {
            retry.base = Duration::from_millis(ms);
        }
        if let Some(ms) = file.retry.max_jitter_millis {
            retry.max_jitter = Duration::from_millis(ms);
        }

        let poll_timeout = match file.polling.timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.poll_timeout,
        };

        Self {
            base_url: env("GEMINI_BASE_URL")
                .or(file.models.base_url)
                .unwrap_or(defaults.base_url),
            text_model: env("MASCOT_TEXT_MODEL")
                .or(file.models.text)
                .unwrap_or(defaults.text_model),
            image_model: env("MASCOT_IMAGE_MODEL")
                .or(file.models.image)
                .unwrap_or(defaults.image_model),
            video_model: env("MASCOT_VIDEO_MODEL")
                .or(file.models.video)
                .unwrap_or(defaults.video_model),
            credentials_path: env("MASCOT_CREDENTIALS_PATH").map(PathBuf::from),
            poll_interval: file
                .polling
                .interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            poll_timeout,
            retry,
            request_timeout: defaults.request_timeout,
        }
    }

    pub fn client_config(&self, api_key: &str) -> ClientConfig {
        ClientConfig::builder()
            .api_key(api_key)
            .base_url(self.base_url.clone())
            .text_model(self.text_model.clone())
            .image_model(self.image_model.clone())
            .retry(self.retry)
            .poll_interval(self.poll_interval)
            .poll_timeout(self.poll_timeout)
            .request_timeout(self.request_timeout)
            .build()
    }

    pub fn credential_store(&self) -> Result<FileCredentialStore> {
        match &self.credentials_path {
            Some(path) => Ok(FileCredentialStore::new(path)),
            None => FileCredentialStore::default_path().map(FileCredentialStore::new),
        }
    }

    pub fn log_summary(&self) {
        info!("Config loaded:");
        info!("  GEMINI_BASE_URL: {}", self.base_url);
        info!("  MASCOT_TEXT_MODEL: {}", self.text_model);
        info!("  MASCOT_IMAGE_MODEL: {}", self.image_model);
        info!("  MASCOT_VIDEO_MODEL: {}", self.video_model);
        info!(
            "  MASCOT_CREDENTIALS_PATH: {}",
            self.credentials_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<default>".to_string())
        );
    }
}

/// First five characters and the length. Never log a secret raw.
pub fn preview(secret: &str) -> String {
    let head: String = secret.chars().take(5).collect();
    format!("{head}...({} chars)", secret.chars().count())
}
