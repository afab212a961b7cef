use crate::assistant::PollPolicy;
use crate::orchestrator::AssistantSettings;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_PDF_DIR: &str = "./assets/";
const DEFAULT_STORE_NAME: &str = "document_store";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_INSTRUCTIONS: &str = "You are a helpful document assistant that answers questions based on the content of uploaded documents. \
Provide accurate information and cite your sources when possible. \
If you don't know the answer or can't find relevant information, acknowledge this honestly.";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Configuration was already installed in the global cache.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration for the document assistant.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Secret used to authenticate against the hosted API.
    pub openai_api_key: String,
    /// Base URL of the hosted API, including the version segment.
    pub openai_base_url: String,
    /// Directory scanned for documents to upload.
    pub pdf_dir: PathBuf,
    /// File extensions (without dot, lowercase) accepted for upload.
    pub accepted_extensions: Vec<String>,
    /// Display name of the vector store created at startup.
    pub vector_store_name: String,
    /// Model identifier used by the assistant.
    pub assistant_model: String,
    /// System instructions given to the assistant.
    pub assistant_instructions: String,
    /// Number of documents uploaded in parallel.
    pub upload_concurrency: usize,
    /// Initial delay between job status polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Ceiling for the backoff delay between polls, in milliseconds.
    pub poll_max_interval_ms: u64,
    /// Maximum time a single question may wait for its job, in seconds.
    pub poll_max_wait_secs: u64,
    /// Time an abandoned job gets to settle after cancellation, in seconds.
    pub poll_cancel_grace_secs: u64,
    /// Per-request timeout applied to the HTTP client, in seconds.
    pub http_timeout_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let upload_concurrency = parse_or(&optional, "UPLOAD_CONCURRENCY", 5usize)?;
        if upload_concurrency == 0 {
            return Err(ConfigError::InvalidValue("UPLOAD_CONCURRENCY".into()));
        }

        let poll_interval_ms = parse_or(&optional, "POLL_INTERVAL_MS", 1_000u64)?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue("POLL_INTERVAL_MS".into()));
        }

        let accepted_extensions = optional("ACCEPTED_EXTENSIONS")
            .map(|value| parse_extensions(&value))
            .unwrap_or_else(|| vec!["pdf".to_string()]);
        if accepted_extensions.is_empty() {
            return Err(ConfigError::InvalidValue("ACCEPTED_EXTENSIONS".into()));
        }

        Ok(Self {
            openai_api_key: optional("OPENAI_API_KEY")
                .ok_or_else(|| ConfigError::MissingVariable("OPENAI_API_KEY".into()))?,
            openai_base_url: optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            pdf_dir: optional("PDF_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PDF_DIR)),
            accepted_extensions,
            vector_store_name: optional("VECTOR_STORE_NAME")
                .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string()),
            assistant_model: optional("ASSISTANT_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            assistant_instructions: optional("ASSISTANT_INSTRUCTIONS")
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            upload_concurrency,
            poll_interval_ms,
            poll_max_interval_ms: parse_or(&optional, "POLL_MAX_INTERVAL_MS", 8_000)?,
            poll_max_wait_secs: parse_or(&optional, "POLL_MAX_WAIT_SECS", 300)?,
            poll_cancel_grace_secs: parse_or(&optional, "POLL_CANCEL_GRACE_SECS", 15)?,
            http_timeout_secs: parse_or(&optional, "HTTP_TIMEOUT_SECS", 120)?,
            server_port: optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Polling policy derived from the configured intervals.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_interval: Duration::from_millis(self.poll_max_interval_ms),
            max_wait: Duration::from_secs(self.poll_max_wait_secs),
            cancel_grace: Duration::from_secs(self.poll_cancel_grace_secs),
        }
    }

    /// Settings handed to the orchestrator; the core never reads the environment itself.
    pub fn assistant_settings(&self) -> AssistantSettings {
        AssistantSettings {
            store_name: self.vector_store_name.clone(),
            model: self.assistant_model.clone(),
            instructions: self.assistant_instructions.clone(),
            document_dir: self.pdf_dir.clone(),
            accepted_extensions: self.accepted_extensions.clone(),
            upload_concurrency: self.upload_concurrency,
            poll_policy: self.poll_policy(),
        }
    }
}

fn parse_or<F, T>(optional: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, if [`init_config`] has run.
pub fn get_config() -> Option<&'static Config> {
    CONFIG.get()
}

/// Load configuration from `.env` and the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        base_url = %config.openai_base_url,
        pdf_dir = %config.pdf_dir.display(),
        model = %config.assistant_model,
        upload_concurrency = config.upload_concurrency,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    get_config().ok_or(ConfigError::AlreadyInitialized)
}
