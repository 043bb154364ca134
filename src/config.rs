use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::prompts::PromptConfig;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("Unknown vector store backend '{0}' (expected 'qdrant' or 'memory')")]
    UnknownBackend(String),
    #[error("Failed to load prompts from {path}: {reason}")]
    Prompts { path: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct OpenAISettings {
    pub api_key: String,
    pub api_base: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub max_concurrent_requests: usize,
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Qdrant,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qdrant" => Ok(StoreBackend::Qdrant),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub collection: String,
    pub dimensions: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub openai: OpenAISettings,
    pub store: StoreSettings,
    pub definitions_dir: PathBuf,
    pub prompts: PromptConfig,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // blank values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server = ServerSettings {
            host: get("PAYSLIP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PAYSLIP_PORT", 8080)?,
            max_upload_bytes: parse_or(&get, "PAYSLIP_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            max_concurrent_requests: parse_or(&get, "PAYSLIP_MAX_CONCURRENT_REQUESTS", 16)?,
        };

        let openai = OpenAISettings {
            api_key: get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?,
            api_base: get("OPENAI_API_BASE"),
            chat_model: get("OPENAI_CHAT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            embedding_model: get("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            temperature: parse_or(&get, "OPENAI_TEMPERATURE", 0.0)?,
        };

        let store = StoreSettings {
            backend: match get("VECTOR_STORE") {
                Some(value) => value.parse()?,
                None => StoreBackend::Qdrant,
            },
            qdrant_url: get("QDRANT_URL").unwrap_or_else(|| "http://localhost:6334".to_string()),
            qdrant_api_key: get("QDRANT_API_KEY"),
            collection: get("QDRANT_COLLECTION").unwrap_or_else(|| "payslips".to_string()),
            dimensions: parse_or(&get, "EMBEDDING_DIMENSIONS", 1536)?,
        };

        let prompts = match get("PAYSLIP_PROMPTS_FILE") {
            Some(path) => PromptConfig::from_file(&path)?,
            None => PromptConfig::default(),
        };

        Ok(Self {
            server,
            openai,
            store,
            definitions_dir: PathBuf::from(
                get("DEFINITIONS_DIR").unwrap_or_else(|| "rag/definitions".to_string()),
            ),
            prompts,
        })
    }
}

fn parse_or<T, F>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
