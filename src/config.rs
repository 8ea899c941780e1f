use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::application::services::chunk_index_service::DEFAULT_COLLECTION_NAME;
use crate::infrastructure::vector_index::ChromaConfig;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { key: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database_url: String,
    pub database_pool_size: u32,
    pub chroma: ChromaConfig,
    pub collection_name: String,
    pub orphan_grace: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = PathBuf::from(lookup("DATA_DIR").unwrap_or_else(|| "./data".to_string()));
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| data_dir.join("rag.db").to_string_lossy().to_string());

        let chroma_defaults = ChromaConfig::default();
        let chroma = ChromaConfig {
            base_url: lookup("CHROMA_URL").unwrap_or(chroma_defaults.base_url),
            timeout_secs: parse_or(&lookup, "CHROMA_TIMEOUT_SECS", chroma_defaults.timeout_secs)?,
        };

        Ok(Self {
            database_pool_size: parse_or(&lookup, "DATABASE_POOL_SIZE", 10)?,
            collection_name: lookup("CHROMA_COLLECTION")
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            orphan_grace: Duration::from_secs(parse_or(&lookup, "ORPHAN_GRACE_SECS", 300)?),
            data_dir,
            database_url,
            chroma,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}
