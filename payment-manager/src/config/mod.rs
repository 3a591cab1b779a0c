use crate::services::evidence::{DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_EVIDENCE_BYTES};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

pub const DEFAULT_MAX_REQUEST_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentManagerConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub store: StoreBackend,
    pub evidence: EvidenceConfig,
    pub max_request_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceConfig {
    pub max_bytes: usize,
    pub allowed_extensions: Vec<String>,
}

impl PaymentManagerConfig {
    pub fn load() -> Result<Self, AppError> {
        let mut common = core_config::Config::load()?;
        if let Ok(level) = env::var("LOG_LEVEL") {
            common.log_level = level;
        }
        if let Ok(endpoint) = env::var("OTLP_ENDPOINT") {
            common.otlp_endpoint = Some(endpoint).filter(|e| !e.is_empty());
        }

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let store: StoreBackend = get_env("STORE_BACKEND", Some("mongo"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let default_extensions = DEFAULT_ALLOWED_EXTENSIONS.join(",");
        let evidence = EvidenceConfig {
            max_bytes: parse_usize(
                "EVIDENCE_MAX_BYTES",
                &get_env(
                    "EVIDENCE_MAX_BYTES",
                    Some(&DEFAULT_MAX_EVIDENCE_BYTES.to_string()),
                    false,
                )?,
            )?,
            allowed_extensions: parse_extensions(&get_env(
                "EVIDENCE_ALLOWED_EXTENSIONS",
                Some(&default_extensions),
                false,
            )?)?,
        };

        let max_request_bytes = parse_usize(
            "MAX_REQUEST_BYTES",
            &get_env(
                "MAX_REQUEST_BYTES",
                Some(&DEFAULT_MAX_REQUEST_BYTES.to_string()),
                false,
            )?,
        )?;

        // The in-memory backend never touches Mongo, so its settings are optional.
        let mongo_required = is_prod && store == StoreBackend::Mongo;

        Ok(PaymentManagerConfig {
            common,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), mongo_required)?,
                database: get_env("MONGODB_DATABASE", Some("payment_manager"), mongo_required)?,
            },
            store,
            evidence,
            max_request_bytes,
        })
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, AppError> {
    value
        .trim()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{} is not a valid size: {}", key, e)))
}

/// Comma separated, normalized to lowercase with a leading dot.
fn parse_extensions(value: &str) -> Result<Vec<String>, AppError> {
    let extensions: Vec<String> = value
        .split(',')
        .map(|ext| ext.trim().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| {
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            }
        })
        .collect();

    if extensions.is_empty() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "EVIDENCE_ALLOWED_EXTENSIONS must name at least one extension"
        )));
    }
    Ok(extensions)
}
