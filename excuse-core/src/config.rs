use std::path::PathBuf;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::ExcuseError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExcuseConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub proofs: ProofConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://excuses.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Settings for the hosted text-completion service. The API key is never read
/// from the config file; the server binary takes it from `GOOGLE_API_KEY`.
#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    pub model: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: crate::completion::DEFAULT_MODEL.to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProofConfig {
    /// Directory served under `/static`.
    pub static_root: PathBuf,
    /// Subdirectory of `static_root` that receives proof artifacts.
    pub dir: String,
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            static_root: PathBuf::from("static"),
            dir: "proofs".to_string(),
        }
    }
}

impl ProofConfig {
    pub fn output_dir(&self) -> PathBuf {
        self.static_root.join(&self.dir)
    }

    /// Root-relative URL prefix matching `output_dir`, e.g. `/static/proofs`.
    pub fn url_prefix(&self) -> String {
        format!("/static/{}", self.dir.trim_matches('/'))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    pub limit: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8770,
        }
    }
}

impl ExcuseConfig {
    /// Load from a TOML file, then apply `EXCUSE__SECTION__KEY` overrides.
    pub fn load(path: &str) -> Result<Self, ExcuseError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("EXCUSE").separator("__"))
            .build()?;
        Ok(s.try_deserialize()?)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ExcuseError> {
        let s = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(s.try_deserialize()?)
    }
}
