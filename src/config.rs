use serde::Deserialize;
use std::{fs, path::Path};
use tracing::info;

use crate::error::{KabalaError, Result};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Owner whose aliases/catalog the CLI resolves against.
    #[serde(default = "default_owner_id")]
    pub owner_id: String,
}

fn default_db_path() -> String {
    "kabala.db".to_string()
}

fn default_owner_id() -> String {
    "local".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Google Gemini generateContent API.
    Gemini,
    /// No model calls; deterministic parsing only.
    Disabled,
}

#[derive(Debug, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_backend")]
    pub backend: LlmBackend,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    /// Env var holding the API key. Key material never lives in the file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend() -> LlmBackend {
    LlmBackend::Gemini
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_vision_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: default_base_url(),
            model: default_model(),
            vision_model: default_vision_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Resolved endpoint configuration ready to make API calls.
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    pub base_url: String,
    pub model: String,
    pub vision_model: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl LlmSection {
    /// Resolve the LLM config section into a concrete endpoint.
    ///
    /// Fails when the backend is disabled or the API key env var is unset;
    /// callers treat both as a fallback signal, not a hard error.
    pub fn resolve(&self) -> Result<ResolvedEndpoint> {
        match self.backend {
            LlmBackend::Disabled => Err(KabalaError::Config(
                "LLM backend disabled — deterministic parsing only".to_string(),
            )),
            LlmBackend::Gemini => {
                let api_key = std::env::var(&self.api_key_env).map_err(|_| {
                    KabalaError::Config(format!(
                        "{} env var required for the gemini backend",
                        self.api_key_env
                    ))
                })?;
                info!(url = %self.base_url, model = %self.model, "Using Gemini backend");
                Ok(ResolvedEndpoint {
                    base_url: self.base_url.clone(),
                    model: self.model.clone(),
                    vision_model: self.vision_model.clone(),
                    api_key,
                    timeout_secs: self.timeout_secs,
                })
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmSection::default(),
            db_path: default_db_path(),
            owner_id: default_owner_id(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| KabalaError::Config(e.to_string()))
    }

    /// Load from `path` if it exists, else fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(cfg) => cfg,
            Err(_) => {
                info!(path = %path.as_ref().display(), "No config file — using defaults");
                Self::default()
            }
        }
    }
}
