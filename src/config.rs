//! Startup configuration resolved from the environment.
//!
//! Credentials are injected here and passed down as parameters; the core
//! never holds a literal key.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Environment variable carrying the model backend API key.
pub const MODEL_API_KEY_ENV: &str = "PULLSMITH_MODEL_API_KEY";

const DEFAULT_MODEL_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL_NAME: &str = "gemini-2.0-flash";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the generative-text backend.
    pub model_api_key: String,
    /// Base URL of the generative-text backend.
    pub model_base_url: String,
    /// Model identifier sent on every generate call.
    pub model_name: String,
    /// Base URL of the hosting platform API.
    pub github_api_url: String,
    /// Directory holding persisted repository records.
    pub state_dir: PathBuf,
    /// Scratch root for per-run working directories.
    pub work_dir: PathBuf,
}

impl Config {
    /// Resolve configuration from environment variables, applying defaults
    /// for everything except the model API key.
    pub fn from_env() -> Result<Self> {
        let model_api_key = std::env::var(MODEL_API_KEY_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("{} is not set", MODEL_API_KEY_ENV))?;

        let model_base_url = env_or("PULLSMITH_MODEL_BASE_URL", DEFAULT_MODEL_BASE_URL);
        let model_name = env_or("PULLSMITH_MODEL", DEFAULT_MODEL_NAME);
        let github_api_url = env_or("PULLSMITH_GITHUB_API_URL", DEFAULT_GITHUB_API_URL);

        let state_dir = match std::env::var("PULLSMITH_STATE_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .context("could not determine home directory")?
                .join(".pullsmith"),
        };

        let work_dir = std::env::temp_dir().join("pullsmith");

        Ok(Self {
            model_api_key,
            model_base_url,
            model_name,
            github_api_url,
            state_dir,
            work_dir,
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
