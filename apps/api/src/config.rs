use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::analysis::pipeline::BatchConcurrency;

const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Application configuration loaded from environment variables.
/// Start-up fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_api_url: String,
    pub gemini_model: String,
    pub temperature: f32,
    pub batch_size: usize,
    pub batch_concurrency: BatchConcurrency,
    pub llm_timeout_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let batch_size: usize = parse_env("BATCH_SIZE", 35)?;
        if batch_size == 0 {
            bail!("BATCH_SIZE must be at least 1");
        }

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_api_url: std::env::var("GEMINI_API_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_API_URL.to_string()),
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            temperature: parse_env("GENERATION_TEMPERATURE", 0.1)?,
            batch_size,
            batch_concurrency: parse_env("BATCH_CONCURRENCY", BatchConcurrency::Concurrent)?,
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 120)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    let value =
        std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))?;
    if value.trim().is_empty() {
        bail!("Required environment variable '{key}' is empty");
    }
    Ok(value)
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_falls_back_to_default() {
        let value: usize = parse_env("GRADEBOOK_TEST_UNSET_VARIABLE", 35).unwrap();
        assert_eq!(value, 35);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("GRADEBOOK_TEST_BAD_PORT", "eighty");
        let result: Result<u16> = parse_env("GRADEBOOK_TEST_BAD_PORT", 8080);
        assert!(result.is_err());
    }

    #[test]
    fn test_require_env_rejects_blank_value() {
        std::env::set_var("GRADEBOOK_TEST_BLANK_KEY", "   ");
        assert!(require_env("GRADEBOOK_TEST_BLANK_KEY").is_err());
    }
}
