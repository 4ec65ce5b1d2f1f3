//! Configuration management for the task agent.
//!
//! Configuration can be set via environment variables:
//! - `LLM_API_KEY` - Required (falls back to `GROQ_API_KEY`). API key for the model provider.
//! - `LLM_BASE_URL` - Optional. OpenAI-compatible base URL. Defaults to Groq.
//! - `DEFAULT_MODEL` - Optional. Model identifier. Defaults to `openai/gpt-oss-120b`.
//! - `SANDBOX_DIR` - Optional. Directory the file tools are confined to. Defaults to `./sandbox`.
//! - `DATABASE_PATH` - Optional. SQLite file for `query_database`. Defaults to `./data/demo.db`, outside the sandbox.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `10`.
//! - `MAX_TOKENS` - Optional. Output token cap per model call. Defaults to `1000`.
//! - `TOOL_TIMEOUT_SECS` - Optional. Per tool call timeout. Defaults to `30`.
//! - `WORKER_COUNT` - Optional. Concurrent task workers. Defaults to `4`.
//! - `TASK_QUEUE_CAPACITY` - Optional. Pending tasks accepted before rejecting. Defaults to `64`.
//! - `PARALLEL_TOOL_CALLS` - Optional. Run a round's tool calls concurrently. Defaults to `false`.
//! - `GEOCODING_URL` / `FORECAST_URL` - Optional. Weather service endpoints.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::llm::DEFAULT_BASE_URL;
use crate::tools::WeatherEndpoints;

/// Kept out of the sandbox so the file tools never see it.
pub const DEFAULT_DATABASE_PATH: &str = "data/demo.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model provider API key
    pub api_key: String,

    /// OpenAI-compatible base URL (without `/chat/completions`)
    pub llm_base_url: String,

    /// Model identifier
    pub default_model: String,

    /// Sandbox directory for file tools
    pub sandbox_dir: PathBuf,

    /// SQLite database for the query tool
    pub database_path: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Output token cap per model call
    pub max_tokens: u32,

    /// Per tool call timeout
    pub tool_timeout: Duration,

    /// Number of task workers
    pub worker_count: usize,

    /// Bounded task queue size
    pub queue_capacity: usize,

    /// Execute a round's tool calls concurrently
    pub parallel_tool_calls: bool,

    /// Weather service endpoints
    pub weather: WeatherEndpoints,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if neither `LLM_API_KEY` nor
    /// `GROQ_API_KEY` is set, and `ConfigError::InvalidValue` for values that
    /// fail to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("GROQ_API_KEY"))
            .map_err(|_| ConfigError::MissingEnvVar("LLM_API_KEY".to_string()))?;

        let sandbox_dir = std::env::var("SANDBOX_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("sandbox"));

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATABASE_PATH));

        let defaults = WeatherEndpoints::default();
        let weather = WeatherEndpoints {
            geocoding_url: std::env::var("GEOCODING_URL").unwrap_or(defaults.geocoding_url),
            forecast_url: std::env::var("FORECAST_URL").unwrap_or(defaults.forecast_url),
        };

        let mut config = Self::new(api_key, sandbox_dir);
        config.database_path = database_path;
        config.weather = weather;
        config.llm_base_url = std::env::var("LLM_BASE_URL").unwrap_or(config.llm_base_url);
        config.default_model = std::env::var("DEFAULT_MODEL").unwrap_or(config.default_model);
        config.host = std::env::var("HOST").unwrap_or(config.host);
        config.port = parse_env("PORT", config.port)?;
        config.max_iterations = parse_env("MAX_ITERATIONS", config.max_iterations)?;
        config.max_tokens = parse_env("MAX_TOKENS", config.max_tokens)?;
        config.tool_timeout = Duration::from_secs(parse_env(
            "TOOL_TIMEOUT_SECS",
            config.tool_timeout.as_secs(),
        )?);
        config.worker_count = parse_env("WORKER_COUNT", config.worker_count)?;
        config.queue_capacity = parse_env("TASK_QUEUE_CAPACITY", config.queue_capacity)?;
        config.parallel_tool_calls = std::env::var("PARALLEL_TOOL_CALLS")
            .ok()
            .map(|v| {
                parse_bool(&v)
                    .map_err(|e| ConfigError::InvalidValue("PARALLEL_TOOL_CALLS".to_string(), e))
            })
            .transpose()?
            .unwrap_or(config.parallel_tool_calls);

        if config.max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if config.worker_count == 0 || config.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "WORKER_COUNT/TASK_QUEUE_CAPACITY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_key: String, sandbox_dir: PathBuf) -> Self {
        Self {
            api_key,
            llm_base_url: DEFAULT_BASE_URL.to_string(),
            default_model: "openai/gpt-oss-120b".to_string(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            sandbox_dir,
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_iterations: 10,
            max_tokens: 1000,
            tool_timeout: Duration::from_secs(30),
            worker_count: 4,
            queue_capacity: 64,
            parallel_tool_calls: false,
            weather: WeatherEndpoints::default(),
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::new("key".to_string(), PathBuf::from("/tmp/sbx"));
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
        assert_eq!(config.database_path, PathBuf::from("data/demo.db"));
        assert!(!config.database_path.starts_with(&config.sandbox_dir));
        assert_eq!(config.llm_base_url, DEFAULT_BASE_URL);
        assert!(!config.parallel_tool_calls);
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("Yes"), Ok(true));
        assert_eq!(parse_bool(" off "), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn parse_env_falls_back_to_default() {
        let value: u16 = parse_env("TASK_AGENT_TEST_UNSET_PORT", 4242).unwrap();
        assert_eq!(value, 4242);
    }
}
