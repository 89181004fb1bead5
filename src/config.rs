use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Configuration for a tagging run. Loaded once before the run starts and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Minimum video file size in megabytes; smaller files are skipped
    pub file_size: u64,

    /// Chat endpoint settings
    pub openai: OpenAIConfig,

    /// Per-call limits and pacing for the language model
    pub llm: LLMSettings,

    /// Settings for the metadata page requests
    pub request: RequestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// API key; may be empty for endpoints that do not authenticate
    pub api_key: String,

    /// Full URL of the chat completions endpoint
    pub api_endpoint: String,

    /// Model to use
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMSettings {
    /// Courtesy delay in seconds applied before every chat call
    pub delay: f64,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,

    /// Attempts per file before recording a terminal failure
    #[serde(default = "default_process_retries")]
    pub process_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Courtesy delay in seconds applied before every page request
    pub delay: f64,

    /// HTTP timeout in seconds, shared by the page and chat clients
    pub timeout: u64,
}

fn default_process_retries() -> u32 {
    3
}

impl Config {
    /// Load configuration from the default candidate locations.
    pub fn load() -> Result<Self> {
        let config_paths = ["video-tagger.toml", "config/video-tagger.toml"];

        for path in &config_paths {
            if Path::new(path).exists() {
                let config = Self::load_from(Path::new(path))?;
                tracing::info!("Loaded configuration from: {}", path);
                return Ok(config);
            }
        }

        Err(anyhow!("no configuration file found"))
    }

    /// Load configuration from an explicit file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Scanner threshold in bytes.
    pub fn min_file_size_bytes(&self) -> u64 {
        self.file_size * 1024 * 1024
    }

    /// Validate configuration before a run starts.
    pub fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.openai.api_endpoint)
            .map_err(|e| anyhow!("invalid chat endpoint '{}': {}", self.openai.api_endpoint, e))?;
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(anyhow!(
                "chat endpoint must be http or https, got '{}'",
                endpoint.scheme()
            ));
        }

        if self.openai.model.is_empty() {
            return Err(anyhow!("model must not be empty"));
        }

        if self.llm.process_retries == 0 {
            return Err(anyhow!("process_retries must be greater than 0"));
        }

        if self.request.timeout == 0 {
            return Err(anyhow!("request timeout must be greater than 0"));
        }

        if self.llm.delay < 0.0 || self.request.delay < 0.0 {
            return Err(anyhow!("delays must not be negative"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file_size: 100,
            openai: OpenAIConfig {
                api_key: String::new(),
                api_endpoint: "http://localhost:1234/v1/chat/completions".to_string(),
                model: "local-model".to_string(),
            },
            llm: LLMSettings {
                delay: 1.0,
                max_tokens: 1024,
                temperature: 0.1,
                process_retries: 3,
            },
            request: RequestConfig {
                delay: 1.0,
                timeout: 30,
            },
        }
    }
}
