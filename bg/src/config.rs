//! Bulkgen configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::DEFAULT_MODEL;
use crate::scheduler::SchedulerConfig;

/// Main Bulkgen configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Admission limits
    pub scheduler: SchedulerConfig,

    /// Generation provider
    pub genai: GenAiConfig,

    /// Offline provider used when no API key is available
    pub mock: MockConfig,

    /// Downloading finished videos
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .bulkgen.yml
        let local_config = PathBuf::from(".bulkgen.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/bulkgen/bulkgen.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("bulkgen").join("bulkgen.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config
            .scheduler
            .validate()
            .context("Invalid scheduler section")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Generation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenAiConfig {
    /// "auto", "gemini" or "mock"
    pub provider: String,

    /// Video model used when a request does not name one
    pub model: String,

    /// Model used to write storyboard scene prompts
    #[serde(rename = "text-model")]
    pub text_model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Per-request HTTP timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Delay between polls of a long-running video operation
    #[serde(rename = "operation-poll-ms")]
    pub operation_poll_ms: u64,

    /// Give up on a video operation after this long; unset polls until done
    #[serde(rename = "operation-timeout-ms", default, skip_serializing_if = "Option::is_none")]
    pub operation_timeout_ms: Option<u64>,
}

impl GenAiConfig {
    /// Read the API key from the configured environment variable
    ///
    /// Blank values count as missing.
    pub fn get_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
            model: DEFAULT_MODEL.to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_ms: 120_000,
            operation_poll_ms: 10_000,
            operation_timeout_ms: None,
        }
    }
}

/// Offline provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Shortest simulated generation time
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Longest simulated generation time
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Probability in [0, 1] that a simulated generation fails
    #[serde(rename = "failure-rate")]
    pub failure_rate: f64,

    /// URI returned for every simulated video
    #[serde(rename = "video-uri")]
    pub video_uri: String,

    /// Simulated time to write storyboard prompts
    #[serde(rename = "storyboard-delay-ms")]
    pub storyboard_delay_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 5_000,
            max_delay_ms: 10_000,
            failure_rate: 0.0,
            video_uri: "https://storage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4".to_string(),
            storyboard_delay_ms: 1_500,
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory used when `--export` is given without a path
    #[serde(rename = "output-dir")]
    pub output_dir: PathBuf,

    /// Pause between consecutive downloads
    #[serde(rename = "stagger-ms")]
    pub stagger_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("videos"),
            stagger_ms: 300,
        }
    }
}
