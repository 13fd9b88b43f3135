//! Gemini API client implementation
//!
//! Video generation is a long-running operation: the request returns an
//! operation name which is polled until it reports `done`. Scene prompts come
//! from a single `generateContent` call constrained to a JSON array schema.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{GenAiError, StoryWriter};
use crate::config::GenAiConfig;
use crate::domain::{Artifact, GenerationRequest};
use crate::scheduler::{ExecutionError, Executor};

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

const SCENE_SYSTEM_PROMPT: &str = "You are a creative scriptwriter. Generate a list of distinct scene prompts \
                                   for a video based on a topic. The prompts should be concise, descriptive, \
                                   and suitable for a text-to-video AI model. Respond ONLY with a valid JSON \
                                   array of strings, where each string is a single scene's prompt.";

/// Exponential backoff before retry number `attempt` (1-based)
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt.saturating_sub(1)))
}

/// Delay before retry number `attempt`, never shorter than a server's Retry-After
fn retry_delay(attempt: u32, error: &GenAiError) -> Duration {
    match error {
        GenAiError::RateLimited { retry_after } => backoff(attempt).max(*retry_after),
        _ => backoff(attempt),
    }
}

/// Retry-After in seconds, when the server sent one
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Gemini API client
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    text_model: String,
    http: Client,
    operation_poll: Duration,
    /// None polls until the operation reports done
    operation_timeout: Option<Duration>,
}

impl GeminiClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &GenAiConfig) -> Result<Self, GenAiError> {
        debug!(base_url = %config.base_url, "GeminiClient::from_config: called");
        let api_key = config
            .get_api_key()
            .ok_or_else(|| GenAiError::MissingApiKey(config.api_key_env.clone()))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(GenAiError::Network)?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            http,
            operation_poll: Duration::from_millis(config.operation_poll_ms),
            operation_timeout: config.operation_timeout_ms.map(Duration::from_millis),
        })
    }

    /// Build the predictLongRunning body for a video request
    fn build_video_body(&self, request: &GenerationRequest, image: Option<InlineImage>) -> serde_json::Value {
        debug!(model = %request.model, has_image = image.is_some(), "build_video_body: called");
        let mut instance = serde_json::json!({ "prompt": request.prompt });
        if let Some(image) = image {
            instance["image"] = serde_json::json!({
                "bytesBase64Encoded": image.data,
                "mimeType": image.mime_type,
            });
        }

        serde_json::json!({
            "instances": [instance],
            "parameters": {
                "aspectRatio": request.aspect_ratio.as_str(),
                "sampleCount": request.output_count,
            },
        })
    }

    /// Build the generateContent body for scene prompts
    fn build_scene_body(&self, topic: &str, count: usize) -> serde_json::Value {
        debug!(%topic, count, "build_scene_body: called");
        serde_json::json!({
            "systemInstruction": { "parts": [{ "text": SCENE_SYSTEM_PROMPT }] },
            "contents": [{
                "role": "user",
                "parts": [{ "text": format!("Create a compelling story with exactly {} scenes about \"{}\".", count, topic) }],
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "STRING",
                        "description": "A single, concise prompt for one video scene.",
                    },
                },
            },
        })
    }

    /// Send a request, retrying transient failures with exponential backoff
    async fn send(&self, make: impl Fn() -> RequestBuilder) -> Result<serde_json::Value, GenAiError> {
        let mut attempt = 0;
        loop {
            let error = match self.send_once(&make, attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !error.is_retryable() || attempt >= MAX_RETRIES {
                debug!(attempt, error = %error, "send: giving up");
                return Err(error);
            }

            attempt += 1;
            let delay = retry_delay(attempt, &error);
            warn!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "send: retrying after transient error");
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(&self, make: &impl Fn() -> RequestBuilder, attempt: u32) -> Result<serde_json::Value, GenAiError> {
        let response = make().header("x-goog-api-key", &self.api_key).send().await?;
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = retry_after(&response).unwrap_or_else(|| backoff(attempt + 1));
            debug!(attempt, ?retry_after, "send: rate limited (429)");
            return Err(GenAiError::RateLimited { retry_after });
        }

        if !response.status().is_success() {
            debug!(attempt, status, "send: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(GenAiError::ApiError {
                status,
                message: error_message(&text),
            });
        }

        debug!("send: success");
        response
            .json()
            .await
            .map_err(|e| GenAiError::InvalidResponse(e.to_string()))
    }

    /// Start a video operation and return its name
    async fn start_video(&self, request: &GenerationRequest) -> Result<String, GenAiError> {
        let image = match &request.image {
            Some(path) if request.input_type.needs_image() => Some(InlineImage::load(path).await?),
            _ => None,
        };
        let body = self.build_video_body(request, image);
        let url = format!("{}/models/{}:predictLongRunning", self.base_url, request.model);

        let value = self.send(|| self.http.post(&url).json(&body)).await?;
        let operation: Operation = serde_json::from_value(value)?;
        info!(operation = %operation.name, model = %request.model, "Video operation started");
        Ok(operation.name)
    }

    /// Poll an operation until it is done
    async fn wait_for(&self, name: &str) -> Result<Operation, GenAiError> {
        let url = format!("{}/{}", self.base_url, name);
        let started = Instant::now();

        loop {
            tokio::time::sleep(self.operation_poll).await;
            let value = self.send(|| self.http.get(&url)).await?;
            let operation: Operation = serde_json::from_value(value)?;
            if operation.done {
                debug!(operation = %name, "wait_for: done");
                return Ok(operation);
            }
            if let Some(limit) = self.gave_up(started) {
                warn!(operation = %name, "wait_for: gave up waiting");
                return Err(GenAiError::Timeout(limit));
            }
            debug!(operation = %name, "wait_for: still running");
        }
    }

    /// The configured limit, once polling has run past it
    fn gave_up(&self, started: Instant) -> Option<Duration> {
        self.operation_timeout.filter(|limit| started.elapsed() >= *limit)
    }

    /// Run one video generation to completion
    pub async fn generate_video(&self, request: &GenerationRequest) -> Result<Artifact, GenAiError> {
        debug!(model = %request.model, input_type = %request.input_type, "GeminiClient::generate_video: called");
        let name = self.start_video(request).await?;
        let operation = self.wait_for(&name).await?;
        operation.into_artifact()
    }

    fn parse_scene_prompts(&self, value: serde_json::Value) -> Result<Vec<String>, GenAiError> {
        let invalid = || GenAiError::InvalidResponse("API returned an invalid prompt array structure.".to_string());
        let response: GenerateContentResponse = serde_json::from_value(value)?;
        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(invalid)?;

        serde_json::from_str::<Vec<String>>(text.trim()).map_err(|_| invalid())
    }
}

#[async_trait]
impl Executor for GeminiClient {
    async fn execute(&self, request: &GenerationRequest) -> Result<Artifact, ExecutionError> {
        Ok(self.generate_video(request).await?)
    }
}

#[async_trait]
impl StoryWriter for GeminiClient {
    async fn scene_prompts(&self, topic: &str, count: usize) -> Result<Vec<String>, GenAiError> {
        debug!(%topic, count, "GeminiClient::scene_prompts: called");
        let url = format!("{}/models/{}:generateContent", self.base_url, self.text_model);
        let body = self.build_scene_body(topic, count);

        let value = self.send(|| self.http.post(&url).json(&body)).await?;
        let prompts = self.parse_scene_prompts(value)?;
        if prompts.len() != count {
            // Schema cannot pin the length
            warn!(requested = count, received = prompts.len(), "Scene count differs from request");
        }
        Ok(prompts)
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Image sent inline with a video request
struct InlineImage {
    data: String,
    mime_type: &'static str,
}

impl InlineImage {
    async fn load(path: &Path) -> Result<Self, GenAiError> {
        debug!(path = %path.display(), "InlineImage::load: called");
        let bytes = tokio::fs::read(path).await?;
        Ok(Self {
            data: BASE64.encode(&bytes),
            mime_type: mime_type_for(path),
        })
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<serde_json::Value>,
}

impl Operation {
    fn into_artifact(self) -> Result<Artifact, GenAiError> {
        if let Some(error) = self.error {
            return Err(GenAiError::Operation(error.message));
        }
        let response = self.response.unwrap_or_default();
        let uri = response["generateVideoResponse"]["generatedSamples"][0]["video"]["uri"]
            .as_str()
            .or_else(|| response["generatedVideos"][0]["video"]["uri"].as_str())
            .ok_or(GenAiError::MissingVideo)?;

        Ok(Artifact {
            uri: uri.to_string(),
            mime_type: Some("video/mp4".to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}
