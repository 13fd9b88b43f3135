//! GenerationRequest - the parameters of one video generation
//!
//! Requests are immutable once enqueued. Validation happens at the
//! submission boundary so malformed requests never reach the store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Default video model
pub const DEFAULT_MODEL: &str = "veo-2.0-generate-001";

/// Errors raised when a submission is rejected before enqueue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Input type {0} requires an image file")]
    MissingImage(InputType),

    #[error("Image file not found: {0}")]
    ImageNotFound(PathBuf),

    #[error("Output count must be at least 1")]
    ZeroOutputCount,

    #[error("Model must not be empty")]
    EmptyModel,

    #[error("Story topic must not be empty")]
    EmptyTopic,

    #[error("Scene count must be between 1 and {max}, got {count}")]
    SceneCount { count: usize, max: usize },
}

/// How the video is seeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InputType {
    #[default]
    TextToVideo,
    ImageToVideo,
    FrameToVideo,
}

impl InputType {
    /// Whether this input type needs an image alongside the prompt
    pub fn needs_image(&self) -> bool {
        matches!(self, Self::ImageToVideo | Self::FrameToVideo)
    }
}

impl std::fmt::Display for InputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextToVideo => write!(f, "text-to-video"),
            Self::ImageToVideo => write!(f, "image-to-video"),
            Self::FrameToVideo => write!(f, "frame-to-video"),
        }
    }
}

impl std::str::FromStr for InputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text-to-video" | "text" => Ok(Self::TextToVideo),
            "image-to-video" | "image" => Ok(Self::ImageToVideo),
            "frame-to-video" | "frame" => Ok(Self::FrameToVideo),
            _ => Err(format!(
                "Unknown input type: {}. Use: text-to-video, image-to-video, or frame-to-video",
                s
            )),
        }
    }
}

/// Output aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" => Ok(Self::Landscape),
            "9:16" => Ok(Self::Portrait),
            _ => Err(format!("Unknown aspect ratio: {}. Use: 16:9 or 9:16", s)),
        }
    }
}

/// Parameters for one generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,

    #[serde(rename = "input-type", default)]
    pub input_type: InputType,

    pub model: String,

    #[serde(rename = "aspect-ratio", default)]
    pub aspect_ratio: AspectRatio,

    #[serde(rename = "output-count")]
    pub output_count: u32,

    /// Seed image for image/frame input types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

impl GenerationRequest {
    /// Create a text-to-video request with default parameters
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            input_type: InputType::TextToVideo,
            model: DEFAULT_MODEL.to_string(),
            aspect_ratio: AspectRatio::default(),
            output_count: 1,
            image: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Attach a seed image for an image or frame input type
    pub fn with_image(mut self, input_type: InputType, image: impl Into<PathBuf>) -> Self {
        self.input_type = input_type;
        self.image = Some(image.into());
        self
    }

    /// Check required fields before the request is enqueued
    pub fn validate(&self) -> Result<(), ValidationError> {
        debug!(input_type = %self.input_type, model = %self.model, "GenerationRequest::validate: called");
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        if self.model.trim().is_empty() {
            return Err(ValidationError::EmptyModel);
        }
        if self.output_count == 0 {
            return Err(ValidationError::ZeroOutputCount);
        }
        if self.input_type.needs_image() {
            match &self.image {
                None => return Err(ValidationError::MissingImage(self.input_type)),
                Some(path) if !path.is_file() => return Err(ValidationError::ImageNotFound(path.clone())),
                Some(_) => {}
            }
        }
        Ok(())
    }
}
