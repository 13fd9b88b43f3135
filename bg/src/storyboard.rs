//! Storyboards: one topic expanded into a sequence of scene prompts

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{AspectRatio, GenerationRequest, InputType, ValidationError};
use crate::genai::{GenAiError, StoryWriter};

/// Upper bound on scenes per storyboard
pub const MAX_SCENES: usize = 50;

#[derive(Debug, Error)]
pub enum StoryboardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to generate prompts from AI: {0}")]
    Generation(#[from] GenAiError),
}

/// A story topic, a scene count and an optional character image
#[derive(Debug, Clone)]
pub struct Storyboard {
    pub topic: String,
    pub scenes: usize,
    /// Shared reference image; scenes become image-to-video when set
    pub character: Option<PathBuf>,
}

impl Storyboard {
    pub fn new(topic: impl Into<String>, scenes: usize) -> Self {
        Self {
            topic: topic.into(),
            scenes,
            character: None,
        }
    }

    pub fn with_character(mut self, image: impl Into<PathBuf>) -> Self {
        self.character = Some(image.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.topic.trim().is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        if self.scenes == 0 || self.scenes > MAX_SCENES {
            return Err(ValidationError::SceneCount {
                count: self.scenes,
                max: MAX_SCENES,
            });
        }
        if let Some(path) = &self.character
            && !path.is_file()
        {
            return Err(ValidationError::ImageNotFound(path.clone()));
        }
        Ok(())
    }

    /// Validate, then ask the writer for scene prompts
    pub async fn write(&self, writer: &dyn StoryWriter) -> Result<Vec<String>, StoryboardError> {
        debug!(topic = %self.topic, scenes = self.scenes, "Storyboard::write: called");
        self.validate()?;
        let prompts = writer.scene_prompts(self.topic.trim(), self.scenes).await?;
        info!(topic = %self.topic, count = prompts.len(), "Storyboard written");
        Ok(prompts)
    }

    /// Scene prompts as an editable prompts file, one scene per line
    ///
    /// Lines starting with `#` are comments. Line breaks inside a prompt are
    /// folded to spaces so each scene stays on one line.
    pub fn prompts_file(&self, prompts: &[String]) -> String {
        let mut out = format!("# Storyboard: {}\n", one_line(&self.topic));
        out.push_str("# Edit, reorder or delete scenes, then: bg run --prompts-file <this file>\n");
        for prompt in prompts {
            out.push_str(&one_line(prompt));
            out.push('\n');
        }
        out
    }

    /// One request per scene prompt, in scene order
    pub fn requests(&self, prompts: &[String], model: &str, aspect_ratio: AspectRatio) -> Vec<GenerationRequest> {
        prompts
            .iter()
            .map(|prompt| {
                let request = GenerationRequest::new(prompt.clone())
                    .with_model(model)
                    .with_aspect_ratio(aspect_ratio);
                match &self.character {
                    Some(image) => request.with_image(InputType::ImageToVideo, image.clone()),
                    None => request,
                }
            })
            .collect()
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Prompts from a prompts file: one per line, blank lines and `#` comments skipped
pub fn prompt_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
