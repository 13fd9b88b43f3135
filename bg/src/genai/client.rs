//! Storyboard writer trait

use async_trait::async_trait;

use super::GenAiError;

/// Writes scene prompts for a storyboard topic
///
/// Video generation itself goes through `scheduler::Executor`; providers
/// implement both.
#[async_trait]
pub trait StoryWriter: Send + Sync {
    /// Produce exactly `count` scene prompts about `topic`, in story order
    async fn scene_prompts(&self, topic: &str, count: usize) -> Result<Vec<String>, GenAiError>;
}
