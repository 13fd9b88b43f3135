//! Offline provider for running without an API key
//!
//! Simulates generation latency and, optionally, failures. Scene prompts are
//! canned strings.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

use super::{GenAiError, StoryWriter};
use crate::config::MockConfig;
use crate::domain::{Artifact, GenerationRequest};
use crate::scheduler::{ExecutionError, Executor};

pub struct MockClient {
    config: MockConfig,
}

impl MockClient {
    pub fn new(config: MockConfig) -> Self {
        debug!(?config, "MockClient::new: called");
        Self { config }
    }

    /// Pick a latency and whether this call fails
    fn roll(&self) -> (Duration, bool) {
        let mut rng = rand::rng();
        let (lo, hi) = if self.config.min_delay_ms <= self.config.max_delay_ms {
            (self.config.min_delay_ms, self.config.max_delay_ms)
        } else {
            (self.config.max_delay_ms, self.config.min_delay_ms)
        };
        let delay = rng.random_range(lo..=hi);
        let fails = self.config.failure_rate > 0.0 && rng.random::<f64>() < self.config.failure_rate;
        (Duration::from_millis(delay), fails)
    }
}

#[async_trait]
impl Executor for MockClient {
    async fn execute(&self, request: &GenerationRequest) -> Result<Artifact, ExecutionError> {
        let (delay, fails) = self.roll();
        debug!(delay_ms = delay.as_millis() as u64, fails, prompt = %request.prompt, "MockClient::execute: called");
        tokio::time::sleep(delay).await;

        if fails {
            return Err(ExecutionError::new("Mock generation failed"));
        }
        Ok(Artifact {
            uri: self.config.video_uri.clone(),
            mime_type: Some("video/mp4".to_string()),
        })
    }
}

#[async_trait]
impl StoryWriter for MockClient {
    async fn scene_prompts(&self, topic: &str, count: usize) -> Result<Vec<String>, GenAiError> {
        debug!(%topic, count, "MockClient::scene_prompts: called");
        tokio::time::sleep(Duration::from_millis(self.config.storyboard_delay_ms)).await;
        Ok((1..=count)
            .map(|i| format!("Mock prompt for \"{}\", scene {}.", topic, i))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(failure_rate: f64) -> MockClient {
        MockClient::new(MockConfig {
            min_delay_ms: 5,
            max_delay_ms: 10,
            failure_rate,
            storyboard_delay_ms: 0,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_execute_returns_sample_video() {
        let client = fast(0.0);
        let artifact = client.execute(&GenerationRequest::new("waves")).await.unwrap();
        assert_eq!(artifact.uri, MockConfig::default().video_uri);
    }

    #[tokio::test]
    async fn test_execute_always_fails_at_rate_one() {
        let client = fast(1.0);
        let err = client.execute(&GenerationRequest::new("waves")).await.unwrap_err();
        assert_eq!(err.message, "Mock generation failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_within_bounds() {
        let client = MockClient::new(MockConfig::default());
        let start = tokio::time::Instant::now();
        client.execute(&GenerationRequest::new("waves")).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(5_000));
        assert!(elapsed <= Duration::from_millis(10_001));
    }

    #[test]
    fn test_roll_tolerates_swapped_bounds() {
        let client = MockClient::new(MockConfig {
            min_delay_ms: 20,
            max_delay_ms: 10,
            ..Default::default()
        });
        let (delay, fails) = client.roll();
        assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
        assert!(!fails);
    }

    #[tokio::test]
    async fn test_scene_prompts() {
        let prompts = fast(0.0).scene_prompts("a fox", 3).await.unwrap();
        assert_eq!(
            prompts,
            vec![
                "Mock prompt for \"a fox\", scene 1.",
                "Mock prompt for \"a fox\", scene 2.",
                "Mock prompt for \"a fox\", scene 3.",
            ]
        );
    }
}
