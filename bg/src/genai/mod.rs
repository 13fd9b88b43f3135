//! Generation providers
//!
//! A provider both executes video requests for the scheduler and writes
//! storyboard scene prompts.

use std::sync::Arc;

use tracing::{debug, warn};

mod client;
mod error;
mod gemini;
mod mock;

pub use client::StoryWriter;
pub use error::GenAiError;
pub use gemini::GeminiClient;
pub use mock::MockClient;

use crate::config::Config;
use crate::scheduler::Executor;

/// A configured provider, shared as both of its roles
#[derive(Clone)]
pub struct Provider {
    /// "gemini" or "mock"
    pub name: &'static str,
    pub executor: Arc<dyn Executor>,
    pub story_writer: Arc<dyn StoryWriter>,
}

impl Provider {
    fn from_client<C: Executor + StoryWriter + 'static>(name: &'static str, client: C) -> Self {
        let client = Arc::new(client);
        Self {
            name,
            executor: client.clone(),
            story_writer: client,
        }
    }
}

/// Create a provider based on `genai.provider` in config
///
/// Supports "gemini", "mock", and "auto" (Gemini when the API key is set,
/// otherwise mock).
pub fn create_client(config: &Config) -> Result<Provider, GenAiError> {
    debug!(provider = %config.genai.provider, "create_client: called");
    match config.genai.provider.as_str() {
        "gemini" => {
            debug!("create_client: creating Gemini client");
            Ok(Provider::from_client("gemini", GeminiClient::from_config(&config.genai)?))
        }
        "mock" => {
            debug!("create_client: creating mock client");
            Ok(Provider::from_client("mock", MockClient::new(config.mock.clone())))
        }
        "auto" => {
            if config.genai.get_api_key().is_some() {
                debug!("create_client: API key present, using Gemini");
                Ok(Provider::from_client("gemini", GeminiClient::from_config(&config.genai)?))
            } else {
                warn!(
                    env = %config.genai.api_key_env,
                    "API key not set, using the mock provider"
                );
                Ok(Provider::from_client("mock", MockClient::new(config.mock.clone())))
            }
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(GenAiError::UnknownProvider(other.to_string()))
        }
    }
}
