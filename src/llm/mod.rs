//! Text generation for tutor replies
//!
//! The orchestrator talks to an [`InferenceService`]; production uses
//! [`BedrockInference`], tests substitute fakes.

mod bedrock;

pub use bedrock::{BedrockInference, DEFAULT_MODEL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceFailure;

/// Sampling parameters sent with every inference request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.9,
            max_tokens: 100,
        }
    }
}

/// One inference request: a single user turn plus a system instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user_text: String,
    pub sampling: SamplingConfig,
}

/// Large-language-model text generation
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Short identifier used in logs and readiness output
    fn name(&self) -> &'static str;

    /// Generate a reply for `prompt`
    ///
    /// Returns the raw generated text. An empty string is a valid
    /// return value here; the orchestrator decides whether it is usable.
    async fn generate(&self, prompt: &Prompt) -> Result<String, ServiceFailure>;
}
