//! Amazon Bedrock `Converse` client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{InferenceService, Prompt};
use crate::aws::{Credentials, SignableRequest, Signer, classify_error};
use crate::error::{FailureKind, ServiceFailure};
use crate::{Error, Result};

/// Default model identifier
pub const DEFAULT_MODEL: &str = "amazon.nova-pro-v1:0";

/// Generates tutor replies through Bedrock Runtime
pub struct BedrockInference {
    client: reqwest::Client,
    signer: Signer,
    url: Url,
    model_id: String,
}

impl BedrockInference {
    /// Create a client for the public regional endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built or the model
    /// identifier is empty
    pub fn new(
        credentials: Credentials,
        region: &str,
        model_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = format!("https://bedrock-runtime.{region}.amazonaws.com");
        Self::with_endpoint(credentials, region, &endpoint, model_id, timeout)
    }

    /// Create a client against an explicit endpoint (VPC endpoint, local mock)
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is not a valid URL, the model
    /// identifier is empty, or the HTTP client cannot be built
    pub fn with_endpoint(
        credentials: Credentials,
        region: &str,
        endpoint: &str,
        model_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let model_id = model_id.into();
        if model_id.trim().is_empty() {
            return Err(Error::Config("Bedrock model identifier required".to_string()));
        }

        let url = Url::parse(&format!(
            "{}/model/{}/converse",
            endpoint.trim_end_matches('/'),
            urlencoding::encode(&model_id)
        ))
        .map_err(|e| Error::Config(format!("invalid Bedrock endpoint {endpoint}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            signer: Signer::new(credentials, region, "bedrock"),
            url,
            model_id,
        })
    }
}

#[async_trait]
impl InferenceService for BedrockInference {
    fn name(&self) -> &'static str {
        "bedrock"
    }

    async fn generate(&self, prompt: &Prompt) -> std::result::Result<String, ServiceFailure> {
        let request = ConverseRequest {
            messages: [Message {
                role: "user",
                content: [TextBlock {
                    text: &prompt.user_text,
                }],
            }],
            system: [TextBlock {
                text: &prompt.system,
            }],
            inference_config: InferenceConfig {
                temperature: prompt.sampling.temperature,
                top_p: prompt.sampling.top_p,
                max_tokens: prompt.sampling.max_tokens,
            },
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| ServiceFailure::new(FailureKind::InvalidRequest, e.to_string()))?;

        let auth = self.signer.sign(
            &SignableRequest {
                method: "POST",
                url: &self.url,
                headers: &[("content-type", "application/json")],
                body: &body,
            },
            chrono::Utc::now(),
        );

        let mut builder = self
            .client
            .post(self.url.clone())
            .header("content-type", "application/json")
            .header("accept", "application/json");
        for (name, value) in auth {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| ServiceFailure::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_type = response
                .headers()
                .get("x-amzn-errortype")
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            let body = response.text().await.unwrap_or_default();
            let failure = classify_error(status, error_type.as_deref(), &body);
            tracing::warn!(model = %self.model_id, kind = %failure.kind, "Bedrock converse failed");
            return Err(failure);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceFailure::from_reqwest(&e))?;
        let parsed: ConverseResponse = serde_json::from_slice(&bytes).map_err(|e| {
            ServiceFailure::new(FailureKind::Malformed, format!("invalid Converse response: {e}"))
        })?;

        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                model = %self.model_id,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = parsed.stop_reason.as_deref().unwrap_or("unknown"),
                "Bedrock converse completed"
            );
        }

        parsed
            .output
            .and_then(|o| o.message)
            .and_then(|m| m.content.into_iter().find_map(|block| block.text))
            .ok_or_else(|| {
                ServiceFailure::new(FailureKind::EmptyResponse, "Converse response had no text content")
            })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest<'a> {
    messages: [Message<'a>; 1],
    system: [TextBlock<'a>; 1],
    inference_config: InferenceConfig,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: [TextBlock<'a>; 1],
}

#[derive(Serialize)]
struct TextBlock<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: Option<ConverseOutput>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ConverseOutput {
    message: Option<OutputMessage>,
}

#[derive(Deserialize)]
struct OutputMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}
