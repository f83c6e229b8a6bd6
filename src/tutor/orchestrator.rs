//! Tutor turn orchestration: transcript → reply text → speech

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::SYSTEM_PROMPT;
use super::session::{Session, Turn};
use crate::error::{FailureKind, ServiceFailure};
use crate::llm::{InferenceService, Prompt, SamplingConfig};
use crate::voice::{OutputFormat, SpeechSynthesizer};
use crate::{Error, Result};

/// Successful outcome of one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub reply_text: String,
    pub audio: Vec<u8>,
}

/// Runs one inference call and one synthesis call per transcript
///
/// Holds no per-turn state: the service handles are shared, read-only and
/// built once per process, so one orchestrator serves every connection
/// concurrently.
#[derive(Clone)]
pub struct TurnOrchestrator {
    inference: Arc<dyn InferenceService>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    system_prompt: String,
    sampling: SamplingConfig,
    inference_timeout: Option<Duration>,
    synthesis_timeout: Option<Duration>,
}

impl TurnOrchestrator {
    /// Create an orchestrator with the default tutor instruction and sampling
    #[must_use]
    pub fn new(inference: Arc<dyn InferenceService>, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            inference,
            synthesizer,
            system_prompt: SYSTEM_PROMPT.to_string(),
            sampling: SamplingConfig::default(),
            inference_timeout: None,
            synthesis_timeout: None,
        }
    }

    /// Bound each external call; expiry becomes a `Timeout` failure of
    /// the corresponding step
    #[must_use]
    pub const fn with_timeouts(mut self, inference: Duration, synthesis: Duration) -> Self {
        self.inference_timeout = Some(inference);
        self.synthesis_timeout = Some(synthesis);
        self
    }

    /// Override sampling parameters
    #[must_use]
    pub const fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Override the system instruction
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Encoding of the audio produced by this orchestrator
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        self.synthesizer.output_format()
    }

    /// Names of the backing services, for readiness output
    #[must_use]
    pub fn service_names(&self) -> (&'static str, &'static str) {
        (self.inference.name(), self.synthesizer.name())
    }

    /// Produce a reply and its audio for one transcript
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyInput`] for blank input; no service is called
    /// - [`Error::Inference`] if generation fails or yields no text;
    ///   synthesis is not attempted
    /// - [`Error::Synthesis`] if speech fails; the reply text is carried
    ///   in the error
    pub async fn process_turn(&self, input_text: &str) -> Result<Reply> {
        let input = input_text.trim();
        if input.is_empty() {
            return Err(Error::EmptyInput);
        }

        let prompt = Prompt {
            system: self.system_prompt.clone(),
            user_text: input.to_string(),
            sampling: self.sampling,
        };

        let started = std::time::Instant::now();
        let generated = with_deadline(self.inference_timeout, self.inference.generate(&prompt))
            .await
            .map_err(|failure| {
                tracing::warn!(service = self.inference.name(), error = %failure, "inference failed");
                Error::Inference(failure)
            })?;

        let reply_text = generated.trim().to_string();
        if reply_text.is_empty() {
            tracing::warn!(service = self.inference.name(), "inference returned blank text");
            return Err(Error::Inference(ServiceFailure::new(
                FailureKind::EmptyResponse,
                "model returned no usable text",
            )));
        }
        let inference_ms = started.elapsed().as_millis();

        let audio = match with_deadline(self.synthesis_timeout, self.synthesizer.synthesize(&reply_text)).await {
            Ok(audio) if audio.is_empty() => {
                return Err(Error::Synthesis {
                    reply_text,
                    failure: ServiceFailure::new(FailureKind::EmptyResponse, "empty audio stream"),
                });
            }
            Ok(audio) => audio,
            Err(failure) => {
                tracing::warn!(service = self.synthesizer.name(), error = %failure, "synthesis failed");
                return Err(Error::Synthesis { reply_text, failure });
            }
        };

        tracing::info!(
            input_chars = input.chars().count(),
            reply_chars = reply_text.chars().count(),
            audio_bytes = audio.len(),
            inference_ms,
            total_ms = started.elapsed().as_millis(),
            "turn complete"
        );

        Ok(Reply { reply_text, audio })
    }

    /// Run [`process_turn`](Self::process_turn) and record the outcome
    ///
    /// A successful turn appends one [`Turn`] with audio. A synthesis
    /// failure appends one text-only turn so the reply is not lost. Empty
    /// input and inference failures leave the session unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`process_turn`](Self::process_turn)
    pub async fn process_and_record(&self, session: &mut Session, input_text: &str) -> Result<Reply> {
        let result = self.process_turn(input_text).await;

        match &result {
            Ok(reply) => session.push(Turn {
                input_text: input_text.trim().to_string(),
                reply_text: reply.reply_text.clone(),
                audio: Some(reply.audio.clone()),
                created_at: Utc::now(),
            }),
            Err(Error::Synthesis { reply_text, .. }) => session.push(Turn {
                input_text: input_text.trim().to_string(),
                reply_text: reply_text.clone(),
                audio: None,
                created_at: Utc::now(),
            }),
            Err(_) => {}
        }

        result
    }
}

async fn with_deadline<T>(
    deadline: Option<Duration>,
    call: impl Future<Output = std::result::Result<T, ServiceFailure>>,
) -> std::result::Result<T, ServiceFailure> {
    let Some(deadline) = deadline else {
        return call.await;
    };
    tokio::time::timeout(deadline, call).await.unwrap_or_else(|_| {
        Err(ServiceFailure::new(
            FailureKind::Timeout,
            format!("no response within {}ms", deadline.as_millis()),
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct CannedInference {
        reply: std::result::Result<String, ServiceFailure>,
        prompts: Mutex<Vec<Prompt>>,
    }

    #[async_trait]
    impl InferenceService for CannedInference {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn generate(&self, prompt: &Prompt) -> std::result::Result<String, ServiceFailure> {
            self.prompts.lock().unwrap().push(prompt.clone());
            self.reply.clone()
        }
    }

    struct EchoSynth;

    #[async_trait]
    impl SpeechSynthesizer for EchoSynth {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn output_format(&self) -> OutputFormat {
            OutputFormat::Mp3
        }

        async fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, ServiceFailure> {
            Ok(text.as_bytes().to_vec())
        }
    }

    fn orchestrator(reply: std::result::Result<String, ServiceFailure>) -> (TurnOrchestrator, Arc<CannedInference>) {
        let inference = Arc::new(CannedInference {
            reply,
            prompts: Mutex::new(Vec::new()),
        });
        (TurnOrchestrator::new(inference.clone(), Arc::new(EchoSynth)), inference)
    }

    #[tokio::test]
    async fn sends_trimmed_input_with_tutor_instruction() {
        let (orch, inference) = orchestrator(Ok("Oi!".to_string()));
        orch.process_turn("  Hello  ").await.unwrap();

        let prompts = inference.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].user_text, "Hello");
        assert_eq!(prompts[0].system, SYSTEM_PROMPT);
        assert_eq!(prompts[0].sampling.max_tokens, 100);
        assert!((prompts[0].sampling.temperature - 0.8).abs() < f32::EPSILON);
        assert!((prompts[0].sampling.top_p - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn blank_reply_is_inference_failure() {
        let (orch, _) = orchestrator(Ok("   \n".to_string()));
        let err = orch.process_turn("Hello").await.unwrap_err();
        match err {
            Error::Inference(failure) => assert_eq!(failure.kind, FailureKind::EmptyResponse),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reply_is_trimmed_before_synthesis() {
        let (orch, _) = orchestrator(Ok("  Muito bem!\n".to_string()));
        let reply = orch.process_turn("hi").await.unwrap();
        assert_eq!(reply.reply_text, "Muito bem!");
        assert_eq!(reply.audio, b"Muito bem!");
    }

    struct StalledSynth;

    #[async_trait]
    impl SpeechSynthesizer for StalledSynth {
        fn name(&self) -> &'static str {
            "stalled"
        }

        fn output_format(&self) -> OutputFormat {
            OutputFormat::Mp3
        }

        async fn synthesize(&self, _text: &str) -> std::result::Result<Vec<u8>, ServiceFailure> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![1])
        }
    }

    #[tokio::test]
    async fn synthesis_deadline_becomes_timeout_failure() {
        let inference = Arc::new(CannedInference {
            reply: Ok("Oi!".to_string()),
            prompts: Mutex::new(Vec::new()),
        });
        let orch = TurnOrchestrator::new(inference, Arc::new(StalledSynth))
            .with_timeouts(Duration::from_secs(1), Duration::from_millis(20));

        match orch.process_turn("hi").await.unwrap_err() {
            Error::Synthesis { reply_text, failure } => {
                assert_eq!(reply_text, "Oi!");
                assert_eq!(failure.kind, FailureKind::Timeout);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn custom_prompt_and_sampling_are_used() {
        let (orch, inference) = orchestrator(Ok("ok".to_string()));
        let orch = orch.with_system_prompt("Be terse").with_sampling(SamplingConfig {
            temperature: 0.2,
            top_p: 0.5,
            max_tokens: 40,
        });
        orch.process_turn("hi").await.unwrap();
        let prompts = inference.prompts.lock().unwrap();
        assert_eq!(prompts[0].system, "Be terse");
        assert_eq!(prompts[0].sampling.max_tokens, 40);
    }
}
