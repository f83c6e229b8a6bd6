//! Shared test utilities: counting fakes for the external services

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use professora::{
    FailureKind, InferenceService, OutputFormat, Prompt, ServiceFailure, SpeechSynthesizer,
    TurnOrchestrator,
};

/// Inference fake that answers with a fixed reply and counts calls
pub struct FakeInference {
    reply: Result<String, ServiceFailure>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl FakeInference {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self::new(Ok(reply.to_string()), Duration::ZERO))
    }

    pub fn failing(kind: FailureKind) -> Arc<Self> {
        Arc::new(Self::new(
            Err(ServiceFailure::new(kind, format!("fake {kind}"))),
            Duration::ZERO,
        ))
    }

    /// Reply after `delay`, to observe overlap between calls
    pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::new(Ok(reply.to_string()), delay))
    }

    fn new(reply: Result<String, ServiceFailure>, delay: Duration) -> Self {
        Self {
            reply,
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn user_texts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.user_text.clone())
            .collect()
    }
}

#[async_trait]
impl InferenceService for FakeInference {
    fn name(&self) -> &'static str {
        "fake-inference"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ServiceFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.reply.clone()
    }
}

/// Synthesis fake producing `audio:<text>` bytes
pub struct FakeSynthesizer {
    failure: Option<ServiceFailure>,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl FakeSynthesizer {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            failure: None,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(kind: FailureKind) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(ServiceFailure::new(kind, format!("fake {kind}"))),
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    fn name(&self) -> &'static str {
        "fake-synthesizer"
    }

    fn output_format(&self) -> OutputFormat {
        OutputFormat::Mp3
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ServiceFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(audio_for(text)),
        }
    }
}

/// Bytes the fake synthesizer returns for `text`
pub fn audio_for(text: &str) -> Vec<u8> {
    format!("audio:{text}").into_bytes()
}

pub fn orchestrator(
    inference: &Arc<FakeInference>,
    synthesizer: &Arc<FakeSynthesizer>,
) -> Arc<TurnOrchestrator> {
    Arc::new(TurnOrchestrator::new(inference.clone(), synthesizer.clone()))
}
